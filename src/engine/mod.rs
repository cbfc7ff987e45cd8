//! Boundary to the embedded database engine.
//!
//! The protocol side only ever sees these traits: a query is executed into a
//! cursor, the cursor describes its columns by engine type name and hands out
//! rows of [`Value`]s until it runs dry.

// Standard library imports
use std::fmt::{Display, Formatter};

// Declare submodules
#[cfg(feature = "duckdb")]
pub mod duckdb_engine;
pub mod memory;

// Re-export public items
#[cfg(feature = "duckdb")]
pub use duckdb_engine::{DuckDbCursor, DuckDbEngine};
pub use memory::{MemoryCursor, MemoryEngine};

/// A single column value as produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Textual form of a value. Used as the fallback wire encoding, so floats and
/// byte strings follow the PostgreSQL text output rules.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::UInt(value) => write!(f, "{value}"),
            Value::Float32(value) => write_float(f, *value as f64, value),
            Value::Float64(value) => write_float(f, *value, value),
            Value::Text(value) => f.write_str(value),
            Value::Bytes(value) => {
                f.write_str("\\x")?;
                for byte in value {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

fn write_float(f: &mut Formatter<'_>, value: f64, display: &dyn Display) -> std::fmt::Result {
    if value.is_nan() {
        f.write_str("NaN")
    } else if value.is_infinite() {
        f.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{display}")
    }
}

/// Name and engine type of one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub type_name: String,
}

impl Column {
    pub fn new(name: &str, type_name: &str) -> Column {
        Column {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Failure reported by the engine, either while starting a statement or
/// while reading its rows. The caller decides which one it was.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError(pub String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> EngineError {
        EngineError(message.into())
    }
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EngineError {}

/// A database that executes SQL text.
///
/// One handle is built at startup and shared by every connection task, so it
/// must be safe to call from several threads at once. Calls block; the query
/// streamer runs them on the blocking thread pool.
pub trait Engine: Send + Sync + 'static {
    type Cursor: Cursor + Send + 'static;

    fn execute(&self, sql: &str) -> Result<Self::Cursor, EngineError>;
}

/// Row iterator over the result of one statement.
pub trait Cursor {
    /// Result columns, in order.
    fn columns(&self) -> &[Column];

    /// Next row, or `None` at the end of the result.
    fn next_row(&mut self) -> Result<Option<Vec<Value>>, EngineError>;

    /// Release engine resources. Calling it again is a no-op.
    fn close(&mut self);
}

/// Owns a cursor and closes it on every path out of the query,
/// whether the caller closed it explicitly or not.
pub struct CursorGuard<C: Cursor> {
    cursor: C,
    closed: bool,
}

impl<C: Cursor> CursorGuard<C> {
    pub fn new(cursor: C) -> CursorGuard<C> {
        CursorGuard {
            cursor,
            closed: false,
        }
    }

    pub fn columns(&self) -> &[Column] {
        self.cursor.columns()
    }

    pub fn next_row(&mut self) -> Result<Option<Vec<Value>>, EngineError> {
        if self.closed {
            return Ok(None);
        }
        self.cursor.next_row()
    }

    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cursor.close();
        }
    }
}

impl<C: Cursor> Drop for CursorGuard<C> {
    fn drop(&mut self) {
        self.close();
    }
}

//! Scripted engine with canned results keyed by query text.
//!
//! Lets the protocol be exercised end to end without a real database:
//! each registered query either fails to start, returns rows, or returns
//! some rows and then fails mid-scan.

// Standard library imports
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Internal crate imports
use crate::engine::{Column, Cursor, Engine, EngineError, Value};

#[derive(Debug, Clone)]
enum Script {
    Rows {
        columns: Vec<Column>,
        rows: Vec<Vec<Value>>,
        scan_error: Option<String>,
    },
    Fail(String),
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    scripts: HashMap<String, Script>,
    closed_cursors: Arc<AtomicUsize>,
}

impl MemoryEngine {
    /// Register a query returning `rows`.
    pub fn with_rows(mut self, sql: &str, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        self.scripts.insert(
            normalize(sql),
            Script::Rows {
                columns,
                rows,
                scan_error: None,
            },
        );
        self
    }

    /// Register a query that fails before producing a cursor.
    pub fn with_failure(mut self, sql: &str, message: &str) -> Self {
        self.scripts
            .insert(normalize(sql), Script::Fail(message.to_string()));
        self
    }

    /// Register a query that yields `rows` and then fails while scanning.
    pub fn with_scan_failure(
        mut self,
        sql: &str,
        columns: Vec<Column>,
        rows: Vec<Vec<Value>>,
        message: &str,
    ) -> Self {
        self.scripts.insert(
            normalize(sql),
            Script::Rows {
                columns,
                rows,
                scan_error: Some(message.to_string()),
            },
        );
        self
    }

    /// Number of cursors handed out and closed so far.
    pub fn closed_cursors(&self) -> usize {
        self.closed_cursors.load(Ordering::SeqCst)
    }
}

fn normalize(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}

impl Engine for MemoryEngine {
    type Cursor = MemoryCursor;

    fn execute(&self, sql: &str) -> Result<MemoryCursor, EngineError> {
        match self.scripts.get(&normalize(sql)) {
            Some(Script::Rows {
                columns,
                rows,
                scan_error,
            }) => Ok(MemoryCursor {
                columns: columns.clone(),
                rows: rows.iter().cloned().collect(),
                scan_error: scan_error.clone(),
                closed: false,
                closed_cursors: self.closed_cursors.clone(),
            }),
            Some(Script::Fail(message)) => Err(EngineError::new(message.as_str())),
            None => Err(EngineError::new(format!(
                "Catalog Error: no result registered for query \"{}\"",
                normalize(sql)
            ))),
        }
    }
}

#[derive(Debug)]
pub struct MemoryCursor {
    columns: Vec<Column>,
    rows: VecDeque<Vec<Value>>,
    scan_error: Option<String>,
    closed: bool,
    closed_cursors: Arc<AtomicUsize>,
}

impl Cursor for MemoryCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, EngineError> {
        if self.closed {
            return Err(EngineError::new("cursor is closed"));
        }
        match self.rows.pop_front() {
            Some(row) => Ok(Some(row)),
            None => match self.scan_error.take() {
                Some(message) => Err(EngineError(message)),
                None => Ok(None),
            },
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.rows.clear();
        self.closed_cursors.fetch_add(1, Ordering::SeqCst);
    }
}

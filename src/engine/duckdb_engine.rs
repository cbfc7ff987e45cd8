//! DuckDB backed engine.

// Standard library imports
use std::collections::VecDeque;

// External crate imports
use duckdb::arrow::array::{Array, ArrayRef, AsArray};
use duckdb::arrow::datatypes::{
    DataType, DurationMicrosecondType, DurationMillisecondType, DurationNanosecondType,
    DurationSecondType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    IntervalDayTimeType, IntervalMonthDayNanoType, IntervalUnit, IntervalYearMonthType, TimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use duckdb::arrow::record_batch::RecordBatch;
use duckdb::arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::{params, Connection};
use log::{debug, info};
use parking_lot::Mutex;

// Internal crate imports
use crate::engine::{Column, Cursor, Engine, EngineError, Value};
use crate::errors::Error;

pub const IN_MEMORY: &str = ":memory:";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
// Zoned timestamps are sent in UTC.
const TIMESTAMP_UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f+00";

const MICROS_PER_HOUR: u64 = 3_600_000_000;
const MICROS_PER_MINUTE: u64 = 60_000_000;
const MICROS_PER_SECOND: u64 = 1_000_000;

/// A DuckDB database shared by all client connections.
///
/// `Connection` is `Send` but not `Sync`, so the root connection sits behind a
/// mutex and every statement runs on its own clone of it. Clones share the
/// same database instance; the lock is held only while cloning.
pub struct DuckDbEngine {
    root: Mutex<Connection>,
}

impl DuckDbEngine {
    /// Open a database file, or an in-memory database for `:memory:`.
    pub fn open(path: &str) -> Result<DuckDbEngine, Error> {
        let connection = if path == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        };
        match connection {
            Ok(connection) => {
                info!("Opened DuckDB database {path}");
                Ok(DuckDbEngine {
                    root: Mutex::new(connection),
                })
            }
            Err(err) => Err(Error::EngineError(format!(
                "Could not open DuckDB database {path}: {err}"
            ))),
        }
    }

    pub fn open_in_memory() -> Result<DuckDbEngine, Error> {
        Self::open(IN_MEMORY)
    }
}

impl Engine for DuckDbEngine {
    type Cursor = DuckDbCursor;

    fn execute(&self, sql: &str) -> Result<DuckDbCursor, EngineError> {
        let connection = self
            .root
            .lock()
            .try_clone()
            .map_err(|err| EngineError::new(err.to_string()))?;

        let mut statement = connection
            .prepare(sql)
            .map_err(|err| EngineError::new(err.to_string()))?;
        let arrow = statement
            .query_arrow(params![])
            .map_err(|err| EngineError::new(err.to_string()))?;

        let schema = arrow.get_schema();
        let columns = schema
            .fields()
            .iter()
            .map(|field| Column::new(field.name(), &type_name(field.data_type())))
            .collect::<Vec<_>>();
        let batches: VecDeque<RecordBatch> = arrow.collect();
        debug!(
            "Statement produced {} batch(es) with {} column(s)",
            batches.len(),
            columns.len()
        );

        Ok(DuckDbCursor {
            columns,
            batches,
            row: 0,
        })
    }
}

/// Cursor over the Arrow record batches of one statement.
pub struct DuckDbCursor {
    columns: Vec<Column>,
    batches: VecDeque<RecordBatch>,
    row: usize,
}

impl Cursor for DuckDbCursor {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<Value>>, EngineError> {
        loop {
            let batch = match self.batches.front() {
                Some(batch) => batch,
                None => return Ok(None),
            };
            if self.row >= batch.num_rows() {
                self.batches.pop_front();
                self.row = 0;
                continue;
            }
            let row = batch
                .columns()
                .iter()
                .map(|column| value_at(column, self.row))
                .collect::<Result<Vec<_>, _>>()?;
            self.row += 1;
            return Ok(Some(row));
        }
    }

    fn close(&mut self) {
        self.batches.clear();
        self.row = 0;
    }
}

/// DuckDB's name for the logical type behind an Arrow column.
fn type_name(data_type: &DataType) -> String {
    let name = match data_type {
        DataType::Boolean => "BOOLEAN",
        DataType::Int8 => "TINYINT",
        DataType::Int16 => "SMALLINT",
        DataType::Int32 => "INTEGER",
        DataType::Int64 => "BIGINT",
        DataType::UInt8 => "UTINYINT",
        DataType::UInt16 => "USMALLINT",
        DataType::UInt32 => "UINTEGER",
        DataType::UInt64 => "UBIGINT",
        DataType::Float16 | DataType::Float32 => "FLOAT",
        DataType::Float64 => "DOUBLE",
        DataType::Decimal128(_, _) | DataType::Decimal256(_, _) => "DECIMAL",
        DataType::Utf8 | DataType::LargeUtf8 => "VARCHAR",
        DataType::Binary | DataType::LargeBinary | DataType::FixedSizeBinary(_) => "BLOB",
        DataType::Date32 | DataType::Date64 => "DATE",
        DataType::Time32(_) | DataType::Time64(_) => "TIME",
        DataType::Timestamp(_, None) => "TIMESTAMP",
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP WITH TIME ZONE",
        DataType::Interval(_) | DataType::Duration(_) => "INTERVAL",
        DataType::List(_) | DataType::LargeList(_) | DataType::FixedSizeList(_, _) => "LIST",
        DataType::Struct(_) => "STRUCT",
        DataType::Map(_, _) => "MAP",
        // ENUM columns arrive dictionary encoded.
        DataType::Dictionary(_, value_type) => return type_name(value_type),
        other => return other.to_string(),
    };
    name.to_string()
}

fn value_at(column: &ArrayRef, row: usize) -> Result<Value, EngineError> {
    if column.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match column.data_type() {
        DataType::Boolean => Value::Bool(column.as_boolean().value(row)),
        DataType::Int8 => Value::Int(column.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Value::Int(column.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Value::Int(column.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Value::Int(column.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Value::Int(column.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Value::Int(column.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Value::Int(column.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => Value::UInt(column.as_primitive::<UInt64Type>().value(row)),
        DataType::Float32 => Value::Float32(column.as_primitive::<Float32Type>().value(row)),
        DataType::Float64 => Value::Float64(column.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Value::Text(column.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Value::Text(column.as_string::<i64>().value(row).to_string()),
        DataType::Binary => Value::Bytes(column.as_binary::<i32>().value(row).to_vec()),
        DataType::LargeBinary => Value::Bytes(column.as_binary::<i64>().value(row).to_vec()),
        DataType::Timestamp(unit, Some(_)) => Value::Text(timestamp_utc(column, unit, row)?),
        DataType::Interval(unit) => Value::Text(interval_value(column, unit, row)),
        DataType::Duration(unit) => Value::Text(duration_value(column, unit, row)),
        _ => Value::Text(format_value(column, row)?),
    };
    Ok(value)
}

/// Zoned timestamps are instants since the epoch, whatever zone name the
/// column carries.
fn timestamp_utc(column: &ArrayRef, unit: &TimeUnit, row: usize) -> Result<String, EngineError> {
    let (secs, nanos) = match unit {
        TimeUnit::Second => (column.as_primitive::<TimestampSecondType>().value(row), 0),
        TimeUnit::Millisecond => split_epoch(
            column.as_primitive::<TimestampMillisecondType>().value(row),
            1_000,
        ),
        TimeUnit::Microsecond => split_epoch(
            column.as_primitive::<TimestampMicrosecondType>().value(row),
            1_000_000,
        ),
        TimeUnit::Nanosecond => split_epoch(
            column.as_primitive::<TimestampNanosecondType>().value(row),
            1_000_000_000,
        ),
    };
    match chrono::DateTime::from_timestamp(secs, nanos) {
        Some(timestamp) => Ok(timestamp.format(TIMESTAMP_UTC_FORMAT).to_string()),
        None => Err(EngineError::new(format!(
            "Timestamp out of range: {secs} seconds since the epoch"
        ))),
    }
}

fn split_epoch(value: i64, per_second: i64) -> (i64, u32) {
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    (value.div_euclid(per_second), nanos as u32)
}

fn interval_value(column: &ArrayRef, unit: &IntervalUnit, row: usize) -> String {
    match unit {
        IntervalUnit::YearMonth => {
            pg_interval(column.as_primitive::<IntervalYearMonthType>().value(row), 0, 0)
        }
        IntervalUnit::DayTime => {
            let value = column.as_primitive::<IntervalDayTimeType>().value(row);
            pg_interval(0, value.days, i64::from(value.milliseconds) * 1_000)
        }
        IntervalUnit::MonthDayNano => {
            let value = column.as_primitive::<IntervalMonthDayNanoType>().value(row);
            pg_interval(value.months, value.days, value.nanoseconds / 1_000)
        }
    }
}

fn duration_value(column: &ArrayRef, unit: &TimeUnit, row: usize) -> String {
    let micros = match unit {
        TimeUnit::Second => column
            .as_primitive::<DurationSecondType>()
            .value(row)
            .saturating_mul(1_000_000),
        TimeUnit::Millisecond => column
            .as_primitive::<DurationMillisecondType>()
            .value(row)
            .saturating_mul(1_000),
        TimeUnit::Microsecond => column.as_primitive::<DurationMicrosecondType>().value(row),
        TimeUnit::Nanosecond => column.as_primitive::<DurationNanosecondType>().value(row) / 1_000,
    };
    pg_interval(0, 0, micros)
}

/// Interval in PostgreSQL's default output style, e.g.
/// `1 year 2 mons -3 days +04:05:06.5`.
fn pg_interval(months: i32, days: i32, micros: i64) -> String {
    let mut out = String::new();
    // A negative part makes the next positive one carry an explicit sign.
    let mut after_negative = false;

    let parts = [
        (i64::from(months / 12), "year"),
        (i64::from(months % 12), "mon"),
        (i64::from(days), "day"),
    ];
    for (value, unit) in parts {
        if value == 0 {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        let sign = if after_negative && value > 0 { "+" } else { "" };
        let plural = if value == 1 { "" } else { "s" };
        out.push_str(&format!("{sign}{value} {unit}{plural}"));
        after_negative = value < 0;
    }

    if out.is_empty() || micros != 0 {
        if !out.is_empty() {
            out.push(' ');
        }
        let sign = if micros < 0 {
            "-"
        } else if after_negative {
            "+"
        } else {
            ""
        };
        let micros = micros.unsigned_abs();
        let hours = micros / MICROS_PER_HOUR;
        let minutes = micros / MICROS_PER_MINUTE % 60;
        let seconds = micros / MICROS_PER_SECOND % 60;
        out.push_str(&format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"));

        let fraction = micros % MICROS_PER_SECOND;
        if fraction != 0 {
            out.push('.');
            out.push_str(format!("{fraction:06}").trim_end_matches('0'));
        }
    }
    out
}

/// Arrow's own display for everything without a dedicated conversion
/// (decimals, dates, times, naive timestamps, nested types).
fn format_value(column: &ArrayRef, row: usize) -> Result<String, EngineError> {
    let options = FormatOptions::default().with_timestamp_format(Some(TIMESTAMP_FORMAT));
    let formatter = ArrayFormatter::try_new(column.as_ref(), &options)
        .map_err(|err| EngineError::new(err.to_string()))?;
    formatter
        .value(row)
        .try_to_string()
        .map_err(|err| EngineError::new(err.to_string()))
}

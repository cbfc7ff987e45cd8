// Standard library imports
use std::collections::HashMap;

// External crate imports
use bytes::{BufMut, BytesMut};
use once_cell::sync::Lazy;

// Internal crate imports
use crate::engine::{Column, Value};
use crate::errors::Error;

/// Postgres data type mappings
/// used in RowDescription ('T') message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Bool,
    Int2,
    Int4,
    Int8,
    Float4,
    Float8,
    Numeric,
    Text,
    Bytea,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Json,
}

impl From<&DataType> for i32 {
    fn from(data_type: &DataType) -> i32 {
        match data_type {
            DataType::Bool => 16,
            DataType::Bytea => 17,
            DataType::Int8 => 20,
            DataType::Int2 => 21,
            DataType::Int4 => 23,
            DataType::Text => 25,
            DataType::Json => 114,
            DataType::Float4 => 700,
            DataType::Float8 => 701,
            DataType::Date => 1082,
            DataType::Time => 1083,
            DataType::Timestamp => 1114,
            DataType::TimestampTz => 1184,
            DataType::Interval => 1186,
            DataType::Numeric => 1700,
            DataType::Uuid => 2950,
        }
    }
}

impl DataType {
    /// `typlen` of the type, -1 for variable length.
    pub fn type_size(&self) -> i16 {
        match self {
            DataType::Bool => 1,
            DataType::Int2 => 2,
            DataType::Int4 | DataType::Float4 | DataType::Date => 4,
            DataType::Int8
            | DataType::Float8
            | DataType::Time
            | DataType::Timestamp
            | DataType::TimestampTz => 8,
            DataType::Interval | DataType::Uuid => 16,
            DataType::Numeric | DataType::Text | DataType::Bytea | DataType::Json => -1,
        }
    }
}

/// Appends the text-format representation of a non-null value.
pub type Encoder = fn(&Value, &mut BytesMut);

/// How values of one engine column type travel on the wire.
#[derive(Debug)]
pub struct WireType {
    data_type: DataType,
    encode: Encoder,
}

impl WireType {
    const fn new(data_type: DataType, encode: Encoder) -> WireType {
        WireType { data_type, encode }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn oid(&self) -> i32 {
        (&self.data_type).into()
    }

    pub fn type_size(&self) -> i16 {
        self.data_type.type_size()
    }

    pub fn encode(&self, value: &Value, buf: &mut BytesMut) {
        (self.encode)(value, buf)
    }
}

fn encode_text(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Text(text) => buf.put_slice(text.as_bytes()),
        other => buf.put_slice(other.to_string().as_bytes()),
    }
}

fn encode_bool(value: &Value, buf: &mut BytesMut) {
    match value {
        Value::Bool(true) => buf.put_u8(b't'),
        Value::Bool(false) => buf.put_u8(b'f'),
        other => encode_text(other, buf),
    }
}

// Integers, floats and byte strings already print in PostgreSQL text format.
fn encode_display(value: &Value, buf: &mut BytesMut) {
    buf.put_slice(value.to_string().as_bytes());
}

/// Used for every engine type without an entry in the table.
static TEXT_FALLBACK: WireType = WireType::new(DataType::Text, encode_text);

static WIRE_TYPES: Lazy<HashMap<&'static str, WireType>> = Lazy::new(|| {
    let entries: [(&[&'static str], DataType, Encoder); 16] = [
        (&["BOOLEAN", "BOOL", "LOGICAL"], DataType::Bool, encode_bool),
        (
            &["TINYINT", "INT1", "SMALLINT", "INT2", "SHORT", "UTINYINT"],
            DataType::Int2,
            encode_display,
        ),
        (
            &["INTEGER", "INT4", "INT", "SIGNED", "USMALLINT"],
            DataType::Int4,
            encode_display,
        ),
        (
            &["BIGINT", "INT8", "LONG", "UINTEGER"],
            DataType::Int8,
            encode_display,
        ),
        (
            &["HUGEINT", "UBIGINT", "UHUGEINT", "DECIMAL", "NUMERIC"],
            DataType::Numeric,
            encode_text,
        ),
        (&["FLOAT", "FLOAT4", "REAL"], DataType::Float4, encode_display),
        (&["DOUBLE", "FLOAT8"], DataType::Float8, encode_display),
        (
            &["VARCHAR", "TEXT", "STRING", "CHAR", "BPCHAR"],
            DataType::Text,
            encode_text,
        ),
        (
            &["BLOB", "BYTEA", "BINARY", "VARBINARY"],
            DataType::Bytea,
            encode_display,
        ),
        (&["DATE"], DataType::Date, encode_text),
        (&["TIME"], DataType::Time, encode_text),
        (
            &["TIMESTAMP", "DATETIME", "TIMESTAMP_S", "TIMESTAMP_MS", "TIMESTAMP_NS"],
            DataType::Timestamp,
            encode_text,
        ),
        (
            &["TIMESTAMP WITH TIME ZONE", "TIMESTAMPTZ"],
            DataType::TimestampTz,
            encode_text,
        ),
        (&["INTERVAL"], DataType::Interval, encode_text),
        (&["UUID"], DataType::Uuid, encode_text),
        (&["JSON"], DataType::Json, encode_text),
    ];

    let mut types = HashMap::new();
    for (names, data_type, encode) in entries {
        for name in names {
            types.insert(*name, WireType::new(data_type, encode));
        }
    }
    types
});

/// Wire representation for an engine type name. Never fails: anything
/// unknown (nested types, enums, geometry, ...) is sent as text.
pub fn resolve(type_name: &str) -> &'static WireType {
    let normalized = type_name.trim().to_uppercase();
    if normalized.ends_with(']') {
        // LIST / ARRAY types, e.g. INTEGER[] or VARCHAR[3]
        return &TEXT_FALLBACK;
    }
    // DECIMAL(18,3), VARCHAR(10)
    let base = match normalized.find('(') {
        Some(index) => normalized[..index].trim_end(),
        None => normalized.as_str(),
    };
    WIRE_TYPES.get(base).unwrap_or(&TEXT_FALLBACK)
}

/// The descriptor unknown types resolve to.
pub fn text_fallback() -> &'static WireType {
    &TEXT_FALLBACK
}

/// Field of a RowDescription: one per result column, alive for one query.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub table_oid: i32,
    pub attribute_number: i16,
    pub wire_type: &'static WireType,
    pub type_modifier: i32,
    pub format: i16,
}

impl ColumnDescriptor {
    pub fn new(name: &str, type_name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.into(),
            // Results are not bound to a table.
            table_oid: 0,
            attribute_number: 0,
            wire_type: resolve(type_name),
            type_modifier: -1,
            // Text
            format: 0,
        }
    }
}

impl From<&Column> for ColumnDescriptor {
    fn from(column: &Column) -> ColumnDescriptor {
        ColumnDescriptor::new(&column.name, &column.type_name)
    }
}

/// Trait for reading strings from BytesMut
pub trait BytesMutReader {
    fn read_string(&mut self) -> Result<String, Error>;
}

impl BytesMutReader for BytesMut {
    /// Should only be used when reading strings from the message protocol.
    /// Can be used to read multiple strings from the same message which are separated by the null byte
    fn read_string(&mut self) -> Result<String, Error> {
        let null_index = self.iter().position(|&byte| byte == b'\0');

        match null_index {
            Some(index) => {
                let string_bytes = self.split_to(index + 1);
                match std::str::from_utf8(&string_bytes[..string_bytes.len() - 1]) {
                    Ok(string) => Ok(string.to_string()),
                    Err(err) => Err(Error::ParseBytesError(err.to_string())),
                }
            }
            None => Err(Error::ParseBytesError("Could not read string".to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn encoded(wire_type: &WireType, value: Value) -> String {
        let mut buf = BytesMut::new();
        wire_type.encode(&value, &mut buf);
        String::from_utf8(buf.to_vec()).unwrap()
    }

    #[test]
    fn test_resolve_integer_widths() {
        assert_eq!(resolve("TINYINT").oid(), 21);
        assert_eq!(resolve("SMALLINT").oid(), 21);
        assert_eq!(resolve("INTEGER").oid(), 23);
        assert_eq!(resolve("BIGINT").oid(), 20);
        assert_eq!(resolve("HUGEINT").oid(), 1700);
        assert_eq!(resolve("UTINYINT").type_size(), 2);
        assert_eq!(resolve("USMALLINT").type_size(), 4);
        assert_eq!(resolve("UINTEGER").type_size(), 8);
        assert_eq!(resolve("UBIGINT").type_size(), -1);
    }

    #[test]
    fn test_resolve_normalizes_names() {
        assert_eq!(resolve("varchar").data_type(), DataType::Text);
        assert_eq!(resolve(" Double ").data_type(), DataType::Float8);
        assert_eq!(resolve("DECIMAL(18,3)").data_type(), DataType::Numeric);
        assert_eq!(resolve("VARCHAR(10)").data_type(), DataType::Text);
        assert_eq!(
            resolve("TIMESTAMP WITH TIME ZONE").data_type(),
            DataType::TimestampTz
        );
    }

    #[test]
    fn test_resolve_unknown_types_fall_back_to_text() {
        for name in ["GEOMETRY", "INTEGER[]", "STRUCT(a INTEGER)", "MAP", "", "ENUM"] {
            let wire_type = resolve(name);
            assert!(std::ptr::eq(wire_type, text_fallback()), "{name}");
            assert_eq!(wire_type.oid(), 25);
            assert_eq!(wire_type.type_size(), -1);
        }
    }

    #[test]
    fn test_every_descriptor_is_total() {
        let values = [
            Value::Bool(true),
            Value::Int(-7),
            Value::UInt(7),
            Value::Float32(1.5),
            Value::Float64(f64::INFINITY),
            Value::Text("text".into()),
            Value::Bytes(vec![1, 2]),
        ];
        for wire_type in WIRE_TYPES.values().chain([text_fallback()]) {
            assert!(wire_type.type_size() >= -1);
            for value in &values {
                let mut buf = BytesMut::new();
                wire_type.encode(value, &mut buf);
                assert!(!buf.is_empty());
            }
        }
    }

    #[test]
    fn test_encoders() {
        assert_eq!(encoded(resolve("BOOLEAN"), Value::Bool(true)), "t");
        assert_eq!(encoded(resolve("BOOLEAN"), Value::Bool(false)), "f");
        assert_eq!(encoded(resolve("INTEGER"), Value::Int(42)), "42");
        assert_eq!(
            encoded(resolve("BIGINT"), Value::Int(i64::MIN)),
            "-9223372036854775808"
        );
        assert_eq!(encoded(resolve("DOUBLE"), Value::Float64(2.5)), "2.5");
        assert_eq!(encoded(resolve("DOUBLE"), Value::Float64(f64::NAN)), "NaN");
        assert_eq!(encoded(resolve("BLOB"), Value::Bytes(vec![0xab, 0x0c])), "\\xab0c");
        // Nothing is cut to a fixed width.
        let long = "x".repeat(1000);
        assert_eq!(encoded(resolve("VARCHAR"), Value::Text(long.clone())), long);
        assert_eq!(encoded(resolve("VARCHAR"), Value::Text(String::new())), "");
    }

    #[test]
    fn test_column_descriptor() {
        let descriptor = ColumnDescriptor::from(&Column::new("total", "BIGINT"));
        assert_eq!(descriptor.name, "total");
        assert_eq!(descriptor.table_oid, 0);
        assert_eq!(descriptor.attribute_number, 0);
        assert_eq!(descriptor.wire_type.oid(), 20);
        assert_eq!(descriptor.type_modifier, -1);
        assert_eq!(descriptor.format, 0);
    }
}

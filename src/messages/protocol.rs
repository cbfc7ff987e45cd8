// External crate imports
use bytes::{BufMut, BytesMut};

// Internal crate imports
use crate::constants::*;
use crate::engine::Value;
use crate::errors::Error;
use crate::messages::error::PgErrorMsg;
use crate::messages::types::ColumnDescriptor;

/// Single byte reply to SSLRequest / GSSENCRequest: no encryption here.
pub fn negotiation_refused() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(1);
    bytes.put_u8(NEGOTIATION_REFUSED);
    bytes
}

/// Create an AuthenticationOk message.
pub fn authentication_ok() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(9);
    bytes.put_u8(b'R');
    bytes.put_i32(8);
    bytes.put_i32(AUTHENTICATION_SUCCESSFUL);
    bytes
}

/// Create a ready for query message. There are no transactions, so the
/// status is always idle.
pub fn ready_for_query() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(6);
    bytes.put_u8(b'Z');
    bytes.put_i32(5);
    bytes.put_u8(TRANSACTION_STATUS_IDLE);
    bytes
}

/// Create a row description message. Results wider than
/// `MAX_RESULT_COLUMNS` are refused before anything is encoded.
pub fn row_description(columns: &[ColumnDescriptor]) -> Result<BytesMut, Error> {
    if columns.len() > MAX_RESULT_COLUMNS {
        return Err(Error::QueryError(format!(
            "Result has {} columns, at most {MAX_RESULT_COLUMNS} are supported",
            columns.len()
        )));
    }

    let mut res = BytesMut::new();
    let mut row_desc = BytesMut::new();

    // how many columns we are storing
    row_desc.put_i16(columns.len() as i16);

    for column in columns {
        // Column name
        row_desc.put_slice(column.name.as_bytes());
        row_desc.put_u8(0);

        // Doesn't belong to any table
        row_desc.put_i32(column.table_oid);
        row_desc.put_i16(column.attribute_number);

        row_desc.put_i32(column.wire_type.oid());

        // -1 for variable size
        row_desc.put_i16(column.wire_type.type_size());

        row_desc.put_i32(column.type_modifier);

        // Text format code = 0
        row_desc.put_i16(column.format);
    }

    res.put_u8(b'T');
    res.put_i32(row_desc.len() as i32 + 4);
    res.put(row_desc);

    Ok(res)
}

/// Append a data row message to `buf`, encoding each value with the wire
/// type of its column. NULL is sent as length -1, never as an empty value.
pub fn data_row(
    buf: &mut BytesMut,
    row: &[Value],
    columns: &[ColumnDescriptor],
) -> Result<(), Error> {
    if row.len() != columns.len() {
        return Err(Error::ScanError(format!(
            "Row has {} value(s) but the result has {} column(s)",
            row.len(),
            columns.len()
        )));
    }

    let count = match i16::try_from(row.len()) {
        Ok(count) => count,
        Err(_) => {
            return Err(Error::ScanError(format!(
                "Row has {} values, too many for a DataRow",
                row.len()
            )))
        }
    };

    let start = buf.len();
    buf.put_u8(b'D');
    // Length is patched once the row is encoded.
    buf.put_i32(0);

    // how many columns we are storing
    buf.put_i16(count);

    for (value, column) in row.iter().zip(columns) {
        if value.is_null() {
            buf.put_i32(-1);
            continue;
        }
        let len_at = buf.len();
        buf.put_i32(0);
        column.wire_type.encode(value, buf);
        let value_len = (buf.len() - len_at - 4) as i32;
        buf[len_at..len_at + 4].copy_from_slice(&value_len.to_be_bytes());
    }

    let message_len = (buf.len() - start - 1) as i32;
    buf[start + 1..start + 5].copy_from_slice(&message_len.to_be_bytes());

    Ok(())
}

/// Create a command complete message.
pub fn command_complete(command: &str) -> BytesMut {
    let mut res = BytesMut::with_capacity(command.len() + 6);
    res.put_u8(b'C');
    res.put_i32(command.len() as i32 + 4 + 1);
    res.put_slice(command.as_bytes());
    res.put_u8(0);
    res
}

/// CommandComplete tag of a query returning `rows` rows.
pub fn select_tag(rows: u64) -> String {
    format!("SELECT {rows}")
}

/// Create an empty query response message.
pub fn empty_query_response() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(5);
    bytes.put_u8(b'I');
    bytes.put_i32(4);
    bytes
}

/// Create an error response message.
pub fn error_message(error: &PgErrorMsg) -> BytesMut {
    let fields = error.encode();

    let mut res = BytesMut::with_capacity(fields.len() + 5);
    res.put_u8(b'E');
    res.put_i32(fields.len() as i32 + 4);
    res.put(fields);
    res
}

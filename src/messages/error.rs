// Standard library imports
use std::fmt::{Display, Formatter};

// External crate imports
use bytes::{BufMut, BytesMut};

// Internal crate imports
use crate::constants::MESSAGE_TERMINATOR;
use crate::errors::Error;

pub const SEVERITY_ERROR: &str = "ERROR";
pub const SEVERITY_FATAL: &str = "FATAL";

/// PostgreSQL error message structure.
/// See: https://www.postgresql.org/docs/current/protocol-error-fields.html
#[derive(Debug, Default, PartialEq)]
pub struct PgErrorMsg {
    pub severity_localized: String, // S
    pub severity: String,           // V
    pub code: String,               // C
    pub message: String,            // M
    pub detail: Option<String>,     // D
    pub hint: Option<String>,       // H
}

impl Display for PgErrorMsg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} [{}]",
            self.severity_localized, self.message, self.code
        )?;

        if let Some(val) = &self.detail {
            write!(f, "[detail: {val}]")?;
        }
        if let Some(val) = &self.hint {
            write!(f, "[hint: {val}]")?;
        }

        Ok(())
    }
}

impl PgErrorMsg {
    pub fn new(severity: &str, code: &str, message: &str) -> PgErrorMsg {
        PgErrorMsg {
            severity_localized: severity.to_string(),
            severity: severity.to_string(),
            code: code.to_string(),
            message: message.to_string(),
            detail: None,
            hint: None,
        }
    }

    /// Encode the field list of an ErrorResponse (without tag and length).
    pub fn encode(&self) -> BytesMut {
        let mut fields = BytesMut::new();

        put_field(&mut fields, b'S', &self.severity_localized);
        put_field(&mut fields, b'V', &self.severity);
        put_field(&mut fields, b'C', &self.code);
        put_field(&mut fields, b'M', &self.message);
        if let Some(detail) = &self.detail {
            put_field(&mut fields, b'D', detail);
        }
        if let Some(hint) = &self.hint {
            put_field(&mut fields, b'H', hint);
        }

        // No more fields follow.
        fields.put_u8(MESSAGE_TERMINATOR);
        fields
    }

    /// Parse a PostgreSQL error message from a byte array.
    pub fn parse(error_msg: &[u8]) -> Result<PgErrorMsg, Error> {
        let mut out = PgErrorMsg::default();

        let mut i = 0;
        while i < error_msg.len() {
            let field_type = error_msg[i];
            if field_type == MESSAGE_TERMINATOR {
                break;
            }
            i += 1;

            let start = i;
            while i < error_msg.len() && error_msg[i] != 0 {
                i += 1;
            }
            if i == error_msg.len() {
                return Err(Error::ParseBytesError(format!(
                    "Error field {} is not null-terminated",
                    field_type as char
                )));
            }
            let msg_content = String::from_utf8_lossy(&error_msg[start..i]).to_string();
            i += 1;

            match field_type {
                b'S' => out.severity_localized = msg_content,
                b'V' => out.severity = msg_content,
                b'C' => out.code = msg_content,
                b'M' => out.message = msg_content,
                b'D' => out.detail = Some(msg_content),
                b'H' => out.hint = Some(msg_content),
                // Unknown fields are skipped, as the protocol allows.
                _ => {}
            }
        }

        Ok(out)
    }
}

/// Fields are C strings, so embedded NULs are dropped.
fn put_field(buf: &mut BytesMut, field_type: u8, value: &str) {
    buf.put_u8(field_type);
    buf.extend(value.bytes().filter(|byte| *byte != 0));
    buf.put_u8(0);
}

/// What the client gets told about an error: ERROR for a failed query the
/// session survives, FATAL for anything that ends the connection.
impl From<&Error> for PgErrorMsg {
    fn from(err: &Error) -> PgErrorMsg {
        let severity = if err.is_recoverable() {
            SEVERITY_ERROR
        } else {
            SEVERITY_FATAL
        };
        let message = match err {
            Error::QueryError(msg) | Error::ScanError(msg) => msg.clone(),
            other => other.to_string(),
        };
        PgErrorMsg::new(severity, err.sqlstate(), &message)
    }
}

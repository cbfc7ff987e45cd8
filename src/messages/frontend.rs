// Standard library imports
use std::collections::HashMap;

// External crate imports
use bytes::{Buf, BytesMut};

// Internal crate imports
use crate::constants::*;
use crate::errors::Error;
use crate::messages::types::BytesMutReader;

/// Every frontend message this server understands.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    /// Protocol 3.0 StartupMessage with its parameters (user, database, ...).
    Startup { params: HashMap<String, String> },
    SslRequest,
    GssEncRequest,
    CancelRequest { process_id: i32, secret_key: i32 },
    /// Simple query ('Q').
    Query { text: String },
    /// Terminate ('X').
    Terminate,
}

impl FrontendMessage {
    pub fn name(&self) -> &'static str {
        match self {
            FrontendMessage::Startup { .. } => "StartupMessage",
            FrontendMessage::SslRequest => "SSLRequest",
            FrontendMessage::GssEncRequest => "GSSENCRequest",
            FrontendMessage::CancelRequest { .. } => "CancelRequest",
            FrontendMessage::Query { .. } => "Query",
            FrontendMessage::Terminate => "Terminate",
        }
    }
}

/// Decode a startup-phase packet: the request code followed by its payload
/// (the length prefix is already consumed).
pub fn parse_startup_packet(mut bytes: BytesMut) -> Result<FrontendMessage, Error> {
    if bytes.len() < 4 {
        return Err(Error::ClientBadStartup);
    }
    let code = bytes.get_i32();

    match code {
        // Client wants to use plain text, requesting regular startup.
        PROTOCOL_VERSION_NUMBER => Ok(FrontendMessage::Startup {
            params: parse_startup(bytes)?,
        }),

        // Client is requesting SSL (TLS).
        SSL_REQUEST_CODE => Ok(FrontendMessage::SslRequest),

        REQUEST_GSSENCMODE_CODE => Ok(FrontendMessage::GssEncRequest),

        // Client is requesting to cancel a running query (plain text connection).
        CANCEL_REQUEST_CODE => {
            if bytes.len() < 8 {
                return Err(Error::ClientBadStartup);
            }
            Ok(FrontendMessage::CancelRequest {
                process_id: bytes.get_i32(),
                secret_key: bytes.get_i32(),
            })
        }

        // Something else, probably something is wrong, and it's not our fault,
        // e.g. badly implemented Postgres client.
        _ => Err(Error::ProtocolSyncError(format!(
            "Unexpected startup code: {code}"
        ))),
    }
}

/// Decode a regular message by its type tag. Only simple queries and
/// Terminate are supported; everything else is rejected by tag.
pub fn parse_message(code: u8, mut bytes: BytesMut) -> Result<FrontendMessage, Error> {
    match code {
        b'Q' => {
            let text = bytes.read_string()?;
            if bytes.has_remaining() {
                return Err(Error::ProtocolSyncError(format!(
                    "Query message has {} trailing byte(s)",
                    bytes.remaining()
                )));
            }
            Ok(FrontendMessage::Query { text })
        }
        b'X' => Ok(FrontendMessage::Terminate),
        _ => Err(Error::UnsupportedMessage(code)),
    }
}

/// Parse the params the client sends as a key/value format.
pub fn parse_params(mut bytes: BytesMut) -> Result<HashMap<String, String>, Error> {
    let mut result = HashMap::new();

    // name\0value\0 ... \0, values may be empty.
    while bytes.has_remaining() {
        if bytes[0] == 0 {
            bytes.advance(1);
            break;
        }
        let name = bytes.read_string()?;
        let value = bytes.read_string()?;
        let _ = result.insert(name, value);
    }

    if bytes.has_remaining() {
        return Err(Error::ProtocolSyncError(format!(
            "Invalid client startup message: {} byte(s) after the parameter list",
            bytes.remaining()
        )));
    }

    // At least one pair must be present.
    if result.is_empty() {
        return Err(Error::ProtocolSyncError(
            "Invalid client startup message: no parameters".to_string(),
        ));
    }

    Ok(result)
}

/// Parse StartupMessage parameters.
/// e.g. user, database, application_name, etc.
pub fn parse_startup(bytes: BytesMut) -> Result<HashMap<String, String>, Error> {
    let result = parse_params(bytes)?;

    // The protocol requires the user at the very minimum.
    if !result.contains_key("user") {
        return Err(Error::ClientBadStartup);
    }

    Ok(result)
}

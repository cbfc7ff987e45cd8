//! Errors.

use crate::constants::{
    SQLSTATE_CONNECTION_FAILURE, SQLSTATE_INTERNAL_ERROR, SQLSTATE_PROGRAM_LIMIT_EXCEEDED,
    SQLSTATE_PROTOCOL_VIOLATION, SQLSTATE_SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION,
};

/// Various errors.
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    SocketError(String),
    ClientBadStartup,
    ProtocolSyncError(String),
    UnsupportedMessage(u8),
    MaxMessageSize,
    ParseBytesError(String),
    QueryError(String),
    ScanError(String),
    BadConfig(String),
    EngineError(String),
}

impl Error {
    /// Only a failed query leaves the session usable;
    /// everything else ends the connection.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::QueryError(_))
    }

    /// SQLSTATE reported to the client in an ErrorResponse.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            Error::QueryError(_) => SQLSTATE_SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION,
            Error::ScanError(_) => SQLSTATE_INTERNAL_ERROR,
            Error::MaxMessageSize => SQLSTATE_PROGRAM_LIMIT_EXCEEDED,
            Error::SocketError(_) => SQLSTATE_CONNECTION_FAILURE,
            Error::ClientBadStartup
            | Error::ProtocolSyncError(_)
            | Error::UnsupportedMessage(_)
            | Error::ParseBytesError(_) => SQLSTATE_PROTOCOL_VIOLATION,
            Error::BadConfig(_) | Error::EngineError(_) => SQLSTATE_INTERNAL_ERROR,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClientIdentifier {
    pub addr: String,
    pub application_name: String,
    pub username: String,
    pub database: String,
}

impl ClientIdentifier {
    pub fn new(
        application_name: &str,
        username: &str,
        database: &str,
        addr: &str,
    ) -> ClientIdentifier {
        ClientIdentifier {
            addr: addr.into(),
            application_name: application_name.into(),
            username: username.into(),
            database: database.into(),
        }
    }
}

impl std::fmt::Display for ClientIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{{ {}@{}/{}?application_name={} }}",
            self.username, self.addr, self.database, self.application_name
        )
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            Error::SocketError(msg) => write!(f, "Socket connection error: {msg}"),
            Error::ClientBadStartup => write!(f, "Client sent an invalid startup message"),
            Error::ProtocolSyncError(msg) => write!(f, "Protocol synchronization error: {msg}"),
            Error::UnsupportedMessage(code) => {
                write!(f, "Unsupported frontend message '{}'", *code as char)
            }
            Error::MaxMessageSize => write!(f, "Message exceeds maximum allowed size"),
            Error::ParseBytesError(msg) => write!(f, "Failed to parse bytes: {msg}"),
            Error::QueryError(msg) => write!(f, "Query execution error: {msg}"),
            Error::ScanError(msg) => write!(f, "Result scan error: {msg}"),
            Error::BadConfig(msg) => write!(f, "Configuration error: {msg}"),
            Error::EngineError(msg) => write!(f, "Database engine error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

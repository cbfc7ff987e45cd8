// ErrorResponse: A code identifying the field type; if zero, this is the message terminator and no string follows.
pub const MESSAGE_TERMINATOR: u8 = 0;

// AuthenticationOk
pub const AUTHENTICATION_SUCCESSFUL: i32 = 0;

// Used in the StartupMessage to indicate regular handshake.
pub const PROTOCOL_VERSION_NUMBER: i32 = 196608;

// SSLRequest: used to indicate we want an SSL connection.
pub const SSL_REQUEST_CODE: i32 = 80877103;

// CancelRequest: the cancel request code.
pub const CANCEL_REQUEST_CODE: i32 = 80877102;

pub const REQUEST_GSSENCMODE_CODE: i32 = 80877104;

// Startup packets are small; anything bigger is a confused client.
pub const MAX_STARTUP_PACKET_LENGTH: i32 = 10_000;

// Single byte answer to SSLRequest / GSSENCRequest: encryption not supported.
pub const NEGOTIATION_REFUSED: u8 = b'N';

// ReadyForQuery transaction status: idle.
pub const TRANSACTION_STATUS_IDLE: u8 = b'I';

// Most columns a result may have, the PostgreSQL target list limit.
pub const MAX_RESULT_COLUMNS: usize = 1664;

// SQLSTATE codes.
pub const SQLSTATE_PROTOCOL_VIOLATION: &str = "08P01";
pub const SQLSTATE_INTERNAL_ERROR: &str = "XX000";
pub const SQLSTATE_SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION: &str = "42000";
pub const SQLSTATE_PROGRAM_LIMIT_EXCEEDED: &str = "54000";
pub const SQLSTATE_CONNECTION_FAILURE: &str = "08006";

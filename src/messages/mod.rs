// PostgreSQL wire protocol: frontend decoding, backend encoding and socket helpers.

// Declare submodules
pub mod config_socket;
pub mod error;
pub mod frontend;
pub mod protocol;
pub mod socket;
#[cfg(test)]
pub mod test_utils;
pub mod types;

// Re-export public items
pub use config_socket::configure_tcp_socket;
pub use error::PgErrorMsg;
pub use frontend::{parse_message, parse_startup, parse_startup_packet, FrontendMessage};
pub use protocol::{
    authentication_ok, command_complete, data_row, empty_query_response, error_message,
    negotiation_refused, ready_for_query, row_description, select_tag,
};
pub use socket::{
    read_message, read_message_data, read_message_header, read_startup_message, write_all_flush,
    write_all_half,
};
pub use types::{resolve, BytesMutReader, ColumnDescriptor, DataType, WireType};

// Tests
#[cfg(test)]
mod tests;

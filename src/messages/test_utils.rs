// Frontend frames and backend frame splitting shared by the tests.

// External crate imports
use bytes::{BufMut, BytesMut};

// Internal crate imports
use crate::constants::*;

/// Create a simple query message.
pub fn simple_query(query: &str) -> BytesMut {
    let mut bytes = BytesMut::new();
    bytes.put_u8(b'Q');
    bytes.put_i32(4 + query.len() as i32 + 1);
    bytes.put_slice(query.as_bytes());
    bytes.put_u8(0);
    bytes
}

/// Create a startup message with the given parameters.
pub fn startup(params: &[(&str, &str)]) -> BytesMut {
    let mut bytes = BytesMut::new();

    // Protocol version
    bytes.put_i32(PROTOCOL_VERSION_NUMBER);

    for (key, value) in params {
        bytes.put_slice(key.as_bytes());
        bytes.put_u8(0);
        bytes.put_slice(value.as_bytes());
        bytes.put_u8(0);
    }
    bytes.put_u8(0); // Null terminator

    let mut startup = BytesMut::with_capacity(bytes.len() + 4);
    startup.put_i32(bytes.len() as i32 + 4);
    startup.put(bytes);
    startup
}

/// Create an SSL request.
pub fn ssl_request() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(8);
    bytes.put_i32(8);
    bytes.put_i32(SSL_REQUEST_CODE);
    bytes
}

/// Create a terminate message.
pub fn terminate() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(5);
    bytes.put_u8(b'X');
    bytes.put_i32(4);
    bytes
}

/// Create a GSS encryption request.
pub fn gss_request() -> BytesMut {
    let mut bytes = BytesMut::with_capacity(8);
    bytes.put_i32(8);
    bytes.put_i32(REQUEST_GSSENCMODE_CODE);
    bytes
}

/// Split backend messages into (tag, body) frames.
pub fn frames(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    while !bytes.is_empty() {
        let tag = bytes[0];
        let len = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        out.push((tag, bytes[5..1 + len].to_vec()));
        bytes = &bytes[1 + len..];
    }
    out
}

pub fn tags(bytes: &[u8]) -> Vec<u8> {
    frames(bytes).into_iter().map(|(tag, _)| tag).collect()
}

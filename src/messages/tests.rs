// Tests for the messages module
// Backend frames are checked with the client-side parser from postgres-protocol.

// External crate imports
use bytes::{BufMut, BytesMut};
use fallible_iterator::FallibleIterator;
use postgres_protocol::message::backend::Message;

// Internal crate imports
use crate::constants::*;
use crate::engine::Value;
use crate::errors::Error;
use crate::messages::test_utils::{simple_query, ssl_request, startup, terminate};
use crate::messages::socket::{read_message, read_startup_message};
use crate::messages::{
    authentication_ok, command_complete, data_row, empty_query_response, error_message,
    negotiation_refused, parse_message, parse_startup, ready_for_query, row_description,
    select_tag, ColumnDescriptor, FrontendMessage, PgErrorMsg,
};

/// Parse exactly one backend message out of `bytes`.
fn parse_one(bytes: &[u8]) -> Message {
    let mut buf = BytesMut::from(bytes);
    let message = Message::parse(&mut buf)
        .unwrap()
        .expect("a complete message");
    assert!(buf.is_empty(), "trailing bytes after the message");
    message
}

fn columns() -> Vec<ColumnDescriptor> {
    vec![
        ColumnDescriptor::new("id", "INTEGER"),
        ColumnDescriptor::new("name", "VARCHAR"),
        ColumnDescriptor::new("score", "DOUBLE"),
    ]
}

// Tests for parse_startup function
#[test]
fn test_parse_startup_success() {
    let mut bytes = BytesMut::new();

    // Add required "user" parameter
    bytes.put_slice(b"user\0testuser\0");
    // Add optional parameters
    bytes.put_slice(b"database\0testdb\0");
    bytes.put_slice(b"application_name\0\0");
    bytes.put_u8(0); // Final null terminator

    let params = parse_startup(bytes).unwrap();

    assert_eq!(params.len(), 3);
    assert_eq!(params.get("user"), Some(&"testuser".to_string()));
    assert_eq!(params.get("database"), Some(&"testdb".to_string()));
    // Empty values are allowed.
    assert_eq!(params.get("application_name"), Some(&String::new()));
}

#[test]
fn test_parse_startup_missing_user() {
    let mut bytes = BytesMut::new();
    bytes.put_slice(b"database\0testdb\0");
    bytes.put_u8(0);

    match parse_startup(bytes) {
        Err(Error::ClientBadStartup) => {} // Expected error
        _ => panic!("Expected ClientBadStartup error"),
    }
}

#[test]
fn test_parse_startup_truncated() {
    let mut bytes = BytesMut::new();
    bytes.put_slice(b"user\0test");

    assert!(parse_startup(bytes).is_err());
}

#[tokio::test]
async fn test_read_startup_messages() {
    let mut input = BytesMut::new();
    input.put(ssl_request());
    input.put(startup(&[("user", "alice"), ("database", "analytics")]));
    let mut stream = &input[..];

    assert_eq!(
        read_startup_message(&mut stream).await.unwrap(),
        FrontendMessage::SslRequest
    );
    match read_startup_message(&mut stream).await.unwrap() {
        FrontendMessage::Startup { params } => {
            assert_eq!(params["user"], "alice");
            assert_eq!(params["database"], "analytics");
        }
        other => panic!("Expected a StartupMessage, got {other:?}"),
    }
    assert!(stream.is_empty());
}

#[tokio::test]
async fn test_read_startup_bad_lengths() {
    // Shorter than the length and code themselves.
    let mut stream = &[0u8, 0, 0, 4][..];
    assert_eq!(
        read_startup_message(&mut stream).await,
        Err(Error::ClientBadStartup)
    );

    let mut too_long = BytesMut::new();
    too_long.put_i32(MAX_STARTUP_PACKET_LENGTH + 1);
    too_long.put_i32(PROTOCOL_VERSION_NUMBER);
    let mut stream = &too_long[..];
    assert_eq!(
        read_startup_message(&mut stream).await,
        Err(Error::ClientBadStartup)
    );

    let mut unknown = BytesMut::new();
    unknown.put_i32(8);
    unknown.put_i32(12345);
    let mut stream = &unknown[..];
    assert!(matches!(
        read_startup_message(&mut stream).await,
        Err(Error::ProtocolSyncError(_))
    ));
}

#[tokio::test]
async fn test_read_regular_messages() {
    let mut input = BytesMut::new();
    input.put(simple_query("SELECT 42"));
    input.put(terminate());
    let mut stream = &input[..];

    assert_eq!(
        read_message(&mut stream, 1024).await.unwrap(),
        FrontendMessage::Query {
            text: "SELECT 42".to_string()
        }
    );
    assert_eq!(
        read_message(&mut stream, 1024).await.unwrap(),
        FrontendMessage::Terminate
    );
    // Nothing left: the peer is gone.
    assert!(matches!(
        read_message(&mut stream, 1024).await,
        Err(Error::SocketError(_))
    ));
}

#[tokio::test]
async fn test_read_message_limits() {
    let query = simple_query(&"x".repeat(100));
    let mut stream = &query[..];
    assert_eq!(
        read_message(&mut stream, 64).await,
        Err(Error::MaxMessageSize)
    );

    let mut short = BytesMut::new();
    short.put_u8(b'Q');
    short.put_i32(3);
    let mut stream = &short[..];
    assert!(matches!(
        read_message(&mut stream, 1024).await,
        Err(Error::ProtocolSyncError(_))
    ));
}

#[test]
fn test_parse_unsupported_tags() {
    for tag in [b'P', b'B', b'E', b'D', b'S', b'H', b'F', b'd', b'C'] {
        assert_eq!(
            parse_message(tag, BytesMut::new()),
            Err(Error::UnsupportedMessage(tag))
        );
    }
}

#[test]
fn test_parse_query_requires_terminator() {
    let body = BytesMut::from(&b"SELECT 1"[..]);
    assert!(parse_message(b'Q', body).is_err());

    let body = BytesMut::from(&b"SELECT 1\0junk"[..]);
    assert!(matches!(
        parse_message(b'Q', body),
        Err(Error::ProtocolSyncError(_))
    ));

    let body = BytesMut::from(&[0xff, 0xfe, 0][..]);
    assert!(matches!(
        parse_message(b'Q', body),
        Err(Error::ParseBytesError(_))
    ));
}

#[test]
fn test_startup_replies() {
    assert_eq!(&negotiation_refused()[..], b"N");
    assert_eq!(&authentication_ok()[..], &[b'R', 0, 0, 0, 8, 0, 0, 0, 0]);
    assert_eq!(&ready_for_query()[..], &[b'Z', 0, 0, 0, 5, b'I']);
    assert_eq!(&empty_query_response()[..], &[b'I', 0, 0, 0, 4]);

    assert!(matches!(
        parse_one(&authentication_ok()),
        Message::AuthenticationOk
    ));
    match parse_one(&ready_for_query()) {
        Message::ReadyForQuery(body) => assert_eq!(body.status(), TRANSACTION_STATUS_IDLE),
        _ => panic!("Expected ReadyForQuery"),
    }
    assert!(matches!(
        parse_one(&empty_query_response()),
        Message::EmptyQueryResponse
    ));
}

#[test]
fn test_row_description_with_columns() {
    let result = row_description(&columns()).unwrap();

    match parse_one(&result) {
        Message::RowDescription(body) => {
            let fields = body.fields().collect::<Vec<_>>().unwrap();
            assert_eq!(fields.len(), 3);

            let expected = [("id", 23, 4), ("name", 25, -1), ("score", 701, 8)];
            for (field, (name, oid, size)) in fields.iter().zip(expected) {
                assert_eq!(field.name(), name);
                assert_eq!(field.table_oid(), 0);
                assert_eq!(field.column_id(), 0);
                assert_eq!(field.type_oid(), oid);
                assert_eq!(field.type_size(), size);
                assert_eq!(field.type_modifier(), -1);
                assert_eq!(field.format(), 0);
            }
        }
        _ => panic!("Expected RowDescription"),
    }
}

#[test]
fn test_row_description_without_columns() {
    let result = row_description(&[]).unwrap();
    assert_eq!(&result[..], &[b'T', 0, 0, 0, 6, 0, 0]);
}

#[test]
fn test_row_description_column_limit() {
    let mut columns = (0..MAX_RESULT_COLUMNS)
        .map(|idx| ColumnDescriptor::new(&format!("c{idx}"), "INTEGER"))
        .collect::<Vec<_>>();

    match parse_one(&row_description(&columns).unwrap()) {
        Message::RowDescription(body) => {
            assert_eq!(body.fields().count().unwrap(), MAX_RESULT_COLUMNS);
        }
        _ => panic!("Expected RowDescription"),
    }

    // Wider than an i16 count could carry.
    columns.resize(40_000, ColumnDescriptor::new("wide", "INTEGER"));
    match row_description(&columns) {
        Err(Error::QueryError(msg)) => assert!(msg.contains("40000 columns")),
        other => panic!("Expected QueryError, got {other:?}"),
    }
}

#[test]
fn test_data_row_too_many_values() {
    let columns = vec![ColumnDescriptor::new("wide", "INTEGER"); 40_000];
    let row = vec![Value::Int(1); 40_000];
    let mut buf = BytesMut::new();
    assert!(matches!(
        data_row(&mut buf, &row, &columns),
        Err(Error::ScanError(_))
    ));
    // Nothing half-written is left behind.
    assert!(buf.is_empty());
}

#[test]
fn test_data_row_with_null() {
    let columns = vec![
        ColumnDescriptor::new("answer", "INTEGER"),
        ColumnDescriptor::new("greeting", "VARCHAR"),
        ColumnDescriptor::new("nothing", "VARCHAR"),
    ];
    let mut buf = BytesMut::new();
    data_row(
        &mut buf,
        &[Value::Int(42), Value::Text("hello".into()), Value::Null],
        &columns,
    )
    .unwrap();

    match parse_one(&buf) {
        Message::DataRow(body) => {
            let ranges = body.ranges().collect::<Vec<_>>().unwrap();
            let values = ranges
                .into_iter()
                .map(|range| range.map(|range| body.buffer()[range].to_vec()))
                .collect::<Vec<_>>();
            assert_eq!(
                values,
                vec![Some(b"42".to_vec()), Some(b"hello".to_vec()), None]
            );
        }
        _ => panic!("Expected DataRow"),
    }

    // NULL is length -1, not an empty value.
    assert_eq!(&buf[buf.len() - 4..], &(-1i32).to_be_bytes());
}

#[test]
fn test_data_row_empty_string_is_not_null() {
    let columns = vec![ColumnDescriptor::new("empty", "VARCHAR")];
    let mut buf = BytesMut::new();
    data_row(&mut buf, &[Value::Text(String::new())], &columns).unwrap();

    assert_eq!(&buf[..], &[b'D', 0, 0, 0, 10, 0, 1, 0, 0, 0, 0]);
}

#[test]
fn test_data_rows_append() {
    let columns = vec![ColumnDescriptor::new("flag", "BOOLEAN")];
    let mut buf = BytesMut::new();
    data_row(&mut buf, &[Value::Bool(true)], &columns).unwrap();
    data_row(&mut buf, &[Value::Bool(false)], &columns).unwrap();

    let mut expected = BytesMut::new();
    for flag in [b't', b'f'] {
        expected.put_u8(b'D');
        expected.put_i32(11);
        expected.put_i16(1);
        expected.put_i32(1);
        expected.put_u8(flag);
    }
    assert_eq!(buf, expected);
}

#[test]
fn test_data_row_column_mismatch() {
    let mut buf = BytesMut::new();
    let result = data_row(&mut buf, &[Value::Int(1)], &columns());
    assert!(matches!(result, Err(Error::ScanError(_))));
    assert!(buf.is_empty());
}

#[test]
fn test_command_complete() {
    assert_eq!(select_tag(0), "SELECT 0");
    assert_eq!(select_tag(3), "SELECT 3");

    for rows in [0, 3] {
        match parse_one(&command_complete(&select_tag(rows))) {
            Message::CommandComplete(body) => {
                assert_eq!(body.tag().unwrap(), format!("SELECT {rows}"))
            }
            _ => panic!("Expected CommandComplete"),
        }
    }
}

// Helper function for PgErrorMsg tests
fn field(kind: char, content: &str) -> Vec<u8> {
    format!("{kind}{content}\0").as_bytes().to_vec()
}

#[test]
fn test_error_message() {
    let result = error_message(&PgErrorMsg::new(
        "ERROR",
        "42000",
        "Table foo does not exist",
    ));

    assert_eq!(result[0], b'E');
    let len = i32::from_be_bytes([result[1], result[2], result[3], result[4]]) as usize;
    assert_eq!(len, result.len() - 1);
    assert_eq!(result[result.len() - 1], MESSAGE_TERMINATOR);

    let mut expected = vec![];
    expected.extend(field('S', "ERROR"));
    expected.extend(field('V', "ERROR"));
    expected.extend(field('C', "42000"));
    expected.extend(field('M', "Table foo does not exist"));
    expected.push(0);
    assert_eq!(&result[5..], &expected[..]);

    assert!(matches!(parse_one(&result), Message::ErrorResponse(_)));
}

#[test]
fn test_error_from_errors() {
    let query = PgErrorMsg::from(&Error::QueryError("no such table: foo".into()));
    assert_eq!(query.severity, "ERROR");
    assert_eq!(query.code, "42000");
    assert_eq!(query.message, "no such table: foo");

    let scan = PgErrorMsg::from(&Error::ScanError("bad value".into()));
    assert_eq!(scan.severity, "FATAL");
    assert_eq!(scan.code, SQLSTATE_INTERNAL_ERROR);
    assert_eq!(scan.message, "bad value");

    let protocol = PgErrorMsg::from(&Error::UnsupportedMessage(b'P'));
    assert_eq!(protocol.severity_localized, "FATAL");
    assert_eq!(protocol.code, SQLSTATE_PROTOCOL_VIOLATION);
    assert!(!protocol.message.is_empty());
}

#[test]
fn test_error_message_drops_nul_bytes() {
    let result = error_message(&PgErrorMsg::from(&Error::QueryError(
        "Invalid Input Error: bad\0value".into(),
    )));

    assert!(matches!(parse_one(&result), Message::ErrorResponse(_)));

    // The message is not cut short at the NUL.
    let parsed = PgErrorMsg::parse(&result[5..]).unwrap();
    assert_eq!(parsed.message, "Invalid Input Error: badvalue");
    assert_eq!(parsed.code, "42000");
}

// Tests for PgErrorMsg parsing
#[test]
fn test_pg_error_msg_parsing() {
    let mut complete_msg = vec![];
    let severity = "FATAL";
    complete_msg.extend(field('S', severity));
    complete_msg.extend(field('V', severity));

    let error_code = "08P01";
    complete_msg.extend(field('C', error_code));
    let message = "unsupported frontend message";
    complete_msg.extend(field('M', message));
    let detail_msg = "super detailed message";
    complete_msg.extend(field('D', detail_msg));
    let hint_msg = "hint detail here";
    complete_msg.extend(field('H', hint_msg));
    // Fields this server never sends are skipped.
    complete_msg.extend(field('P', "123"));
    complete_msg.extend(field('R', "my_failing_routine"));
    complete_msg.push(0);

    let err_fields = PgErrorMsg::parse(&complete_msg).unwrap();

    assert_eq!(
        PgErrorMsg {
            severity_localized: severity.to_string(),
            severity: severity.to_string(),
            code: error_code.to_string(),
            message: message.to_string(),
            detail: Some(detail_msg.to_string()),
            hint: Some(hint_msg.to_string()),
        },
        err_fields
    );
    assert_eq!(PgErrorMsg::parse(&err_fields.encode()).unwrap(), err_fields);
    assert_eq!(
        err_fields.to_string(),
        "FATAL: unsupported frontend message [08P01][detail: super detailed message][hint: hint detail here]"
    );

    // Unterminated field.
    assert!(PgErrorMsg::parse(b"SFATAL").is_err());
}

//! Runs a simple query against the engine and streams the encoded result
//! (RowDescription, DataRow*, CommandComplete) to the client.
//!
//! The engine blocks, so rows are pulled and encoded on tokio's blocking
//! pool. Encoded chunks of roughly `buffer_size` bytes go through a bounded
//! channel to the connection task, which writes them out. When the client
//! goes away the channel closes and the producer stops early.

// Standard library imports
use std::sync::Arc;

// External crate imports
use bytes::{BufMut, BytesMut};
use log::debug;
use tokio::sync::mpsc;

// Internal crate imports
use crate::engine::{CursorGuard, Engine};
use crate::errors::Error;
use crate::messages::{
    command_complete, data_row, row_description, select_tag, write_all_half, ColumnDescriptor,
};

/// Encoded chunks waiting to be written before the producer has to wait.
const MAX_PENDING_CHUNKS: usize = 4;

/// Execute `sql` and encode its result, handing chunks to `emit`.
///
/// `emit` returns false when nobody is listening anymore, which stops the
/// scan. A failed execution emits nothing. A failed scan first emits what
/// was already encoded. The cursor is closed on every path.
pub fn encode_result<E, F>(
    engine: &E,
    sql: &str,
    buffer_size: usize,
    mut emit: F,
) -> Result<u64, Error>
where
    E: Engine,
    F: FnMut(BytesMut) -> bool,
{
    let cursor = match engine.execute(sql) {
        Ok(cursor) => cursor,
        Err(err) => return Err(Error::QueryError(err.to_string())),
    };
    let mut cursor = CursorGuard::new(cursor);

    let columns = cursor
        .columns()
        .iter()
        .map(ColumnDescriptor::from)
        .collect::<Vec<_>>();

    // Too wide a result fails like a bad statement, nothing is sent yet.
    let description = row_description(&columns)?;

    let mut buf = BytesMut::with_capacity(buffer_size);
    buf.put(description);

    let mut rows: u64 = 0;
    loop {
        let row = match cursor.next_row() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(err) => {
                emit_remaining(&mut buf, &mut emit);
                return Err(Error::ScanError(err.to_string()));
            }
        };

        if let Err(err) = data_row(&mut buf, &row, &columns) {
            emit_remaining(&mut buf, &mut emit);
            return Err(err);
        }
        rows += 1;

        if buf.len() >= buffer_size && !emit(buf.split()) {
            return Err(Error::SocketError(
                "Client stopped receiving query results".to_string(),
            ));
        }
    }
    cursor.close();

    buf.put(command_complete(&select_tag(rows)));
    if !emit(buf) {
        return Err(Error::SocketError(
            "Client stopped receiving query results".to_string(),
        ));
    }

    Ok(rows)
}

fn emit_remaining<F>(buf: &mut BytesMut, emit: &mut F)
where
    F: FnMut(BytesMut) -> bool,
{
    if !buf.is_empty() {
        let _ = emit(buf.split());
    }
}

/// Execute `sql` on the blocking pool and write its encoded result to
/// `write`. Returns the number of rows sent. ReadyForQuery is left to the
/// caller.
pub async fn stream_query<E, W>(
    engine: Arc<E>,
    sql: String,
    write: &mut W,
    buffer_size: usize,
) -> Result<u64, Error>
where
    E: Engine,
    W: tokio::io::AsyncWrite + std::marker::Unpin,
{
    let (tx, mut rx) = mpsc::channel::<BytesMut>(MAX_PENDING_CHUNKS);

    let producer = tokio::task::spawn_blocking(move || {
        encode_result(engine.as_ref(), &sql, buffer_size, |chunk| {
            tx.blocking_send(chunk).is_ok()
        })
    });

    let mut written = Ok(());
    while let Some(chunk) = rx.recv().await {
        if let Err(err) = write_all_half(write, &chunk).await {
            written = Err(err);
            break;
        }
    }
    // Unblocks a producer still waiting to send.
    drop(rx);

    let produced = match producer.await {
        Ok(produced) => produced,
        Err(err) => Err(Error::ScanError(format!("Query task failed: {err}"))),
    };

    written?;
    let rows = produced?;
    debug!("Streamed {rows} row(s)");
    Ok(rows)
}

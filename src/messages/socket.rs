// External crate imports
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// Internal crate imports
use crate::constants::MAX_STARTUP_PACKET_LENGTH;
use crate::errors::Error;
use crate::messages::frontend::{parse_message, parse_startup_packet, FrontendMessage};

/// Write all the data in the buffer to the TcpStream, write owned half (see mpsc).
pub async fn write_all_half<S>(stream: &mut S, buf: &BytesMut) -> Result<(), Error>
where
    S: tokio::io::AsyncWrite + std::marker::Unpin,
{
    match stream.write_all(buf).await {
        Ok(_) => Ok(()),
        Err(err) => Err(Error::SocketError(format!(
            "Error writing to socket: {err:?}"
        ))),
    }
}

/// Write all the data in the buffer to the TcpStream and flush the stream.
pub async fn write_all_flush<S>(stream: &mut S, buf: &[u8]) -> Result<(), Error>
where
    S: tokio::io::AsyncWrite + std::marker::Unpin,
{
    match stream.write_all(buf).await {
        Ok(_) => match stream.flush().await {
            Ok(_) => Ok(()),
            Err(err) => Err(Error::SocketError(format!(
                "Error flushing socket: {err:?}"
            ))),
        },
        Err(err) => Err(Error::SocketError(format!(
            "Error writing to socket: {err:?}"
        ))),
    }
}

/// Read message header.
pub async fn read_message_header<S>(stream: &mut S) -> Result<(u8, i32), Error>
where
    S: tokio::io::AsyncRead + std::marker::Unpin,
{
    let code = match stream.read_u8().await {
        Ok(code) => code,
        Err(err) => {
            return Err(Error::SocketError(format!(
                "Error reading message code from socket - Error {err:?}"
            )))
        }
    };
    let len = match stream.read_i32().await {
        Ok(len) => len,
        Err(err) => {
            return Err(Error::SocketError(format!(
                "Error reading message len from socket - Code: {code:?}, Error: {err:?}"
            )))
        }
    };

    Ok((code, len))
}

/// Read the body of a message whose header is already consumed.
/// `len` counts itself, as on the wire.
pub async fn read_message_data<S>(
    stream: &mut S,
    code: u8,
    len: i32,
    max_message_size: i32,
) -> Result<BytesMut, Error>
where
    S: tokio::io::AsyncRead + std::marker::Unpin,
{
    if len < 4 {
        return Err(Error::ProtocolSyncError(format!(
            "Message length is too small: {len}"
        )));
    }

    if len > max_message_size {
        return Err(Error::MaxMessageSize);
    }

    let mut data = BytesMut::zeroed(len as usize - 4);

    match stream.read_exact(&mut data).await {
        Ok(_) => Ok(data),
        Err(err) => Err(Error::SocketError(format!(
            "Error reading message data from socket - Code: {code:?}, Error: {err:?}"
        ))),
    }
}

/// Read and decode one regular (tagged) message.
pub async fn read_message<S>(stream: &mut S, max_message_size: i32) -> Result<FrontendMessage, Error>
where
    S: tokio::io::AsyncRead + std::marker::Unpin,
{
    let (code, len) = read_message_header(stream).await?;
    let bytes = read_message_data(stream, code, len, max_message_size).await?;
    parse_message(code, bytes)
}

/// Read and decode one startup-phase packet (no tag byte).
pub async fn read_startup_message<S>(stream: &mut S) -> Result<FrontendMessage, Error>
where
    S: tokio::io::AsyncRead + std::marker::Unpin,
{
    let len = match stream.read_i32().await {
        Ok(len) => len,
        Err(err) => {
            return Err(Error::SocketError(format!(
                "Error reading startup packet length from socket - Error {err:?}"
            )))
        }
    };

    // Length counts itself and the request code at the very least.
    if !(8..=MAX_STARTUP_PACKET_LENGTH).contains(&len) {
        return Err(Error::ClientBadStartup);
    }

    let mut data = BytesMut::zeroed(len as usize - 4);
    match stream.read_exact(&mut data).await {
        Ok(_) => parse_startup_packet(data),
        Err(err) => Err(Error::SocketError(format!(
            "Error reading startup packet from socket - Error: {err:?}"
        ))),
    }
}

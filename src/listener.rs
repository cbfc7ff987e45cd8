//! Accepts client connections and runs one task per connection.

// Standard library imports
use std::net::SocketAddr;
use std::sync::Arc;

// External crate imports
use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpSocket};

// Internal crate imports
use crate::client::client_entrypoint;
use crate::config::get_config;
use crate::engine::Engine;
use crate::errors::Error;
use crate::format_duration;
use crate::messages::configure_tcp_socket;

/// Bind the listening socket. Must be called inside a tokio runtime.
pub fn bind(host: &str, port: u16, backlog: u32) -> Result<TcpListener, Error> {
    let addr: SocketAddr = match format!("{host}:{port}").parse() {
        Ok(addr) => addr,
        Err(err) => {
            return Err(Error::BadConfig(format!(
                "Invalid listen address {host}:{port}: {err}"
            )))
        }
    };

    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    };
    let listener = socket
        .and_then(|socket| {
            socket.set_reuseaddr(true)?;
            socket.set_nodelay(true)?;
            socket.bind(addr)?;
            socket.listen(backlog)
        })
        .map_err(|err| Error::SocketError(format!("Could not listen on {addr}: {err}")))?;

    info!("Running on {addr}");
    Ok(listener)
}

/// Accept connections until the listener fails. Every connection gets its
/// own task sharing `engine`.
pub async fn serve<E: Engine>(listener: TcpListener, engine: Arc<E>) -> Result<(), Error> {
    info!("Waiting for dear clients");

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => return Err(Error::SocketError(format!("Accept error: {err:?}"))),
        };

        let log_client_connections = get_config().general.log_client_connections;
        if log_client_connections {
            info!("Client {addr} connected");
        } else {
            debug!("Client {addr} connected");
        }

        configure_tcp_socket(&socket);
        let engine = engine.clone();
        tokio::task::spawn(async move {
            let start = chrono::offset::Utc::now().naive_utc();

            match client_entrypoint(socket, engine).await {
                Ok(()) => {
                    let duration = chrono::offset::Utc::now().naive_utc() - start;

                    if log_client_connections {
                        info!(
                            "Client {addr} disconnected, session duration: {}",
                            format_duration(&duration)
                        );
                    } else {
                        debug!(
                            "Client {addr} disconnected, session duration: {}",
                            format_duration(&duration)
                        );
                    }
                }

                Err(err) => {
                    let duration = chrono::offset::Utc::now().naive_utc() - start;
                    warn!(
                        "Client {addr} disconnected with error {err}, duration: {}",
                        format_duration(&duration)
                    );
                }
            };
        });
    }
}

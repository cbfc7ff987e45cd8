//! Handle clients by pretending to be a PostgreSQL server.

use bytes::BufMut;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{split, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::get_config;
use crate::engine::Engine;
use crate::errors::{ClientIdentifier, Error};
use crate::messages::*;
use crate::query::stream_query;

/// Where a connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the first startup-phase packet.
    AwaitingStartup,
    /// An encryption request was refused, waiting for the real startup.
    SslNegotiation,
    /// Startup done, serving queries.
    Ready,
    Terminated,
}

/// The client state. One of these is created per client.
pub struct Client<S, T, E> {
    /// The reads are buffered (8K by default).
    read: BufReader<S>,

    /// Query results are buffered by the streamer, everything else is
    /// written and flushed as a whole message.
    write: T,

    /// Shared database engine.
    engine: Arc<E>,

    /// Address
    addr: String,

    phase: Phase,

    /// Each kind of encryption request is answered once per connection.
    ssl_refused: bool,
    gss_refused: bool,

    /// Set once the socket has been shut down.
    closed: bool,

    /// Filled in from the StartupMessage.
    identifier: Option<ClientIdentifier>,

    max_message_size: i32,
    result_buffer_size: usize,
    log_client_connections: bool,
}

/// Serve one accepted TCP connection until it ends.
pub async fn client_entrypoint<E: Engine>(
    stream: TcpStream,
    engine: Arc<E>,
) -> Result<(), Error> {
    let addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(err) => {
            return Err(Error::SocketError(format!(
                "Failed to get peer address: {err:?}"
            )));
        }
    };

    let (read, write) = split(stream);
    let mut client = Client::new(read, write, engine, addr.to_string());
    client.run().await
}

impl<S, T, E> Client<S, T, E>
where
    S: tokio::io::AsyncRead + std::marker::Unpin,
    T: tokio::io::AsyncWrite + std::marker::Unpin,
    E: Engine,
{
    pub fn new(read: S, write: T, engine: Arc<E>, addr: String) -> Client<S, T, E> {
        let config = get_config();
        Client {
            read: BufReader::new(read),
            write,
            engine,
            addr,
            phase: Phase::AwaitingStartup,
            ssl_refused: false,
            gss_refused: false,
            closed: false,
            identifier: None,
            max_message_size: config.general.max_message_size,
            result_buffer_size: config.general.result_buffer_size,
            log_client_connections: config.general.log_client_connections,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the connection: startup, then queries until the client leaves or
    /// a fatal error occurs. The socket is closed on return.
    pub async fn run(&mut self) -> Result<(), Error> {
        if self.phase != Phase::AwaitingStartup {
            return Ok(());
        }

        let result = match self.startup().await {
            Ok(()) if self.phase == Phase::Ready => self.handle().await,
            Ok(()) => Ok(()),
            Err(err) => Err(err),
        };

        self.close().await;
        result
    }

    /// Startup phase. Encryption requests are refused with 'N' and nothing
    /// but those refusals and the final AuthenticationOk + ReadyForQuery is
    /// ever sent here, errors included.
    pub async fn startup(&mut self) -> Result<(), Error> {
        loop {
            let message = read_startup_message(&mut self.read).await?;

            match message {
                FrontendMessage::SslRequest if !self.ssl_refused => {
                    debug!("Client {}: refusing SSL", self.addr);
                    self.ssl_refused = true;
                    self.refuse_negotiation().await?;
                }

                FrontendMessage::GssEncRequest if !self.gss_refused => {
                    debug!("Client {}: refusing GSS encryption", self.addr);
                    self.gss_refused = true;
                    self.refuse_negotiation().await?;
                }

                FrontendMessage::SslRequest | FrontendMessage::GssEncRequest => {
                    return Err(Error::ProtocolSyncError(format!(
                        "{} sent twice",
                        message.name()
                    )));
                }

                FrontendMessage::Startup { params } => {
                    let username = params.get("user").map(String::as_str).unwrap_or_default();
                    let database = params
                        .get("database")
                        .map(String::as_str)
                        .unwrap_or(username);
                    let application_name = params
                        .get("application_name")
                        .map(String::as_str)
                        .unwrap_or("pg_duckdb_gateway");
                    let identifier =
                        ClientIdentifier::new(application_name, username, database, &self.addr);
                    debug!("Client {identifier} startup parameters: {params:?}");

                    let mut res = authentication_ok();
                    res.put(ready_for_query());
                    write_all_flush(&mut self.write, &res).await?;

                    if self.log_client_connections {
                        info!("Client {identifier} connected");
                    } else {
                        debug!("Client {identifier} connected");
                    }
                    self.identifier = Some(identifier);
                    self.phase = Phase::Ready;
                    return Ok(());
                }

                // Queries never run in the background, so there is nothing
                // to cancel. A real server closes such connections silently too.
                FrontendMessage::CancelRequest { process_id, .. } => {
                    debug!(
                        "Client {}: ignoring cancel request for process {process_id}",
                        self.addr
                    );
                    self.phase = Phase::Terminated;
                    return Ok(());
                }

                FrontendMessage::Query { .. } | FrontendMessage::Terminate => {
                    return Err(Error::ProtocolSyncError(format!(
                        "Unexpected {} during startup",
                        message.name()
                    )));
                }
            }
        }
    }

    async fn refuse_negotiation(&mut self) -> Result<(), Error> {
        write_all_flush(&mut self.write, &negotiation_refused()).await?;
        self.phase = Phase::SslNegotiation;
        Ok(())
    }

    /// Receive loop of a ready connection.
    pub async fn handle(&mut self) -> Result<(), Error> {
        loop {
            let message = match read_message(&mut self.read, self.max_message_size).await {
                Ok(message) => message,
                Err(err) => return self.process_error(err).await,
            };

            match message {
                FrontendMessage::Query { text } => {
                    if let Err(err) = self.query(text).await {
                        self.process_error(err).await?;
                    }
                }

                FrontendMessage::Terminate => {
                    debug!("Client {} sent Terminate", self.addr);
                    self.phase = Phase::Terminated;
                    return Ok(());
                }

                FrontendMessage::Startup { .. }
                | FrontendMessage::SslRequest
                | FrontendMessage::GssEncRequest
                | FrontendMessage::CancelRequest { .. } => {
                    return self
                        .process_error(Error::ProtocolSyncError(format!(
                            "Unexpected {} after startup",
                            message.name()
                        )))
                        .await;
                }
            }
        }
    }

    /// Run one simple query and finish it with ReadyForQuery.
    async fn query(&mut self, text: String) -> Result<(), Error> {
        if text.trim().is_empty() {
            let mut res = empty_query_response();
            res.put(ready_for_query());
            return write_all_flush(&mut self.write, &res).await;
        }

        debug!("Client {} query: {text}", self.addr);
        let started_at = Instant::now();
        let rows = stream_query(
            self.engine.clone(),
            text,
            &mut self.write,
            self.result_buffer_size,
        )
        .await?;
        debug!(
            "Client {}: {rows} row(s) in {} ms",
            self.addr,
            started_at.elapsed().as_millis()
        );

        write_all_flush(&mut self.write, &ready_for_query()).await
    }

    /// Report an error to the client. Returns Ok if the session goes on.
    async fn process_error(&mut self, err: Error) -> Result<(), Error> {
        match err {
            // Nobody left to tell.
            Error::SocketError(_) => Err(err),

            _ if err.is_recoverable() => {
                warn!("Client {}: {err}", self.addr);
                let mut res = error_message(&PgErrorMsg::from(&err));
                res.put(ready_for_query());
                write_all_flush(&mut self.write, &res).await
            }

            _ => {
                error!("Client {}: closing connection: {err}", self.addr);
                let res = error_message(&PgErrorMsg::from(&err));
                // Best effort, the connection is going away either way.
                let _ = write_all_flush(&mut self.write, &res).await;
                Err(err)
            }
        }
    }

    /// Enter `Terminated` and shut the socket down. Only the first call has
    /// any effect.
    pub async fn close(&mut self) {
        self.phase = Phase::Terminated;
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.write.shutdown().await {
            debug!("Client {}: error on shutdown: {err}", self.addr);
        }
    }
}

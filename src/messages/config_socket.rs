// Standard library imports
use std::time::Duration;

// External crate imports
use log::warn;
use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpStream;

// Internal crate imports
use crate::config::get_config;

/// Apply the configured keepalive, linger and nodelay settings to an
/// accepted client socket. Failures are logged and otherwise ignored.
pub fn configure_tcp_socket(stream: &TcpStream) {
    let sock_ref = SockRef::from(stream);
    let config = get_config();
    let general = &config.general;

    if let Err(err) = sock_ref.set_linger(Some(Duration::from_secs(general.tcp_so_linger))) {
        warn!("Could not set tcp_so_linger on client socket: {err}");
    }

    if let Err(err) = sock_ref.set_nodelay(general.tcp_no_delay) {
        warn!("Could not set tcp_no_delay on client socket: {err}");
    }

    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(general.tcp_keepalives_idle))
        .with_interval(Duration::from_secs(general.tcp_keepalives_interval))
        .with_retries(general.tcp_keepalives_count);
    if let Err(err) = sock_ref.set_tcp_keepalive(&keepalive) {
        warn!("Could not enable tcp keepalive on client socket: {err}");
    }
}

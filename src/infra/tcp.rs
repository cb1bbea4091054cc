//! TCP connection establishment.

use super::tls::ConnectError;
use crate::request::Phase;
use std::net::{IpAddr, SocketAddr};
use tokio::{
    net::TcpStream,
    time::{timeout_at, Instant},
};

/// Connects to the first reachable address, in resolver order.
///
/// Refusals move on to the next address; the deadline covers all of them.
pub async fn connect_any(
    addrs: &[IpAddr],
    port: u16,
    deadline: Instant,
) -> Result<TcpStream, ConnectError> {
    let mut last_error = None;

    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        match timeout_at(deadline, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => return Ok(stream),
            Ok(Err(e)) => {
                tracing::debug!(%addr, "TCP connect failed: {}", e);
                last_error = Some(format!("{addr}: {e}"));
            }
            Err(_) => return Err(ConnectError::TimedOut(Phase::Connecting)),
        }
    }

    Err(ConnectError::Network(match last_error {
        Some(e) => format!("TCP connection failed: {e}"),
        None => "no addresses to connect to".to_string(),
    }))
}

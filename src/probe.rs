use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, trace};

/// Classification of a single connection attempt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// The connection was accepted.
    Open,
    /// Refused, reset, or no answer before the deadline.
    Closed,
    /// Any other socket-level failure (no route, network down, ...).
    Unreachable,
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Open => "open",
            ProbeOutcome::Closed => "closed",
            ProbeOutcome::Unreachable => "unreachable",
        }
    }
}

/// Try a TCP connect to `address:port`, bounded by `timeout`.
///
/// An accepted connection is dropped right away. Failures never propagate:
/// the worst a port can do is come back `Unreachable`.
pub async fn probe(address: IpAddr, port: u16, timeout: Duration) -> ProbeOutcome {
    let addr = SocketAddr::new(address, port);
    let outcome = match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            ProbeOutcome::Open
        }
        Ok(Err(e)) => {
            let outcome = classify_connect_error(&e);
            if outcome == ProbeOutcome::Unreachable {
                debug!(%addr, error = %e, "port unreachable");
            }
            outcome
        }
        Err(_elapsed) => ProbeOutcome::Closed,
    };
    trace!(%addr, outcome = outcome.as_str(), "probed");
    outcome
}

/// Map a connect error onto an outcome.
pub fn classify_connect_error(err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::TimedOut => ProbeOutcome::Closed,
        _ => ProbeOutcome::Unreachable,
    }
}

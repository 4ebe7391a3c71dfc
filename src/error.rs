//! Error types for port-reach.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a scan or a certificate check.
///
/// Per-port probe failures are not errors; they are reported as
/// [`ProbeOutcome`](crate::probe::ProbeOutcome) values.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("hostname must not be empty")]
    EmptyHostname,

    #[error("port list must not be empty")]
    EmptyPortList,

    #[error("worker count must be greater than 0")]
    InvalidWorkerCount,

    #[error("line {line}: invalid port entry `{token}`: {reason}")]
    InvalidPortEntry {
        line: usize,
        token: String,
        reason: String,
    },

    #[error("failed to read {}: {source}", .path.display())]
    PortsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Resolution Errors ===
    #[error("hostname {hostname} could not be resolved: {source}")]
    Resolution {
        hostname: String,
        #[source]
        source: std::io::Error,
    },

    // === TLS Errors ===
    #[error("TLS check for {hostname} timed out after {timeout:?}")]
    TlsTimeout { hostname: String, timeout: Duration },

    #[error("TLS check for {hostname} failed: {reason}")]
    Tls { hostname: String, reason: String },
}

impl Error {
    pub(crate) fn tls(hostname: &str, reason: impl std::fmt::Display) -> Self {
        Error::Tls {
            hostname: hostname.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error was detected before any network activity.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::EmptyHostname
                | Error::EmptyPortList
                | Error::InvalidWorkerCount
                | Error::InvalidPortEntry { .. }
                | Error::PortsFile { .. }
        )
    }
}

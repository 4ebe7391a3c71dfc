//! TLS certificate expiry check.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use x509_parser::prelude::*;

use crate::error::{Error, Result};
use crate::resolver;

/// Settings for [`check_expiry_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertCheckConfig {
    pub port: u16,
    /// Bounds resolution, connect and handshake together.
    pub timeout: Duration,
    /// Skip chain and hostname verification (self-signed targets).
    pub accept_invalid_certs: bool,
}

impl Default for CertCheckConfig {
    fn default() -> Self {
        Self {
            port: 443,
            timeout: Duration::from_secs(3),
            accept_invalid_certs: false,
        }
    }
}

impl CertCheckConfig {
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Validity end of the certificate a host presented.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertInfo {
    pub hostname: String,
    #[serde(with = "::time::serde::rfc3339")]
    pub not_after: OffsetDateTime,
}

impl CertInfo {
    /// Decode a DER certificate and keep its "not valid after" time.
    pub fn from_der(hostname: &str, der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::tls(hostname, format!("certificate parse failed: {e}")))?;
        Ok(Self {
            hostname: hostname.to_string(),
            not_after: cert.validity().not_after.to_datetime(),
        })
    }

    /// Time left until expiry, negative once expired.
    pub fn remaining(&self) -> ::time::Duration {
        self.remaining_at(OffsetDateTime::now_utc())
    }

    pub fn remaining_at(&self, now: OffsetDateTime) -> ::time::Duration {
        self.not_after - now
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_negative()
    }
}

impl fmt::Display for CertInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expires = self
            .not_after
            .format(&well_known::Rfc3339)
            .map_err(|_| fmt::Error)?;
        write!(f, "SSL cert for {} expires at {}", self.hostname, expires)
    }
}

/// Check the certificate served on port 443 with a 3 second deadline.
pub async fn check_expiry(hostname: &str) -> Result<CertInfo> {
    check_expiry_with(hostname, &CertCheckConfig::default()).await
}

/// Resolve `hostname`, complete a TLS handshake and read the peer
/// certificate's `notAfter`.
///
/// Every failure, resolution included, is fatal to this check only and comes
/// back as [`Error::Tls`] or [`Error::TlsTimeout`]. There is no retry.
pub async fn check_expiry_with(hostname: &str, config: &CertCheckConfig) -> Result<CertInfo> {
    let hostname = hostname.trim();
    if hostname.is_empty() {
        return Err(Error::EmptyHostname);
    }

    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .danger_accept_invalid_hostnames(config.accept_invalid_certs)
        .build()
        .map_err(|e| Error::tls(hostname, e))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let handshake = async {
        let address = resolver::resolve(hostname)
            .await
            .map_err(|e| Error::tls(hostname, e))?;
        let addr = SocketAddr::new(address, config.port);
        debug!(%addr, "connecting for certificate check");
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::tls(hostname, format!("connect to {addr} failed: {e}")))?;
        connector
            .connect(hostname, stream)
            .await
            .map_err(|e| Error::tls(hostname, format!("handshake failed: {e}")))
    };

    let tls = timeout(config.timeout, handshake)
        .await
        .map_err(|_| Error::TlsTimeout {
            hostname: hostname.to_string(),
            timeout: config.timeout,
        })??;

    let cert = tls
        .get_ref()
        .peer_certificate()
        .map_err(|e| Error::tls(hostname, e))?
        .ok_or_else(|| Error::tls(hostname, "server presented no certificate"))?;
    let der = cert.to_der().map_err(|e| Error::tls(hostname, e))?;

    let info = CertInfo::from_der(hostname, &der)?;
    debug!(hostname, not_after = %info.not_after, "certificate read");
    Ok(info)
}

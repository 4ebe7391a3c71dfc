use std::io;
use std::net::IpAddr;

use tokio::net::lookup_host;
use tracing::debug;

use crate::error::{Error, Result};

/// Resolve `hostname` to a single connectable address.
///
/// IP literals are returned as-is. For names, the first IPv4 address wins,
/// falling back to the first address of any family. Both "not found" and
/// transient resolver failures surface as [`Error::Resolution`]; retrying is
/// up to the caller.
pub async fn resolve(hostname: &str) -> Result<IpAddr> {
    let hostname = hostname.trim();
    if hostname.is_empty() {
        return Err(Error::EmptyHostname);
    }
    if let Ok(ip) = hostname.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = lookup_host((hostname, 0))
        .await
        .map_err(|source| Error::Resolution {
            hostname: hostname.to_string(),
            source,
        })?
        .map(|sock| sock.ip())
        .collect();

    let chosen = addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
        .ok_or_else(|| Error::Resolution {
            hostname: hostname.to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "lookup returned no addresses"),
        })?;

    debug!(hostname, address = %chosen, candidates = addrs.len(), "resolved host");
    Ok(chosen)
}

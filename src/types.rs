use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::probe::ProbeOutcome;
use crate::resolver;

/// Host and ports to scan. The address is resolved once, up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    hostname: String,
    address: IpAddr,
    ports: Vec<u16>,
}

impl ScanTarget {
    /// Resolve `hostname` and build a target for `ports`.
    ///
    /// The port list is checked before any lookup happens, so an empty list
    /// never touches the network.
    pub async fn resolve(hostname: &str, ports: Vec<u16>) -> Result<Self> {
        if hostname.trim().is_empty() {
            return Err(Error::EmptyHostname);
        }
        if ports.is_empty() {
            return Err(Error::EmptyPortList);
        }
        let address = resolver::resolve(hostname).await?;
        Ok(Self {
            hostname: hostname.trim().to_string(),
            address,
            ports,
        })
    }

    /// Build a target for an address that is already known.
    pub fn with_address(hostname: &str, address: IpAddr, ports: Vec<u16>) -> Result<Self> {
        if hostname.trim().is_empty() {
            return Err(Error::EmptyHostname);
        }
        if ports.is_empty() {
            return Err(Error::EmptyPortList);
        }
        Ok(Self {
            hostname: hostname.trim().to_string(),
            address,
            ports,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

/// Scan tuning knobs, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    worker_count: usize,
    connect_timeout: Duration,
    scan_timeout: Duration,
    verbose: bool,
}

impl ScanConfig {
    pub const DEFAULT_WORKERS: usize = 100;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
    pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(70);

    pub fn new(worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(Error::InvalidWorkerCount);
        }
        Ok(Self {
            worker_count,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            verbose: false,
        })
    }

    /// Deadline for a single connection attempt.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Deadline for the whole scan, measured from worker spawn.
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn per_connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn total_scan_timeout(&self) -> Duration {
        self.scan_timeout
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            worker_count: Self::DEFAULT_WORKERS,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            scan_timeout: Self::DEFAULT_SCAN_TIMEOUT,
            verbose: false,
        }
    }
}

/// Outcome of scanning one port.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortResult {
    pub port: u16,
    pub open: bool,
}

impl PortResult {
    pub fn from_outcome(port: u16, outcome: ProbeOutcome) -> Self {
        Self {
            port,
            open: outcome == ProbeOutcome::Open,
        }
    }
}

/// Point-in-time view of a running scan.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanStatus {
    pub open: u64,
    pub scanned: u64,
    pub elapsed: Duration,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Open Ports Found: {}, Scanned Ports: {}, Elapsed time: {} sec",
            self.open,
            self.scanned,
            self.elapsed.as_secs()
        )
    }
}

/// Final result of a scan, frozen after the workers were joined.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub hostname: String,
    pub address: IpAddr,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub scanned_total: u64,
    pub scanned_done: u64,
    /// Open ports, ascending and without duplicates.
    pub open_ports: Vec<u16>,
    /// The total scan deadline fired before every worker finished.
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn is_complete(&self) -> bool {
        !self.timed_out && !self.cancelled && self.scanned_done == self.scanned_total
    }
}

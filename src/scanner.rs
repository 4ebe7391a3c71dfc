use crate::probe::{self, ProbeOutcome};
use crate::progress::{ProgressSink, TerminalProgress};
use crate::types::{PortResult, ScanConfig, ScanReport, ScanStatus, ScanTarget};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ::time::{format_description::well_known, OffsetDateTime};

/// Scan `target` and return the frozen report.
///
/// With `config.is_verbose()` a status line is rewritten on stdout after
/// every port and terminated once the scan ends.
pub async fn scan(target: &ScanTarget, config: &ScanConfig) -> ScanReport {
    scan_with_cancel(target, config, CancellationToken::new()).await
}

/// Variant of [`scan`] that stops early once `cancel` fires.
pub async fn scan_with_cancel(
    target: &ScanTarget,
    config: &ScanConfig,
    cancel: CancellationToken,
) -> ScanReport {
    let coordinator = ScanCoordinator::new(target.clone(), config.clone()).with_cancel(cancel);
    let report = coordinator.run(Arc::new(TerminalProgress)).await;
    if config.is_verbose() {
        TerminalProgress.finish();
    }
    report
}

/// Split `ports` into `worker_count` contiguous chunks of
/// `len / worker_count` ports, plus one chunk holding the leftover tail.
///
/// Empty chunks are never produced: with more workers than ports every port
/// lands in the single remainder chunk. Assignment is static; a worker that
/// finishes early does not pick up work from its siblings.
pub fn partition(ports: &[u16], worker_count: usize) -> Vec<Vec<u16>> {
    let worker_count = worker_count.max(1);
    let chunk_size = ports.len() / worker_count;
    let sharded = worker_count * chunk_size;

    // At most one chunk per port, plus the remainder.
    let capacity = worker_count.min(ports.len()).saturating_add(1);
    let mut chunks: Vec<Vec<u16>> = Vec::with_capacity(capacity);
    if chunk_size > 0 {
        chunks.extend(ports[..sharded].chunks(chunk_size).map(<[u16]>::to_vec));
    }
    if sharded < ports.len() {
        chunks.push(ports[sharded..].to_vec());
    }
    chunks
}

/// Shared, mutable state of one scan.
///
/// Workers only ever add to it: the scanned counter grows by one per port and
/// open ports are inserted into a set, so a repeated port counts once.
#[derive(Debug)]
pub struct ScanState {
    scanned: AtomicU64,
    open_count: AtomicU64,
    open_ports: Mutex<BTreeSet<u16>>,
    started: Instant,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            scanned: AtomicU64::new(0),
            open_count: AtomicU64::new(0),
            open_ports: Mutex::new(BTreeSet::new()),
            started: Instant::now(),
        }
    }

    /// Fold one port result into the state and return the status right after.
    pub async fn record(&self, result: PortResult) -> ScanStatus {
        if result.open {
            let mut guard = self.open_ports.lock().await;
            if guard.insert(result.port) {
                self.open_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.scanned.fetch_add(1, Ordering::Relaxed);
        self.status()
    }

    /// Lock-free snapshot of the counters.
    pub fn status(&self) -> ScanStatus {
        ScanStatus {
            open: self.open_count.load(Ordering::Relaxed),
            scanned: self.scanned.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }

    pub fn scanned(&self) -> u64 {
        self.scanned.load(Ordering::Relaxed)
    }

    /// Copy of the open set, ascending.
    pub async fn open_ports(&self) -> Vec<u16> {
        self.open_ports.lock().await.iter().copied().collect()
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker settings shared by every chunk of a scan.
#[derive(Clone)]
struct WorkerContext {
    address: IpAddr,
    connect_timeout: Duration,
    state: Arc<ScanState>,
    progress: Option<Arc<dyn ProgressSink>>,
    cancel: CancellationToken,
}

/// Probe every port of `chunk` in order. Returns how many ports were probed.
async fn run_worker(chunk: Vec<u16>, ctx: WorkerContext) -> usize {
    let mut probed = 0usize;
    for port in chunk {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let outcome = probe::probe(ctx.address, port, ctx.connect_timeout).await;
        if outcome == ProbeOutcome::Open {
            debug!(port, "open port");
        }
        let status = ctx.state.record(PortResult::from_outcome(port, outcome)).await;
        probed += 1;
        if let Some(progress) = &ctx.progress {
            progress.on_progress(status);
        }
    }
    probed
}

/// Read-only view of a running scan's counters.
#[derive(Clone, Debug)]
pub struct ScanMonitor {
    state: Arc<ScanState>,
}

impl ScanMonitor {
    pub fn status(&self) -> ScanStatus {
        self.state.status()
    }
}

/// Owns the state of a single scan: shards the ports, runs one worker task per
/// chunk and joins them under the total scan deadline.
pub struct ScanCoordinator {
    target: ScanTarget,
    config: ScanConfig,
    state: Arc<ScanState>,
    cancel: CancellationToken,
}

impl ScanCoordinator {
    pub fn new(target: ScanTarget, config: ScanConfig) -> Self {
        Self {
            target,
            config,
            state: Arc::new(ScanState::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external token, e.g. one tied to Ctrl-C.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn monitor(&self) -> ScanMonitor {
        ScanMonitor {
            state: self.state.clone(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the scan to completion, deadline or cancellation.
    ///
    /// `progress` only hears from the workers when the config is verbose.
    /// When the deadline fires the remaining workers are cancelled and
    /// aborted; the report holds whatever had been recorded by then.
    pub async fn run(self, progress: Arc<dyn ProgressSink>) -> ScanReport {
        let started_at = now_rfc3339();
        let chunks = partition(self.target.ports(), self.config.worker_count());
        info!(
            host = self.target.hostname(),
            address = %self.target.address(),
            ports = self.target.ports().len(),
            workers = chunks.len(),
            "starting scan"
        );

        let progress = self.config.is_verbose().then_some(progress);
        if let Some(p) = &progress {
            p.on_progress(self.state.status());
        }

        let ctx = WorkerContext {
            address: self.target.address(),
            connect_timeout: self.config.per_connect_timeout(),
            state: self.state.clone(),
            progress,
            cancel: self.cancel.clone(),
        };

        let mut set = JoinSet::new();
        for chunk in chunks {
            set.spawn(run_worker(chunk, ctx.clone()));
        }

        let deadline = self.config.total_scan_timeout();
        let joined = time::timeout(deadline, async {
            while let Some(res) = set.join_next().await {
                match res {
                    Ok(probed) => debug!(probed, "worker finished"),
                    Err(e) => warn!("scan worker failed: {e}"),
                }
            }
        })
        .await;

        let timed_out = joined.is_err();
        let cancelled = !timed_out && self.cancel.is_cancelled();
        if timed_out {
            warn!(
                ?deadline,
                scanned = self.state.scanned(),
                "scan deadline reached, abandoning unfinished workers"
            );
            self.cancel.cancel();
            set.abort_all();
        }

        // Freeze: from here on only a copy of the state is read.
        let open_ports = self.state.open_ports().await;
        let status = self.state.status();
        let report = ScanReport {
            hostname: self.target.hostname().to_string(),
            address: self.target.address(),
            started_at,
            elapsed_ms: status.elapsed.as_millis() as u64,
            scanned_total: self.target.ports().len() as u64,
            scanned_done: status.scanned,
            open_ports,
            timed_out,
            cancelled,
        };
        info!(
            open = report.open_ports.len(),
            scanned = report.scanned_done,
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        report
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

use std::io::{self, Write};

use crate::types::ScanStatus;

/// Receives status snapshots while a scan runs.
///
/// Called from every worker after every port, so implementations must be
/// cheap and must tolerate concurrent calls. Delivery is best effort: two
/// snapshots may arrive out of order.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, status: ScanStatus);
}

impl<F> ProgressSink for F
where
    F: Fn(ScanStatus) + Send + Sync,
{
    fn on_progress(&self, status: ScanStatus) {
        self(status)
    }
}

/// Rewrites a single status line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalProgress;

impl TerminalProgress {
    /// Finish the line so following output starts on a fresh one.
    pub fn finish(&self) {
        println!();
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, status: ScanStatus) {
        let mut out = io::stdout().lock();
        // The status line is advisory; a failed write is not worth surfacing.
        let _ = write!(out, "\r{status}");
        let _ = out.flush();
    }
}

/// Sink that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _status: ScanStatus) {}
}

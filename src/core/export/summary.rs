//! Export summary and reporting

use crate::core::export::resolver::Layout;
use crate::domain::SessionId;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Acknowledgment of a finished export
///
/// The archive itself was streamed to the caller; this only records what
/// was sent.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Session the archive was delivered to
    pub session_id: SessionId,

    /// Layout of the archive
    pub layout: Layout,

    /// Materialized directory names, in emission order
    pub directories: Vec<String>,

    /// Epoch applied to entry timestamps, if any
    pub epoch: Option<DateTime<Utc>>,

    /// Bytes written to the caller's sink
    pub bytes_written: u64,

    /// Duration of the export
    pub duration: Duration,

    /// Cleanup obligations that failed to release
    pub cleanup_failures: usize,
}

impl ExportSummary {
    /// Create a summary for `session_id`
    pub fn new(session_id: SessionId, layout: Layout) -> Self {
        Self {
            session_id,
            layout,
            directories: Vec::new(),
            epoch: None,
            bytes_written: 0,
            duration: Duration::from_secs(0),
            cleanup_failures: 0,
        }
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Returns `true` if every cleanup obligation released cleanly
    pub fn is_clean(&self) -> bool {
        self.cleanup_failures == 0
    }

    /// Log the summary
    pub fn log_summary(&self) {
        crate::log_export_complete!(self.directories.len(), self.bytes_written, self.duration);
        tracing::info!(
            session_id = %self.session_id,
            layout = %self.layout,
            directories = ?self.directories,
            epoch = ?self.epoch.map(|e| e.timestamp()),
            "Export summary"
        );

        if !self.is_clean() {
            tracing::warn!(
                cleanup_failures = self.cleanup_failures,
                "Export completed with cleanup failures"
            );
        }
    }
}

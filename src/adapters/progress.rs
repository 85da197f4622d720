//! Progress reporting through `tracing`

use crate::adapters::traits::{ProgressReport, ProgressReporter};
use crate::domain::Result;
use std::time::Instant;

/// Progress reporter that emits one start and one finish event per report
#[derive(Debug, Clone, Default)]
pub struct TracingProgress;

impl TracingProgress {
    /// Creates a reporter
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for TracingProgress {
    fn begin(&self, label: &str) -> Box<dyn ProgressReport> {
        tracing::info!(label, "Progress started");
        Box::new(TracingReport {
            label: label.to_string(),
            started: Instant::now(),
        })
    }
}

struct TracingReport {
    label: String,
    started: Instant,
}

impl ProgressReport for TracingReport {
    fn finish(self: Box<Self>, result: Result<()>) -> Result<()> {
        let duration_ms = self.started.elapsed().as_millis();
        match &result {
            Ok(()) => tracing::info!(label = %self.label, duration_ms, "Progress completed"),
            Err(e) => {
                tracing::error!(label = %self.label, duration_ms, error = %e, "Progress failed")
            }
        }
        result
    }
}

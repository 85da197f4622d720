//! Ordered release of cleanup obligations

use crate::adapters::traits::Cleanup;
use crate::domain::ExporterError;

/// Cleanup obligations collected during one export
///
/// Obligations run exactly once, most recent first. Anything still held
/// when the stack is dropped is released then, so early returns and
/// cancelled futures release too.
#[derive(Default)]
pub struct CleanupStack {
    actions: Vec<(String, Cleanup)>,
}

impl CleanupStack {
    /// Creates an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an obligation under a label used in logs
    pub fn push(&mut self, label: impl Into<String>, action: Cleanup) {
        self.actions.push((label.into(), action));
    }

    /// Number of pending obligations
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns `true` if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every pending obligation in reverse acquisition order
    ///
    /// Failures are logged and collected; they never stop the remaining
    /// obligations from running.
    pub fn release(&mut self) -> Vec<ExporterError> {
        let mut failures = Vec::new();
        while let Some((label, action)) = self.actions.pop() {
            match action() {
                Ok(()) => tracing::debug!(label = %label, "Released cleanup obligation"),
                Err(e) => {
                    tracing::warn!(label = %label, error = %e, "Cleanup obligation failed");
                    failures.push(e);
                }
            }
        }
        failures
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            self.release();
        }
    }
}

impl std::fmt::Debug for CleanupStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.actions.iter().map(|(l, _)| l.as_str()).collect();
        f.debug_struct("CleanupStack").field("pending", &labels).finish()
    }
}

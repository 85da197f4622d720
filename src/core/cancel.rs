//! Export cancellation
//!
//! An export runs under one [`Cancellation`], built on the same
//! `watch::Receiver<bool>` shutdown channel the binary installs for
//! SIGINT/SIGTERM. Flipping the channel to `true` aborts connection
//! acquisition, materialization and tar streaming at their next
//! suspension point.

use crate::domain::{ExporterError, Result};
use std::future::Future;
use tokio::sync::watch;

/// Cancellation signal for one export
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// Creates a cancellation bound to a shutdown channel
    pub fn new(signal: watch::Receiver<bool>) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    /// Creates a cancellation that never fires
    pub fn never() -> Self {
        Self { signal: None }
    }

    /// Returns `true` once cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves when cancellation is requested
    ///
    /// Never resolves if the signal's sender is dropped without firing.
    pub async fn cancelled(&self) {
        let Some(mut rx) = self.signal.clone() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }

    /// Returns an error if cancellation was requested
    pub fn check(&self, stage: &'static str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ExporterError::Cancelled(stage));
        }
        Ok(())
    }

    /// Runs `fut` until it completes or cancellation is requested
    pub async fn run<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(stage)?;
        tokio::select! {
            biased;
            _ = self.cancelled() => {
                tracing::warn!(stage, "Export cancelled");
                Err(ExporterError::Cancelled(stage))
            }
            result = fut => result,
        }
    }
}

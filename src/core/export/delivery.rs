//! Transport delivery
//!
//! Acquires the caller's session within the connect timeout, opens a write
//! sink over it and streams the composed filesystem through the tar
//! encoder. The sink is closed on every path once it is open, and the
//! progress report is finished exactly once.

use crate::adapters::fs::Filesystem;
use crate::adapters::traits::{Caller, FileSink, ProgressReporter, SessionManager, TarEncoder};
use crate::core::cancel::Cancellation;
use crate::domain::{ExporterError, Result, SessionId, TransportError};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on session acquisition
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default progress label
pub const DEFAULT_PROGRESS_LABEL: &str = "sending archive";

/// Delivers archives to client sessions
#[derive(Clone)]
pub struct Delivery {
    sessions: Arc<dyn SessionManager>,
    encoder: Arc<dyn TarEncoder>,
    progress: Arc<dyn ProgressReporter>,
    connect_timeout: Duration,
    label: String,
}

impl Delivery {
    /// Creates a delivery stage
    pub fn new(
        sessions: Arc<dyn SessionManager>,
        encoder: Arc<dyn TarEncoder>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            sessions,
            encoder,
            progress,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            label: DEFAULT_PROGRESS_LABEL.to_string(),
        }
    }

    /// Sets the bound on session acquisition
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the progress label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Streams `fs` to the caller of `session_id`
    ///
    /// # Returns
    ///
    /// The number of bytes written to the sink.
    ///
    /// # Errors
    ///
    /// - [`TransportError::ConnectTimeout`] if the session is not acquired in time
    /// - the session manager's or sink's error if opening fails
    /// - the encoder's error if serialization fails (the sink is still closed)
    /// - the sink's close error if serialization succeeded
    /// - [`ExporterError::Cancelled`] if cancelled at any point
    pub async fn deliver(
        &self,
        fs: Arc<dyn Filesystem>,
        session_id: &SessionId,
        cancel: &Cancellation,
    ) -> Result<u64> {
        let caller = cancel
            .run("connection", self.acquire(session_id))
            .await?;
        tracing::debug!(session_id = %session_id, "Session acquired");

        let sink = cancel
            .run("connection", caller.open_write_sink())
            .await?;
        let mut sink = CountingSink::new(sink);

        let report = self.progress.begin(&self.label);
        let written = cancel
            .run("serialization", self.encoder.write_tar(fs, &mut sink, cancel))
            .await;
        let bytes = sink.written();

        let outcome = match written {
            Ok(()) => sink.into_inner().close(),
            Err(e) => {
                if let Err(close_err) = sink.into_inner().close() {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %close_err,
                        "Failed to close sink after serialization error"
                    );
                }
                Err(e)
            }
        };

        report.finish(outcome)?;
        tracing::info!(session_id = %session_id, bytes, "Archive delivered");
        Ok(bytes)
    }

    async fn acquire(&self, session_id: &SessionId) -> Result<Arc<dyn Caller>> {
        match tokio::time::timeout(self.connect_timeout, self.sessions.get(session_id, false)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(
                    session_id = %session_id,
                    timeout_ms = self.connect_timeout.as_millis(),
                    "Timed out acquiring session"
                );
                Err(ExporterError::Transport(TransportError::ConnectTimeout {
                    session_id: session_id.to_string(),
                    timeout: self.connect_timeout,
                }))
            }
        }
    }
}

/// Sink wrapper counting the bytes that reach the caller
struct CountingSink {
    inner: Box<dyn FileSink>,
    written: u64,
}

impl CountingSink {
    fn new(inner: Box<dyn FileSink>) -> Self {
        Self { inner, written: 0 }
    }

    fn written(&self) -> u64 {
        self.written
    }

    fn into_inner(self) -> Box<dyn FileSink> {
        self.inner
    }
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl FileSink for CountingSink {
    fn close(self: Box<Self>) -> Result<()> {
        self.inner.close()
    }
}

//! In-process session manager and sinks
//!
//! Callers register under a session id; the exporter looks them up when
//! it is ready to stream. A lookup waits for the session to register,
//! which is what the exporter's connect timeout bounds.

use crate::adapters::traits::{Caller, FileSink, SessionManager};
use crate::domain::{Result, SessionId, TransportError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Registry of connected callers
pub struct LocalSessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<dyn Caller>>>,
    changes: watch::Sender<u64>,
}

impl Default for LocalSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSessionManager {
    /// Creates an empty registry
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            sessions: Mutex::new(HashMap::new()),
            changes,
        }
    }

    /// Registers a caller under its session id, replacing any previous one
    pub fn register(&self, caller: Arc<dyn Caller>) {
        let session_id = caller.session_id().clone();
        self.lock().insert(session_id.clone(), caller);
        self.changes.send_modify(|generation| *generation += 1);
        tracing::debug!(session_id = %session_id, "Session registered");
    }

    /// Removes a session
    pub fn unregister(&self, session_id: &SessionId) -> bool {
        let removed = self.lock().remove(session_id).is_some();
        if removed {
            tracing::debug!(session_id = %session_id, "Session unregistered");
        }
        removed
    }

    fn lookup(&self, session_id: &SessionId) -> Option<Arc<dyn Caller>> {
        self.lock().get(session_id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Arc<dyn Caller>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionManager for LocalSessionManager {
    async fn get(&self, session_id: &SessionId, no_wait: bool) -> Result<Arc<dyn Caller>> {
        let mut changes = self.changes.subscribe();
        loop {
            if let Some(caller) = self.lookup(session_id) {
                return Ok(caller);
            }
            if no_wait {
                return Err(TransportError::SessionNotFound(session_id.to_string()).into());
            }
            tracing::trace!(session_id = %session_id, "Waiting for session");
            if changes.changed().await.is_err() {
                return Err(TransportError::SessionNotFound(session_id.to_string()).into());
            }
        }
    }
}

/// Where a [`LocalCaller`] delivers the archive
#[derive(Debug, Clone)]
pub enum SinkTarget {
    /// Create or truncate a file
    File(PathBuf),
    /// Write to standard output
    Stdout,
    /// Collect into a shared in-memory buffer
    Buffer(SharedBuffer),
}

/// A caller living in this process
#[derive(Debug, Clone)]
pub struct LocalCaller {
    session_id: SessionId,
    target: SinkTarget,
}

impl LocalCaller {
    /// Creates a caller
    pub fn new(session_id: SessionId, target: SinkTarget) -> Self {
        Self { session_id, target }
    }
}

#[async_trait]
impl Caller for LocalCaller {
    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    async fn open_write_sink(&self) -> Result<Box<dyn FileSink>> {
        match &self.target {
            SinkTarget::File(path) => {
                let file = File::create(path).map_err(|e| {
                    TransportError::SinkOpen(format!("{}: {e}", path.display()))
                })?;
                Ok(Box::new(WriterSink::new(BufWriter::new(file))))
            }
            SinkTarget::Stdout => Ok(Box::new(WriterSink::new(io::stdout()))),
            SinkTarget::Buffer(buffer) => Ok(Box::new(buffer.clone())),
        }
    }
}

/// Sink over any writer; closing flushes it
pub struct WriterSink<W: Write + Send> {
    inner: W,
}

impl<W: Write + Send> WriterSink<W> {
    /// Wraps a writer
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write + Send> Write for WriterSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Send> FileSink for WriterSink<W> {
    fn close(mut self: Box<Self>) -> Result<()> {
        self.inner
            .flush()
            .map_err(|e| TransportError::SinkClose(e.to_string()).into())
    }
}

/// In-memory sink shared between the exporter and the receiving side
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
}

impl SharedBuffer {
    /// Creates an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes received so far
    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of times a sink over this buffer was closed
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FileSink for SharedBuffer {
    fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//! Collaborator traits
//!
//! The exporter orchestrates these collaborators and owns none of their
//! state. Each trait has a reference implementation in this crate and can
//! be swapped for a production subsystem (content store, remote session
//! transport, progress UI).

use crate::adapters::fs::Filesystem;
use crate::core::cancel::Cancellation;
use crate::core::options::ExportOptions;
use crate::domain::{Attestation, RefMap, Result, SessionId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::Write;
use std::sync::Arc;

/// Deferred release action owed by the caller of a resource-acquiring collaborator
pub type Cleanup = Box<dyn FnOnce() -> Result<()> + Send>;

/// A mounted ref: the filesystem view plus the action releasing the mount
pub struct Mount {
    /// Read-only view of the ref's tree
    pub fs: Arc<dyn Filesystem>,

    /// Releases the mount
    pub release: Option<Cleanup>,
}

/// Handle to an immutable, content-addressable directory tree
///
/// Safe to read concurrently; never mutated by the exporter.
pub trait ImmutableRef: Send + Sync {
    /// Stable identifier of the ref
    fn id(&self) -> &str;

    /// Mounts the ref read-only
    ///
    /// # Errors
    ///
    /// Returns an error if the ref's content is unavailable.
    fn mount(&self) -> Result<Mount>;
}

/// Inputs for constructing one export directory
pub struct CreateFsRequest<'a> {
    /// Session the export is delivered to
    pub session_id: &'a SessionId,

    /// Key of the ref being materialized (`""` for a single-ref result)
    pub key: &'a str,

    /// Ref to materialize; `None` materializes an empty directory
    pub reference: Option<&'a Arc<dyn ImmutableRef>>,

    /// Every ref of the result, for attestations that point at sibling refs
    pub all_refs: &'a RefMap,

    /// Attestations laid out alongside the ref's files
    pub attestations: &'a [Attestation],

    /// Export-wide timestamp, truncated to whole seconds
    pub timestamp: DateTime<Utc>,

    /// Resolved export options
    pub options: &'a ExportOptions,
}

/// Directory-construction collaborator
#[async_trait]
pub trait FsFactory: Send + Sync {
    /// Builds the filesystem for one ref
    ///
    /// # Returns
    ///
    /// The filesystem and, if the construction acquired resources, the
    /// cleanup the caller must run once the filesystem is no longer read.
    async fn create_fs(
        &self,
        request: CreateFsRequest<'_>,
    ) -> Result<(Arc<dyn Filesystem>, Option<Cleanup>)>;
}

/// Tar-encoding collaborator
#[async_trait]
pub trait TarEncoder: Send + Sync {
    /// Streams `fs` as a tar archive into `sink` in a single pass
    async fn write_tar(
        &self,
        fs: Arc<dyn Filesystem>,
        sink: &mut dyn FileSink,
        cancel: &Cancellation,
    ) -> Result<()>;
}

/// Outbound byte sink opened over a caller connection
pub trait FileSink: Write + Send {
    /// Flushes and closes the sink
    fn close(self: Box<Self>) -> Result<()>;
}

/// A connected client session
#[async_trait]
pub trait Caller: Send + Sync {
    /// Session this caller belongs to
    fn session_id(&self) -> &SessionId;

    /// Opens a sink that receives the serialized archive
    async fn open_write_sink(&self) -> Result<Box<dyn FileSink>>;
}

/// Session/transport collaborator
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Returns the caller for `session_id`
    ///
    /// Waits for the session to connect unless `no_wait` is set, in which
    /// case an unknown session fails immediately.
    async fn get(&self, session_id: &SessionId, no_wait: bool) -> Result<Arc<dyn Caller>>;
}

/// Progress-reporting collaborator
pub trait ProgressReporter: Send + Sync {
    /// Starts a one-off report
    fn begin(&self, label: &str) -> Box<dyn ProgressReport>;
}

/// An open progress report; consumed when finished so it completes exactly once
pub trait ProgressReport: Send {
    /// Records the outcome and hands it back to the caller
    fn finish(self: Box<Self>, result: Result<()>) -> Result<()>;
}

//! External collaborators
//!
//! This module holds the traits the exporter orchestrates and the
//! reference implementations shipped with the crate:
//!
//! - [`traits`] - collaborator contracts (refs, directory construction,
//!   tar encoding, sessions and sinks, progress)
//! - [`fs`] - virtual filesystems (directory-backed, in-memory, retimed,
//!   merged, sub-directory union)
//! - [`local`] - local and in-memory refs, local directory construction
//! - [`archive`] - streaming tar encoder
//! - [`session`] - in-process session manager with file and buffer sinks
//! - [`progress`] - progress reporting through `tracing`

pub mod archive;
pub mod fs;
pub mod local;
pub mod progress;
pub mod session;
pub mod traits;

pub use archive::TarStreamWriter;
pub use local::{LocalFsFactory, LocalRef, MemRef};
pub use progress::TracingProgress;
pub use session::{LocalCaller, LocalSessionManager, SharedBuffer, SinkTarget};
pub use traits::{
    Caller, Cleanup, CreateFsRequest, FileSink, FsFactory, ImmutableRef, Mount, ProgressReport,
    ProgressReporter, SessionManager, TarEncoder,
};

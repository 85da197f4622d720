//! Domain models and types for the exporter.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`SessionId`], [`PlatformId`])
//! - **Platform descriptors** ([`Platform`], [`Platforms`])
//! - **Export inputs** ([`ExportSource`], [`Attestation`])
//! - **Error types** ([`ExporterError`], [`TransportError`], [`FsError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ExporterError>`]:
//!
//! ```rust
//! use tar_exporter::domain::{ExporterError, Platforms, Result};
//!
//! fn example(bytes: &[u8]) -> Result<usize> {
//!     let platforms = Platforms::from_bytes(bytes)?;
//!     Ok(platforms.len())
//! }
//! ```

pub mod attestation;
pub mod errors;
pub mod ids;
pub mod platform;
pub mod result;
pub mod source;

// Re-export commonly used types for convenience
pub use attestation::{Attestation, AttestationKind};
pub use errors::{ExporterError, FsError, TransportError};
pub use ids::{PlatformId, SessionId};
pub use platform::{Platform, PlatformEntry, Platforms, PLATFORMS_METADATA_KEY};
pub use result::Result;
pub use source::{ExportSource, RefMap};

//! Core export logic.
//!
//! # Modules
//!
//! - [`options`] - exporter attribute parsing
//! - [`export`] - result-set resolution, materialization, composition,
//!   delivery and the exporter itself
//! - [`cancel`] - export cancellation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use tar_exporter::adapters::{
//!     LocalCaller, LocalFsFactory, LocalRef, LocalSessionManager, SinkTarget, TarStreamWriter,
//!     TracingProgress,
//! };
//! use tar_exporter::core::cancel::Cancellation;
//! use tar_exporter::core::export::{ExporterOpt, TarExporter};
//! use tar_exporter::domain::{ExportSource, SessionId};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sessions = Arc::new(LocalSessionManager::new());
//! let session_id = SessionId::generate();
//! sessions.register(Arc::new(LocalCaller::new(
//!     session_id.clone(),
//!     SinkTarget::File("out.tar".into()),
//! )));
//!
//! let exporter = TarExporter::new(ExporterOpt::new(
//!     sessions,
//!     Arc::new(LocalFsFactory::new()),
//!     Arc::new(TarStreamWriter::new()),
//!     Arc::new(TracingProgress::new()),
//! ));
//!
//! let source = ExportSource::single(Arc::new(LocalRef::new("build", "./build")));
//! let summary = exporter
//!     .resolve(HashMap::new())?
//!     .export(&source, &session_id, &Cancellation::never())
//!     .await?;
//!
//! println!("Sent {} bytes", summary.bytes_written);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod export;
pub mod options;

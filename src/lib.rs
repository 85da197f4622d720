// tar-exporter - Streams build results to a client session as a tarball
// Copyright (c) 2025 Tar Exporter Contributors
// Licensed under the MIT License

//! # tar-exporter
//!
//! Turns the output of a build (one result, or one result per target
//! platform) into a single tar stream and delivers it to the client
//! session that requested it.
//!
//! ## Overview
//!
//! An export runs these stages in order:
//! - **Option parsing**: exporter attributes become typed [`core::options::ExportOptions`]
//! - **Result-set resolution**: decides between a flat tree and one
//!   sub-directory per platform ([`core::export::resolve_result_set`])
//! - **Directory materialization**: builds a filesystem view per selected
//!   ref through an [`adapters::FsFactory`]
//! - **Composition**: merges the views into one filesystem
//! - **Delivery**: connects to the client session within a bounded time
//!   and streams the tar encoding with progress reporting
//!
//! Every mount or lease taken along the way is released in reverse order,
//! whether the export succeeds, fails or is cancelled.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Export pipeline, options and cancellation
//! - [`adapters`] - Collaborator traits and reference implementations
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tar_exporter::adapters::{
//!     LocalCaller, LocalFsFactory, LocalRef, LocalSessionManager, SinkTarget, TarStreamWriter,
//!     TracingProgress,
//! };
//! use tar_exporter::core::cancel::Cancellation;
//! use tar_exporter::core::export::{ExporterOpt, TarExporter};
//! use tar_exporter::domain::{ExportSource, SessionId};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sessions = Arc::new(LocalSessionManager::new());
//!     let session_id = SessionId::generate();
//!     sessions.register(Arc::new(LocalCaller::new(
//!         session_id.clone(),
//!         SinkTarget::File("out.tar".into()),
//!     )));
//!
//!     let exporter = TarExporter::new(ExporterOpt::new(
//!         sessions,
//!         Arc::new(LocalFsFactory::new()),
//!         Arc::new(TarStreamWriter::new()),
//!         Arc::new(TracingProgress::new()),
//!     ));
//!     let instance = exporter.resolve(Default::default())?;
//!
//!     let source = ExportSource::single(Arc::new(LocalRef::new("build", "./build")));
//!     let summary = instance
//!         .export(&source, &session_id, &Cancellation::never())
//!         .await?;
//!
//!     println!("Wrote {} bytes", summary.bytes_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`domain::Result`], carrying a
//! [`domain::ExporterError`]. Timeouts and cancellation can be told apart
//! with [`domain::ExporterError::is_timeout`] and
//! [`domain::ExporterError::is_cancelled`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;

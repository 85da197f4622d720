//! Export orchestration
//!
//! The pipeline, in order:
//! - [`resolver`] - flat or nested layout, and which refs to materialize
//! - [`materializer`] - one named directory per selected ref
//! - [`composer`] - the single filesystem that is streamed
//! - [`delivery`] - session acquisition, sink, tar stream, progress
//!
//! [`exporter`] drives the stages and owns the [`cleanup`] stack;
//! [`summary`] is what a successful export reports back.

pub mod cleanup;
pub mod composer;
pub mod delivery;
pub mod exporter;
pub mod materializer;
pub mod resolver;
pub mod summary;

pub use cleanup::CleanupStack;
pub use composer::compose;
pub use delivery::{Delivery, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PROGRESS_LABEL};
pub use exporter::{ExporterOpt, TarExporter, TarExporterInstance};
pub use materializer::{sanitize_entry_name, DirectoryMaterializer, MaterializedDir};
pub use resolver::{resolve_result_set, Layout, ResolvedSet, Selection};
pub use summary::ExportSummary;

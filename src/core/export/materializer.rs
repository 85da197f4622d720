//! Directory materialization
//!
//! Turns one selected ref into a named directory entry by delegating the
//! filesystem construction to the [`FsFactory`] collaborator.

use crate::adapters::fs::{Filesystem, Stat};
use crate::adapters::traits::{Cleanup, CreateFsRequest, FsFactory};
use crate::core::cancel::Cancellation;
use crate::core::export::resolver::Selection;
use crate::core::options::ExportOptions;
use crate::domain::{ExporterError, RefMap, Result, SessionId};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Permission bits of every materialized directory entry
pub const DIRECTORY_MODE: u32 = 0o755;

/// A ref materialized as a named directory
#[derive(Debug, Clone)]
pub struct MaterializedDir {
    /// Entry name: the key with path separators replaced by `_`
    pub name: String,

    /// Directory contents
    pub fs: Arc<dyn Filesystem>,

    /// Directory entry metadata
    pub stat: Stat,
}

/// Replaces path separators so a key becomes a single directory-entry name
pub fn sanitize_entry_name(key: &str) -> String {
    key.replace(['/', '\\'], "_")
}

/// Shared inputs of every materialization within one export
pub struct MaterializeContext<'a> {
    /// Session the export is delivered to
    pub session_id: &'a SessionId,

    /// Every ref of the result
    pub all_refs: &'a RefMap,

    /// Export timestamp, whole seconds
    pub timestamp: DateTime<Utc>,

    /// Resolved options
    pub options: &'a ExportOptions,

    /// Export cancellation
    pub cancel: &'a Cancellation,
}

/// Materializes selected refs through a directory-construction collaborator
#[derive(Clone)]
pub struct DirectoryMaterializer {
    factory: Arc<dyn FsFactory>,
}

impl DirectoryMaterializer {
    /// Creates a materializer over `factory`
    pub fn new(factory: Arc<dyn FsFactory>) -> Self {
        Self { factory }
    }

    /// Materializes one selection
    ///
    /// # Returns
    ///
    /// The directory plus the cleanup obligation the collaborator handed
    /// back, if any. The caller owns the obligation.
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::Materialize`] naming the key when the
    /// collaborator fails, or [`ExporterError::Cancelled`] if the export
    /// was cancelled first.
    pub async fn materialize(
        &self,
        selection: &Selection,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(MaterializedDir, Option<Cleanup>)> {
        let request = CreateFsRequest {
            session_id: ctx.session_id,
            key: &selection.key,
            reference: selection.reference.as_ref(),
            all_refs: ctx.all_refs,
            attestations: &selection.attestations,
            timestamp: ctx.timestamp,
            options: ctx.options,
        };

        let (fs, cleanup) = ctx
            .cancel
            .run("materialization", self.factory.create_fs(request))
            .await
            .map_err(|e| match e {
                ExporterError::Cancelled(_) => e,
                other => ExporterError::Materialize {
                    key: selection.key.clone(),
                    message: other.to_string(),
                },
            })?;

        let name = sanitize_entry_name(&selection.key);
        let mod_time = ctx
            .options
            .epoch
            .unwrap_or(ctx.timestamp)
            .timestamp()
            .saturating_mul(1_000_000_000);
        let stat = Stat::dir(name.clone(), DIRECTORY_MODE).with_mod_time(mod_time);

        tracing::debug!(
            key = %selection.key,
            name = %name,
            reference = selection.reference.as_ref().map(|r| r.id()).unwrap_or("<empty>"),
            attestations = selection.attestations.len(),
            has_cleanup = cleanup.is_some(),
            "Materialized directory"
        );

        Ok((MaterializedDir { name, fs, stat }, cleanup))
    }
}

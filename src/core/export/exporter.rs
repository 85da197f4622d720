//! Tar exporter - orchestrates one export from result to delivered archive
//!
//! [`TarExporter`] holds the collaborators; [`TarExporter::resolve`] binds
//! a set of exporter attributes into a [`TarExporterInstance`], which runs
//! exports: resolve the result set, materialize the selected refs,
//! compose them, deliver the archive and release every cleanup
//! obligation in reverse order.

use crate::adapters::traits::{FsFactory, ProgressReporter, SessionManager, TarEncoder};
use crate::core::cancel::Cancellation;
use crate::core::export::cleanup::CleanupStack;
use crate::core::export::composer::compose;
use crate::core::export::delivery::{Delivery, DEFAULT_CONNECT_TIMEOUT, DEFAULT_PROGRESS_LABEL};
use crate::core::export::materializer::{DirectoryMaterializer, MaterializeContext};
use crate::core::export::resolver::resolve_result_set;
use crate::core::export::summary::ExportSummary;
use crate::core::options::{epoch_from_metadata, ExportOptions, ExporterAttrs};
use crate::domain::{ExportSource, Result, SessionId};
use crate::{log_error_with_context, log_export_start};
use chrono::{SubsecRound, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Collaborators and delivery settings of an exporter
#[derive(Clone)]
pub struct ExporterOpt {
    /// Session/transport collaborator
    pub sessions: Arc<dyn SessionManager>,

    /// Directory-construction collaborator
    pub fs_factory: Arc<dyn FsFactory>,

    /// Tar-encoding collaborator
    pub encoder: Arc<dyn TarEncoder>,

    /// Progress-reporting collaborator
    pub progress: Arc<dyn ProgressReporter>,

    /// Bound on session acquisition
    pub connect_timeout: Duration,

    /// Label of the delivery progress report
    pub progress_label: String,
}

impl ExporterOpt {
    /// Creates options with the default timeout and label
    pub fn new(
        sessions: Arc<dyn SessionManager>,
        fs_factory: Arc<dyn FsFactory>,
        encoder: Arc<dyn TarEncoder>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            sessions,
            fs_factory,
            encoder,
            progress,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            progress_label: DEFAULT_PROGRESS_LABEL.to_string(),
        }
    }
}

/// Exporter streaming build results to the client as one tarball
#[derive(Clone)]
pub struct TarExporter {
    materializer: DirectoryMaterializer,
    delivery: Delivery,
}

impl TarExporter {
    /// Create a new exporter
    pub fn new(opt: ExporterOpt) -> Self {
        let delivery = Delivery::new(opt.sessions, opt.encoder, opt.progress)
            .with_connect_timeout(opt.connect_timeout)
            .with_label(opt.progress_label);
        Self {
            materializer: DirectoryMaterializer::new(opt.fs_factory),
            delivery,
        }
    }

    /// Binds exporter attributes into an instance
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an attribute does not parse.
    pub fn resolve(&self, attrs: ExporterAttrs) -> Result<TarExporterInstance> {
        let (options, _residual) = ExportOptions::resolve(attrs)?;
        tracing::debug!(
            epoch = ?options.epoch.map(|e| e.timestamp()),
            multi_platform = ?options.multi_platform,
            attestation_prefix = %options.attestation_prefix,
            prefer_nondist_layers = options.prefer_nondist_layers,
            "Resolved exporter options"
        );
        Ok(TarExporterInstance {
            exporter: self.clone(),
            options,
        })
    }
}

/// An exporter bound to resolved options
#[derive(Clone)]
pub struct TarExporterInstance {
    exporter: TarExporter,
    options: ExportOptions,
}

impl TarExporterInstance {
    /// Human-readable name of this exporter
    pub fn name(&self) -> &'static str {
        "exporting to client tarball"
    }

    /// Resolved options
    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Exports `source` to the caller of `session_id`
    ///
    /// Cleanup obligations collected during the export are released in
    /// reverse acquisition order on every exit path; their failures are
    /// logged and counted in the summary but never replace the export's
    /// own outcome.
    ///
    /// # Errors
    ///
    /// Any configuration, ambiguity, materialization, composition,
    /// transport or serialization error, or [`crate::domain::ExporterError::Cancelled`].
    pub async fn export(
        &self,
        source: &ExportSource,
        session_id: &SessionId,
        cancel: &Cancellation,
    ) -> Result<ExportSummary> {
        let start = Instant::now();
        log_export_start!(session_id, self.name());

        let mut cleanups = CleanupStack::new();
        let result = self.run(source, session_id, cancel, &mut cleanups).await;
        let failures = cleanups.release();

        match result {
            Ok(mut summary) => {
                summary.cleanup_failures = failures.len();
                let summary = summary.with_duration(start.elapsed());
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                let context = format!("export to session {session_id}");
                log_error_with_context!(e, context.as_str());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        source: &ExportSource,
        session_id: &SessionId,
        cancel: &Cancellation,
        cleanups: &mut CleanupStack,
    ) -> Result<ExportSummary> {
        let mut options = self.options.clone();
        if options.epoch.is_none() {
            options.epoch = epoch_from_metadata(&source.metadata)?;
        }
        let now = Utc::now().trunc_subsecs(0);

        let set = resolve_result_set(source, &options)?;
        let layout = set.layout();

        let ctx = MaterializeContext {
            session_id,
            all_refs: &source.refs,
            timestamp: now,
            options: &options,
            cancel,
        };

        let mut dirs = Vec::with_capacity(set.selections.len());
        for selection in &set.selections {
            let (dir, cleanup) = self.exporter.materializer.materialize(selection, &ctx).await?;
            if let Some(cleanup) = cleanup {
                cleanups.push(format!("materialize {:?}", selection.key), cleanup);
            }
            dirs.push(dir);
        }
        let directories: Vec<String> = dirs.iter().map(|d| d.name.clone()).collect();

        let fs = compose(dirs, layout)?;
        tracing::debug!(layout = %layout, directories = ?directories, "Composed filesystem");

        let bytes_written = self.exporter.delivery.deliver(fs, session_id, cancel).await?;

        let mut summary = ExportSummary::new(session_id.clone(), layout);
        summary.directories = directories;
        summary.epoch = options.epoch;
        summary.bytes_written = bytes_written;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fs::MemFs;
    use crate::adapters::local::{LocalFsFactory, MemRef};
    use crate::adapters::progress::TracingProgress;
    use crate::adapters::session::{LocalCaller, LocalSessionManager, SharedBuffer, SinkTarget};
    use crate::adapters::TarStreamWriter;
    use crate::core::export::resolver::Layout;
    use crate::core::options::{EPOCH_KEY, SOURCE_EPOCH_METADATA_KEY};
    use crate::domain::ExporterError;
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn exporter() -> (TarExporter, Arc<LocalSessionManager>) {
        let sessions = Arc::new(LocalSessionManager::new());
        let opt = ExporterOpt::new(
            sessions.clone(),
            Arc::new(LocalFsFactory::new()),
            Arc::new(TarStreamWriter::new()),
            Arc::new(TracingProgress::new()),
        );
        (TarExporter::new(opt), sessions)
    }

    fn connect(sessions: &LocalSessionManager, id: &str) -> (SessionId, SharedBuffer) {
        let session_id = SessionId::new(id).unwrap();
        let buffer = SharedBuffer::new();
        sessions.register(Arc::new(LocalCaller::new(
            session_id.clone(),
            SinkTarget::Buffer(buffer.clone()),
        )));
        (session_id, buffer)
    }

    #[test]
    fn test_name() {
        let (exporter, _) = exporter();
        let instance = exporter.resolve(HashMap::new()).unwrap();
        assert_eq!(instance.name(), "exporting to client tarball");
    }

    #[test]
    fn test_resolve_rejects_bad_attrs() {
        let (exporter, _) = exporter();
        let attrs = HashMap::from([(EPOCH_KEY.to_string(), "soon".to_string())]);
        assert!(matches!(
            exporter.resolve(attrs),
            Err(ExporterError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_export_single_ref_releases_mount() {
        let (exporter, sessions) = exporter();
        let (session_id, buffer) = connect(&sessions, "s1");

        let mut fs = MemFs::new();
        fs.add_file("out.txt", "built", 0o644);
        let reference = MemRef::new("r1", fs);
        let releases = reference.releases();

        let summary = exporter
            .resolve(HashMap::new())
            .unwrap()
            .export(
                &ExportSource::single(Arc::new(reference)),
                &session_id,
                &Cancellation::never(),
            )
            .await
            .unwrap();

        assert_eq!(summary.layout, Layout::Flat);
        assert_eq!(summary.directories, vec![""]);
        assert_eq!(summary.bytes_written as usize, buffer.contents().len());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn test_source_epoch_applies_when_unset() {
        let (exporter, sessions) = exporter();
        let (session_id, _) = connect(&sessions, "s1");
        let source = ExportSource::empty().with_metadata(SOURCE_EPOCH_METADATA_KEY, "86400");

        let instance = exporter.resolve(HashMap::new()).unwrap();
        let summary = instance
            .export(&source, &session_id, &Cancellation::never())
            .await
            .unwrap();

        assert_eq!(summary.epoch.unwrap().timestamp(), 86_400);
        assert!(instance.options().epoch.is_none());
    }

    #[tokio::test]
    async fn test_attribute_epoch_wins_over_source_epoch() {
        let (exporter, sessions) = exporter();
        let (session_id, _) = connect(&sessions, "s1");
        let source = ExportSource::empty().with_metadata(SOURCE_EPOCH_METADATA_KEY, "86400");
        let attrs = HashMap::from([(EPOCH_KEY.to_string(), "10".to_string())]);

        let summary = exporter
            .resolve(attrs)
            .unwrap()
            .export(&source, &session_id, &Cancellation::never())
            .await
            .unwrap();
        assert_eq!(summary.epoch.unwrap().timestamp(), 10);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_releases_mount() {
        let (exporter, _sessions) = exporter();
        let mut opt_exporter = exporter.clone();
        opt_exporter.delivery = opt_exporter
            .delivery
            .clone()
            .with_connect_timeout(Duration::from_millis(10));

        let reference = MemRef::new("r1", MemFs::new());
        let releases = reference.releases();
        let err = opt_exporter
            .resolve(HashMap::new())
            .unwrap()
            .export(
                &ExportSource::single(Arc::new(reference)),
                &SessionId::new("nobody").unwrap(),
                &Cancellation::never(),
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}

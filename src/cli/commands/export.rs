//! Export command implementation
//!
//! Exports one local directory, or one directory per platform, to a file
//! or to stdout. The output is served through an in-process session that
//! is registered before the export starts.

use crate::adapters::{
    LocalCaller, LocalFsFactory, LocalRef, LocalSessionManager, SinkTarget, TarStreamWriter,
    TracingProgress,
};
use crate::config::ExporterConfig;
use crate::core::cancel::Cancellation;
use crate::core::export::{ExporterOpt, TarExporter};
use crate::domain::{ExportSource, Platform, PlatformId, SessionId};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Directory to export as a single result
    #[arg(long = "ref", value_name = "DIR", conflicts_with = "platforms")]
    pub reference: Option<PathBuf>,

    /// Platform directory to export, as ID=DIR (repeatable, order is kept)
    #[arg(long = "platform", value_name = "ID=DIR", value_parser = parse_platform_arg)]
    pub platforms: Vec<(String, PathBuf)>,

    /// Exporter attribute, as KEY=VALUE (repeatable, overrides [options])
    #[arg(long = "opt", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub opts: Vec<(String, String)>,

    /// Output file, or `-` for stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: String,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config: &ExporterConfig,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Starting export command");

        let mut attrs = config.exporter_attrs();
        for (key, value) in &self.opts {
            tracing::debug!(key = %key, "Overriding exporter attribute from CLI");
            attrs.insert(key.clone(), value.clone());
        }

        let source = match self.build_source() {
            Ok(source) => source,
            Err(e) => {
                tracing::error!(error = %e, "Invalid export source");
                eprintln!("Invalid export source: {e}");
                return Ok(2);
            }
        };

        let sessions = Arc::new(LocalSessionManager::new());
        let session_id = SessionId::generate();
        sessions.register(Arc::new(LocalCaller::new(
            session_id.clone(),
            self.sink_target(),
        )));

        let mut opt = ExporterOpt::new(
            sessions,
            Arc::new(LocalFsFactory::new()),
            Arc::new(TarStreamWriter::new()),
            Arc::new(TracingProgress::new()),
        );
        opt.connect_timeout = config.delivery.connect_timeout();
        opt.progress_label = config.delivery.progress_label.clone();
        let exporter = TarExporter::new(opt);

        let instance = match exporter.resolve(attrs) {
            Ok(instance) => instance,
            Err(e) => {
                tracing::error!(error = %e, "Invalid exporter attributes");
                eprintln!("Invalid exporter attributes: {e}");
                return Ok(2);
            }
        };

        let cancel = Cancellation::new(shutdown_signal);
        let summary = match instance.export(&source, &session_id, &cancel).await {
            Ok(summary) => summary,
            Err(e) if e.is_cancelled() => {
                eprintln!("Export cancelled: {e}");
                return Ok(5);
            }
            Err(e) => {
                eprintln!("Export failed: {e}");
                return Ok(5);
            }
        };

        // stdout may carry the archive
        eprintln!("Export Summary:");
        eprintln!("  Layout: {}", summary.layout);
        if summary.directories.iter().any(|d| !d.is_empty()) {
            eprintln!("  Directories: {}", summary.directories.join(", "));
        }
        if let Some(epoch) = summary.epoch {
            eprintln!("  Epoch: {}", epoch.to_rfc3339());
        }
        eprintln!("  Bytes: {}", summary.bytes_written);
        eprintln!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        if !summary.is_clean() {
            eprintln!("  Cleanup failures: {}", summary.cleanup_failures);
        }

        Ok(0)
    }

    fn build_source(&self) -> anyhow::Result<ExportSource> {
        if let Some(dir) = &self.reference {
            return Ok(ExportSource::single(Arc::new(LocalRef::new(
                dir.display().to_string(),
                dir,
            ))));
        }

        let mut source = ExportSource::empty();
        for (id, dir) in &self.platforms {
            let platform: Platform = id
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid platform '{id}': {e}"))?;
            let platform_id = PlatformId::new(id.clone()).map_err(anyhow::Error::msg)?;
            let reference = Arc::new(LocalRef::new(id.clone(), dir));
            source = source.with_platform(platform_id, platform, reference)?;
        }
        Ok(source)
    }

    fn sink_target(&self) -> SinkTarget {
        if self.output == "-" {
            SinkTarget::Stdout
        } else {
            SinkTarget::File(PathBuf::from(&self.output))
        }
    }
}

fn parse_platform_arg(value: &str) -> Result<(String, PathBuf), String> {
    let (id, dir) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=DIR, got '{value}'"))?;
    if id.is_empty() || dir.is_empty() {
        return Err(format!("expected ID=DIR, got '{value}'"));
    }
    Ok((id.to_string(), PathBuf::from(dir)))
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{value}'"))?;
    if key.is_empty() {
        return Err(format!("expected KEY=VALUE, got '{value}'"));
    }
    Ok((key.to_string(), val.to_string()))
}

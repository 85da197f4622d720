//! Logging and observability
//!
//! Structured logging through `tracing`:
//! - human-readable console output
//! - optional JSON file output with daily or hourly rotation
//! - log level from configuration, overridable with `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use tar_exporter::config::LoggingConfig;
//! use tar_exporter::logging::init_logging;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Exporter started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of an export
///
/// # Example
///
/// ```no_run
/// use tar_exporter::domain::SessionId;
/// use tar_exporter::log_export_start;
///
/// let session_id = SessionId::new("session-1").unwrap();
/// log_export_start!(&session_id, "exporting to client tarball");
/// ```
#[macro_export]
macro_rules! log_export_start {
    ($session_id:expr, $name:expr) => {
        tracing::info!(
            session_id = %$session_id,
            exporter = $name,
            "Starting export"
        );
    };
}

/// Log the completion of an export
///
/// # Example
///
/// ```no_run
/// use tar_exporter::log_export_complete;
/// use std::time::Duration;
///
/// log_export_complete!(2, 10_240u64, Duration::from_millis(35));
/// ```
#[macro_export]
macro_rules! log_export_complete {
    ($directories:expr, $bytes:expr, $duration:expr) => {
        tracing::info!(
            directories = $directories,
            bytes = $bytes,
            duration_ms = $duration.as_millis(),
            "Export completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use tar_exporter::domain::ExporterError;
/// use tar_exporter::log_error_with_context;
///
/// let error = ExporterError::MissingPlatforms;
/// log_error_with_context!(&error, "Export failed");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

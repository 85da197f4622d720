//! Domain error types
//!
//! This module defines the error hierarchy for the exporter. Every stage of
//! an export reports through [`ExporterError`]; transport and filesystem
//! failures carry their own nested enums so callers can tell which
//! collaborator failed without inspecting message text.

use std::time::Duration;
use thiserror::Error;

/// Main exporter error type
///
/// This is the primary error type used throughout the crate.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// Configuration-related errors (unparsable attributes, invalid config files)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A multi-ref result arrived without a platforms descriptor
    #[error("unable to export multiple refs, missing platforms mapping")]
    MissingPlatforms,

    /// The platforms descriptor could not be deserialized
    #[error("failed to parse platforms passed to exporter: {0}")]
    InvalidPlatforms(String),

    /// Map mode was disabled for a result that declares several platforms
    #[error("unable to export multiple platforms without map")]
    MultiplePlatformsWithoutMap,

    /// A platform listed in the descriptor has no ref in the result
    #[error("failed to find ref for ID {0}")]
    MissingRef(String),

    /// Directory construction failed for one ref
    #[error("failed to materialize directory for {key:?}: {message}")]
    Materialize { key: String, message: String },

    /// Filesystem errors (composition, walking, reading)
    #[error("Filesystem error: {0}")]
    Fs(#[from] FsError),

    /// Session and sink errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Tar encoding errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The export was cancelled before it finished
    #[error("export cancelled during {0}")]
    Cancelled(&'static str),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl ExporterError {
    /// Returns `true` when the error was caused by the connection-acquisition timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ExporterError::Transport(TransportError::ConnectTimeout { .. })
        )
    }

    /// Returns `true` when the error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExporterError::Cancelled(_))
    }
}

/// Session and sink errors
///
/// Errors raised while acquiring a caller connection or writing to the
/// outbound sink.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No caller connected within the acquisition bound
    #[error("timed out after {timeout:?} waiting for session {session_id}")]
    ConnectTimeout {
        session_id: String,
        timeout: Duration,
    },

    /// The session is not registered and the caller asked not to wait
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Failed to open the write sink
    #[error("failed to open write sink: {0}")]
    SinkOpen(String),

    /// Failed to flush or close the write sink
    #[error("failed to close write sink: {0}")]
    SinkClose(String),
}

/// Virtual filesystem errors
#[derive(Debug, Error)]
pub enum FsError {
    /// A path does not exist in the filesystem
    #[error("path not found: {0}")]
    NotFound(String),

    /// A directory entry name is empty or contains a separator
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Two directory entries share a name
    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    /// Underlying I/O failure while walking or reading
    #[error("{path}: {message}")]
    Io { path: String, message: String },
}

// Conversion from std::io::Error
impl From<std::io::Error> for ExporterError {
    fn from(err: std::io::Error) -> Self {
        ExporterError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        ExporterError::Other(format!("JSON error: {err}"))
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ExporterError {
    fn from(err: toml::de::Error) -> Self {
        ExporterError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exporter_error_display() {
        let err = ExporterError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_ambiguity_error_messages() {
        assert_eq!(
            ExporterError::MissingPlatforms.to_string(),
            "unable to export multiple refs, missing platforms mapping"
        );
        assert_eq!(
            ExporterError::MultiplePlatformsWithoutMap.to_string(),
            "unable to export multiple platforms without map"
        );
        assert_eq!(
            ExporterError::MissingRef("linux/arm64".to_string()).to_string(),
            "failed to find ref for ID linux/arm64"
        );
    }

    #[test]
    fn test_transport_error_conversion() {
        let err: ExporterError = TransportError::ConnectTimeout {
            session_id: "abc".to_string(),
            timeout: Duration::from_secs(5),
        }
        .into();
        assert!(matches!(err, ExporterError::Transport(_)));
        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_fs_error_conversion() {
        let err: ExporterError = FsError::DuplicatePath("linux_amd64".to_string()).into();
        assert!(matches!(err, ExporterError::Fs(FsError::DuplicatePath(_))));
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: ExporterError = io_err.into();
        assert!(matches!(err, ExporterError::Io(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: ExporterError = toml_err.into();
        assert!(matches!(err, ExporterError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }

    #[test]
    fn test_exporter_error_implements_std_error() {
        let err = ExporterError::Cancelled("delivery");
        let _: &dyn std::error::Error = &err;
    }
}

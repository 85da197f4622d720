//! Exporter attribute parsing
//!
//! Exporter attributes arrive as a flat string map. Three parsers run over
//! it in order: the epoch parser and the multi-platform parser each consume
//! their own key, then [`parse_exporter_options`] consumes the attestation
//! prefix and layer preference. Whatever is left over is returned to the
//! caller untouched.

use crate::domain::{ExporterError, Result};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

/// Name prefix applied to laid-out attestation files
pub const ATTESTATION_PREFIX_KEY: &str = "attestation-prefix";

/// Preference for non-distributable layers, passed through to directory construction
pub const PREFER_NONDIST_LAYERS_KEY: &str = "prefer-nondist-layers";

/// Fixed modification time for every emitted entry
pub const EPOCH_KEY: &str = "source-date-epoch";

/// Explicit map-mode override
pub const MULTI_PLATFORM_KEY: &str = "multi-platform";

/// Result metadata key carrying the source-side epoch
pub const SOURCE_EPOCH_METADATA_KEY: &str = "source.date.epoch";

/// Raw exporter attributes
pub type ExporterAttrs = HashMap<String, String>;

/// Resolved per-export options
///
/// Built once by [`ExportOptions::resolve`] and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    /// Modification time substituted for every entry's real mtime
    pub epoch: Option<DateTime<Utc>>,

    /// Forces map mode on or off
    pub multi_platform: Option<bool>,

    /// Prefix for attestation file names
    pub attestation_prefix: String,

    /// Prefer non-distributable layers when constructing directories
    pub prefer_nondist_layers: bool,
}

impl ExportOptions {
    /// Runs every attribute parser over `attrs`
    ///
    /// # Returns
    ///
    /// The resolved options and the attributes none of the parsers
    /// recognized.
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::Configuration`] naming the offending key and
    /// value when an epoch or boolean attribute does not parse.
    pub fn resolve(attrs: ExporterAttrs) -> Result<(Self, ExporterAttrs)> {
        let (epoch, attrs) = parse_epoch_attrs(attrs)?;
        let (multi_platform, attrs) = parse_multi_platform_attrs(attrs)?;
        let (mut options, residual) = parse_exporter_options(attrs)?;
        options.epoch = epoch;
        options.multi_platform = multi_platform;

        for key in residual.keys() {
            tracing::debug!(key = %key, "Ignoring unrecognized exporter attribute");
        }

        Ok((options, residual))
    }
}

/// Option Parser: consumes `attestation-prefix` and `prefer-nondist-layers`
///
/// The returned options leave `epoch` and `multi_platform` unset; those
/// keys are owned by the upstream parsers and end up in the residual map
/// if they reach this function.
pub fn parse_exporter_options(attrs: ExporterAttrs) -> Result<(ExportOptions, ExporterAttrs)> {
    let mut options = ExportOptions::default();
    let mut residual = ExporterAttrs::new();

    for (key, value) in attrs {
        match key.as_str() {
            ATTESTATION_PREFIX_KEY => options.attestation_prefix = value,
            PREFER_NONDIST_LAYERS_KEY => {
                options.prefer_nondist_layers = parse_bool(&value)
                    .ok_or_else(|| non_bool(PREFER_NONDIST_LAYERS_KEY, &value))?;
            }
            _ => {
                residual.insert(key, value);
            }
        }
    }

    Ok((options, residual))
}

/// Consumes `source-date-epoch`
///
/// An empty value leaves the epoch unset.
pub fn parse_epoch_attrs(
    mut attrs: ExporterAttrs,
) -> Result<(Option<DateTime<Utc>>, ExporterAttrs)> {
    let epoch = match attrs.remove(EPOCH_KEY) {
        Some(value) => parse_epoch(&value)?,
        None => None,
    };
    Ok((epoch, attrs))
}

/// Consumes `multi-platform`
pub fn parse_multi_platform_attrs(
    mut attrs: ExporterAttrs,
) -> Result<(Option<bool>, ExporterAttrs)> {
    let multi_platform = match attrs.remove(MULTI_PLATFORM_KEY) {
        Some(value) => Some(parse_bool(&value).ok_or_else(|| non_bool(MULTI_PLATFORM_KEY, &value))?),
        None => None,
    };
    Ok((multi_platform, attrs))
}

/// Reads the source-side epoch from result metadata
pub fn epoch_from_metadata(metadata: &HashMap<String, Vec<u8>>) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = metadata.get(SOURCE_EPOCH_METADATA_KEY) else {
        return Ok(None);
    };
    let value = std::str::from_utf8(raw).map_err(|_| {
        ExporterError::Configuration(format!("invalid {SOURCE_EPOCH_METADATA_KEY}: not UTF-8"))
    })?;
    parse_epoch(value.trim())
}

fn parse_epoch(value: &str) -> Result<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    let invalid = || ExporterError::Configuration(format!("invalid {EPOCH_KEY}: {value}"));
    let secs: i64 = value.parse().map_err(|_| invalid())?;
    let time = Utc.timestamp_opt(secs, 0).single().ok_or_else(invalid)?;
    Ok(Some(time))
}

/// Parses the boolean tokens accepted on the command line and in attributes
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn non_bool(key: &str, value: &str) -> ExporterError {
    ExporterError::Configuration(format!("non-bool value for {key}: {value}"))
}

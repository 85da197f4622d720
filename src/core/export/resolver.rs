//! Result-set resolution
//!
//! Decides whether an export is emitted as one flat tree or as a map of
//! named sub-directories, and which refs are materialized. The decision is
//! an ordered rule table over three signals (mapped ref count, declared
//! platform count, explicit override); later rules may overwrite what
//! earlier ones decided.

use crate::adapters::traits::ImmutableRef;
use crate::core::options::ExportOptions;
use crate::domain::{
    Attestation, ExportSource, ExporterError, Platforms, Result, PLATFORMS_METADATA_KEY,
};
use std::fmt;
use std::sync::Arc;

/// Shape of the emitted archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The single materialized directory is the archive root
    Flat,
    /// Each materialized directory is a named top-level entry
    Nested,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Flat => write!(f, "flat"),
            Layout::Nested => write!(f, "nested"),
        }
    }
}

/// Inputs to the map-mode rules
#[derive(Debug)]
struct MapSignals<'a> {
    mapped_refs: usize,
    descriptor_present: bool,
    platforms: Option<&'a Platforms>,
    multi_platform: Option<bool>,
}

impl MapSignals<'_> {
    fn platform_count(&self) -> usize {
        self.platforms.map_or(0, Platforms::len)
    }
}

type MapRule = fn(&MapSignals<'_>, &mut bool) -> Result<()>;

/// Map-mode rules, evaluated in order
const MAP_RULES: [(&str, MapRule); 5] = [
    ("mapped-refs", mapped_refs_rule),
    ("platforms-required", platforms_required_rule),
    ("declared-platforms", declared_platforms_rule),
    ("explicit-override", explicit_override_rule),
    ("multiple-platforms-need-map", multiple_platforms_rule),
];

fn mapped_refs_rule(signals: &MapSignals<'_>, use_map: &mut bool) -> Result<()> {
    *use_map = signals.mapped_refs > 0;
    Ok(())
}

fn platforms_required_rule(signals: &MapSignals<'_>, _: &mut bool) -> Result<()> {
    if signals.mapped_refs > 0 && !signals.descriptor_present {
        return Err(ExporterError::MissingPlatforms);
    }
    Ok(())
}

fn declared_platforms_rule(signals: &MapSignals<'_>, use_map: &mut bool) -> Result<()> {
    if signals.platform_count() > 1 {
        *use_map = true;
    }
    Ok(())
}

fn explicit_override_rule(signals: &MapSignals<'_>, use_map: &mut bool) -> Result<()> {
    if let Some(value) = signals.multi_platform {
        *use_map = value;
    }
    Ok(())
}

fn multiple_platforms_rule(signals: &MapSignals<'_>, use_map: &mut bool) -> Result<()> {
    if !*use_map && signals.platform_count() > 1 {
        return Err(ExporterError::MultiplePlatformsWithoutMap);
    }
    Ok(())
}

fn evaluate_map_rules(signals: &MapSignals<'_>) -> Result<bool> {
    let mut use_map = false;
    for (name, rule) in MAP_RULES {
        rule(signals, &mut use_map)?;
        tracing::trace!(rule = name, use_map, "Evaluated map rule");
    }
    Ok(use_map)
}

/// One ref scheduled for materialization
#[derive(Clone)]
pub struct Selection {
    /// Directory key: the platform id, or `""` for a single-ref result
    pub key: String,

    /// Ref to materialize; `None` yields an empty directory
    pub reference: Option<Arc<dyn ImmutableRef>>,

    /// Attestations laid out next to the ref's files
    pub attestations: Vec<Attestation>,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("key", &self.key)
            .field("reference", &self.reference.as_ref().map(|r| r.id().to_string()))
            .field("attestations", &self.attestations.len())
            .finish()
    }
}

/// Outcome of result-set resolution
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    /// Final map-mode decision
    pub use_map: bool,

    /// Whether the source used the mapping form
    pub mapped: bool,

    /// Refs to materialize, in platforms-descriptor order
    pub selections: Vec<Selection>,
}

impl ResolvedSet {
    /// Layout of the composed filesystem
    ///
    /// A single-ref result is always flat; map mode only nests mapped results.
    pub fn layout(&self) -> Layout {
        if self.mapped && self.use_map {
            Layout::Nested
        } else {
            Layout::Flat
        }
    }
}

/// Resolves which refs to materialize and how to lay them out
///
/// A descriptor that is present but empty (no bytes, or no entries)
/// selects nothing, which exports an empty archive.
///
/// # Errors
///
/// - [`ExporterError::InvalidPlatforms`] if the descriptor does not parse
/// - [`ExporterError::MissingPlatforms`] if a mapped result has no descriptor
/// - [`ExporterError::MultiplePlatformsWithoutMap`] if map mode is off for
///   a result declaring several platforms
/// - [`ExporterError::MissingRef`] if a declared platform has no ref
pub fn resolve_result_set(source: &ExportSource, options: &ExportOptions) -> Result<ResolvedSet> {
    let descriptor = source.metadata.get(PLATFORMS_METADATA_KEY);
    let platforms = descriptor
        .filter(|bytes| !bytes.is_empty())
        .map(|bytes| Platforms::from_bytes(bytes))
        .transpose()?;

    let signals = MapSignals {
        mapped_refs: source.refs.len(),
        descriptor_present: descriptor.is_some(),
        platforms: platforms.as_ref(),
        multi_platform: options.multi_platform,
    };
    let use_map = evaluate_map_rules(&signals)?;

    let mapped = source.is_mapped();
    let selections = if mapped {
        let platforms = platforms.unwrap_or_default();
        let mut selections = Vec::with_capacity(platforms.len());
        for entry in platforms.iter() {
            let reference = source
                .refs
                .get(&entry.id)
                .ok_or_else(|| ExporterError::MissingRef(entry.id.to_string()))?;
            selections.push(Selection {
                key: entry.id.to_string(),
                reference: Some(reference.clone()),
                attestations: source
                    .attestations
                    .get(&entry.id)
                    .cloned()
                    .unwrap_or_default(),
            });
        }
        if !use_map {
            // only one directory is emitted without map mode
            selections.truncate(1);
        }
        selections
    } else {
        vec![Selection {
            key: String::new(),
            reference: source.reference.clone(),
            attestations: Vec::new(),
        }]
    };

    tracing::debug!(
        use_map,
        mapped,
        selected = selections.len(),
        "Resolved result set"
    );

    Ok(ResolvedSet {
        use_map,
        mapped,
        selections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fs::MemFs;
    use crate::adapters::local::MemRef;
    use crate::domain::PlatformId;

    fn mem_ref(id: &str) -> Arc<dyn ImmutableRef> {
        Arc::new(MemRef::new(id, MemFs::new()))
    }

    fn mapped(ids: &[&str]) -> ExportSource {
        let mut source = ExportSource::empty();
        for id in ids {
            source = source
                .with_platform(
                    PlatformId::new(*id).unwrap(),
                    id.parse().unwrap(),
                    mem_ref(&format!("ref-{id}")),
                )
                .unwrap();
        }
        source
    }

    fn with_override(value: Option<bool>) -> ExportOptions {
        ExportOptions {
            multi_platform: value,
            ..ExportOptions::default()
        }
    }

    fn keys(set: &ResolvedSet) -> Vec<&str> {
        set.selections.iter().map(|s| s.key.as_str()).collect()
    }

    #[test]
    fn test_single_ref_is_flat_regardless_of_override() {
        for value in [None, Some(true), Some(false)] {
            let source = ExportSource::single(mem_ref("a"));
            let set = resolve_result_set(&source, &with_override(value)).unwrap();
            assert_eq!(set.layout(), Layout::Flat);
            assert_eq!(keys(&set), vec![""]);
            assert_eq!(set.use_map, value.unwrap_or(false));
        }
    }

    #[test]
    fn test_empty_source_selects_empty_directory() {
        let set = resolve_result_set(&ExportSource::empty(), &ExportOptions::default()).unwrap();
        assert_eq!(set.selections.len(), 1);
        assert!(set.selections[0].reference.is_none());
    }

    #[test]
    fn test_multiple_platforms_map_by_default() {
        let source = mapped(&["linux/amd64", "linux/arm64"]);
        let set = resolve_result_set(&source, &ExportOptions::default()).unwrap();
        assert!(set.use_map);
        assert_eq!(set.layout(), Layout::Nested);
        assert_eq!(keys(&set), vec!["linux/amd64", "linux/arm64"]);
    }

    #[test]
    fn test_single_mapped_platform_uses_map() {
        let source = mapped(&["linux/amd64"]);
        let set = resolve_result_set(&source, &ExportOptions::default()).unwrap();
        assert_eq!(set.layout(), Layout::Nested);
        assert_eq!(keys(&set), vec!["linux/amd64"]);
    }

    #[test]
    fn test_single_mapped_platform_without_map_is_flat() {
        let source = mapped(&["linux/amd64"]);
        let set = resolve_result_set(&source, &with_override(Some(false))).unwrap();
        assert_eq!(set.layout(), Layout::Flat);
        assert_eq!(keys(&set), vec!["linux/amd64"]);
    }

    #[test]
    fn test_multiple_platforms_without_map_is_rejected() {
        let source = mapped(&["linux/amd64", "linux/arm64"]);
        let err = resolve_result_set(&source, &with_override(Some(false))).unwrap_err();
        assert!(matches!(err, ExporterError::MultiplePlatformsWithoutMap));
    }

    #[test]
    fn test_mapped_without_descriptor() {
        let mut source = ExportSource::empty();
        source
            .refs
            .insert(PlatformId::new("linux/amd64").unwrap(), mem_ref("a"));
        let err = resolve_result_set(&source, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExporterError::MissingPlatforms));
    }

    #[test]
    fn test_present_but_empty_descriptor_selects_nothing() {
        for bytes in [&b"{\"Platforms\":[]}"[..], &b""[..]] {
            let mut source = ExportSource::empty().with_metadata(PLATFORMS_METADATA_KEY, bytes);
            source
                .refs
                .insert(PlatformId::new("linux/amd64").unwrap(), mem_ref("a"));
            let set = resolve_result_set(&source, &ExportOptions::default()).unwrap();
            assert!(set.use_map);
            assert_eq!(set.layout(), Layout::Nested);
            assert!(set.selections.is_empty());
        }
    }

    #[test]
    fn test_malformed_descriptor() {
        let source =
            ExportSource::single(mem_ref("a")).with_metadata(PLATFORMS_METADATA_KEY, "{not json");
        let err = resolve_result_set(&source, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExporterError::InvalidPlatforms(_)));
    }

    #[test]
    fn test_missing_ref_is_named() {
        let mut source = mapped(&["linux/amd64", "linux/arm64"]);
        source.refs.remove(&PlatformId::new("linux/arm64").unwrap());
        let err = resolve_result_set(&source, &ExportOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "failed to find ref for ID linux/arm64");
    }

    #[test]
    fn test_attestations_follow_their_platform() {
        let source = mapped(&["linux/amd64", "linux/arm64"]).with_attestations(
            PlatformId::new("linux/arm64").unwrap(),
            vec![Attestation::in_toto(
                "sbom.json",
                "https://spdx.dev/Document",
                serde_json::json!({}),
            )],
        );
        let set = resolve_result_set(&source, &ExportOptions::default()).unwrap();
        assert!(set.selections[0].attestations.is_empty());
        assert_eq!(set.selections[1].attestations.len(), 1);
    }

    #[test]
    fn test_override_true_on_single_descriptor_entry() {
        let source = mapped(&["linux/amd64"]);
        let set = resolve_result_set(&source, &with_override(Some(true))).unwrap();
        assert_eq!(set.layout(), Layout::Nested);
    }
}

//! Build results handed to the exporter
//!
//! A source is either a single ref or a mapping of platform id to ref,
//! plus per-platform attestations and free-form metadata. The metadata
//! carries the platforms descriptor whenever more than one ref is present.

use super::attestation::Attestation;
use super::ids::PlatformId;
use super::platform::{Platforms, PLATFORMS_METADATA_KEY};
use super::result::Result;
use crate::adapters::traits::ImmutableRef;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Mapping of platform id to ref
pub type RefMap = HashMap<PlatformId, Arc<dyn ImmutableRef>>;

/// Build result to export
#[derive(Clone, Default)]
pub struct ExportSource {
    /// Single ref (used when `refs` is empty); `None` exports an empty directory
    pub reference: Option<Arc<dyn ImmutableRef>>,

    /// Per-platform refs
    pub refs: RefMap,

    /// Per-platform attestations
    pub attestations: HashMap<PlatformId, Vec<Attestation>>,

    /// Result metadata
    pub metadata: HashMap<String, Vec<u8>>,
}

impl ExportSource {
    /// Creates a single-ref source
    pub fn single(reference: Arc<dyn ImmutableRef>) -> Self {
        Self {
            reference: Some(reference),
            ..Self::default()
        }
    }

    /// Creates a source with no ref at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a platform ref, recording it in the platforms descriptor
    ///
    /// The descriptor is regenerated from the existing metadata value so
    /// repeated calls keep insertion order.
    pub fn with_platform(
        mut self,
        id: PlatformId,
        platform: super::platform::Platform,
        reference: Arc<dyn ImmutableRef>,
    ) -> Result<Self> {
        let mut platforms = match self.metadata.get(PLATFORMS_METADATA_KEY) {
            Some(bytes) => Platforms::from_bytes(bytes)?,
            None => Platforms::new(),
        };
        platforms.push(id.clone(), platform);
        self.metadata
            .insert(PLATFORMS_METADATA_KEY.to_string(), platforms.to_bytes()?);
        self.refs.insert(id, reference);
        Ok(self)
    }

    /// Attaches attestations to a platform
    pub fn with_attestations(mut self, id: PlatformId, attestations: Vec<Attestation>) -> Self {
        self.attestations.entry(id).or_default().extend(attestations);
        self
    }

    /// Sets a raw metadata value
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns `true` when the mapping form is used
    pub fn is_mapped(&self) -> bool {
        !self.refs.is_empty()
    }
}

impl fmt::Debug for ExportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ref_ids: Vec<&str> = self.refs.keys().map(PlatformId::as_str).collect();
        ref_ids.sort_unstable();
        f.debug_struct("ExportSource")
            .field("reference", &self.reference.as_ref().map(|r| r.id().to_string()))
            .field("refs", &ref_ids)
            .field("metadata_keys", &self.metadata.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! Platform tuples and the platforms descriptor
//!
//! A multi-platform build result carries a serialized [`Platforms`]
//! descriptor in its metadata under [`PLATFORMS_METADATA_KEY`]. The
//! descriptor is ordered and its order decides the order in which
//! per-platform directories are materialized and emitted.

use super::errors::ExporterError;
use super::ids::PlatformId;
use super::result::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metadata key holding the JSON-encoded platforms descriptor
pub const PLATFORMS_METADATA_KEY: &str = "refs.platforms";

/// An OS/architecture/variant triple identifying a build target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`
    pub os: String,

    /// CPU architecture, e.g. `amd64`
    pub architecture: String,

    /// Optional architecture variant, e.g. `v7`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: None,
            }),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => {
                Ok(Self {
                    os: os.to_string(),
                    architecture: arch.to_string(),
                    variant: Some(variant.to_string()),
                })
            }
            _ => Err(format!(
                "Invalid platform format. Expected os/arch[/variant], got: {s}"
            )),
        }
    }
}

/// One entry of the platforms descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Key of the ref this entry describes
    #[serde(rename = "ID")]
    pub id: PlatformId,

    /// Target platform of that ref
    #[serde(rename = "Platform")]
    pub platform: Platform,
}

/// Ordered platforms descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platforms {
    #[serde(rename = "Platforms", default)]
    pub platforms: Vec<PlatformEntry>,
}

impl Platforms {
    /// Creates an empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a platform entry, keeping insertion order
    pub fn push(&mut self, id: PlatformId, platform: Platform) {
        self.platforms.push(PlatformEntry { id, platform });
    }

    /// Number of declared platforms
    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    /// Returns `true` if no platform is declared
    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// Iterates the entries in descriptor order
    pub fn iter(&self) -> impl Iterator<Item = &PlatformEntry> {
        self.platforms.iter()
    }

    /// Parses a descriptor from its JSON metadata value
    ///
    /// # Errors
    ///
    /// Returns [`ExporterError::InvalidPlatforms`] wrapping the parse failure
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ExporterError::InvalidPlatforms(e.to_string()))
    }

    /// Serializes the descriptor for storage in result metadata
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

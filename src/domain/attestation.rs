//! Attestations attached to per-platform build results

use serde::{Deserialize, Serialize};

/// In-toto statement type written for laid-out attestations
pub const IN_TOTO_STATEMENT_TYPE: &str = "https://in-toto.io/Statement/v0.1";

/// Kind of attestation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AttestationKind {
    /// An in-toto predicate, wrapped in a statement when laid out
    #[default]
    InToto,
}

/// Supplementary metadata artifact for one platform's result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Kind of attestation
    #[serde(default)]
    pub kind: AttestationKind,

    /// Path the attestation was produced at; only its base name is used on export
    pub path: String,

    /// In-toto predicate type URI
    pub predicate_type: String,

    /// Predicate body
    pub predicate: serde_json::Value,
}

impl Attestation {
    /// Creates an in-toto attestation
    pub fn in_toto(
        path: impl Into<String>,
        predicate_type: impl Into<String>,
        predicate: serde_json::Value,
    ) -> Self {
        Self {
            kind: AttestationKind::InToto,
            path: path.into(),
            predicate_type: predicate_type.into(),
            predicate,
        }
    }

    /// Base name of the attestation path
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("attestation.json")
    }
}

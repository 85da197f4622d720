//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that flow through an export. Each
//! type rejects empty values so a blank session or platform never reaches
//! the collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Session identifier newtype wrapper
///
/// Names the client session that receives the tarball.
///
/// # Examples
///
/// ```
/// use tar_exporter::domain::ids::SessionId;
/// use std::str::FromStr;
///
/// let session_id = SessionId::from_str("q1w2e3r4t5").unwrap();
/// assert_eq!(session_id.as_str(), "q1w2e3r4t5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new SessionId from a string
    ///
    /// # Errors
    ///
    /// Returns `Err` if the identifier is empty or whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Session ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Generates a random session identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the session ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Platform identifier newtype wrapper
///
/// Keys a ref in a multi-platform build result, typically formatted like
/// `linux/amd64` or `linux/arm/v7`.
///
/// # Examples
///
/// ```
/// use tar_exporter::domain::ids::PlatformId;
///
/// let id = PlatformId::new("linux/arm64").unwrap();
/// assert_eq!(id.as_str(), "linux/arm64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlatformId(String);

impl PlatformId {
    /// Creates a new PlatformId from a string
    ///
    /// # Errors
    ///
    /// Returns `Err` if the identifier is empty or whitespace
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Platform ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the platform ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PlatformId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PlatformId> for String {
    fn from(id: PlatformId) -> Self {
        id.0
    }
}

impl AsRef<str> for PlatformId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

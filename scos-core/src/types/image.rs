//! Image reference domain types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A digest-pinned image reference of the form `registry/path@sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageReference {
    /// Registry host, optionally with port (e.g. `quay.io`, `localhost:5000`)
    pub registry: String,

    /// Repository path below the registry (e.g. `openshift/okd-content`)
    pub repository: String,

    /// Digest including the algorithm prefix (e.g. `sha256:abc...`)
    pub digest: String,
}

/// Why a string is not a digest-pinned reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("missing '@' digest separator")]
    MissingDigest,
    #[error("missing registry or repository path")]
    MissingPath,
    #[error("unsupported digest '{0}', expected sha256:<hex>")]
    BadDigest(String),
}

impl ImageReference {
    /// Parse a reference, rejecting anything that is not pinned by sha256 digest.
    pub fn parse(s: &str) -> Result<Self, ReferenceError> {
        let (name, digest) = s.rsplit_once('@').ok_or(ReferenceError::MissingDigest)?;

        let hex = digest
            .strip_prefix("sha256:")
            .ok_or_else(|| ReferenceError::BadDigest(digest.to_string()))?;
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(ReferenceError::BadDigest(digest.to_string()));
        }

        let (registry, repository) = name.split_once('/').ok_or(ReferenceError::MissingPath)?;
        if registry.is_empty()
            || repository.is_empty()
            || repository.split('/').any(str::is_empty)
            || name.chars().any(char::is_whitespace)
        {
            return Err(ReferenceError::MissingPath);
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            digest: digest.to_string(),
        })
    }

    /// Reference without the digest (`registry/path`).
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }
}

impl FromStr for ImageReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.registry, self.repository, self.digest)
    }
}

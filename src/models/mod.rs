//! Model metadata and versioning.
//!
//! A model is always handled as an (artifact, metadata) pair: the artifact
//! is an opaque weights blob, the metadata its versioned descriptor. The
//! metadata JSON written next to the artifact is the same object published
//! in the remote store, so local and remote state stay directly comparable.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Versioned descriptor of a model artifact. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// Input tensor shape, batch dimension first (e.g. `[1, 5]`).
    pub input_shape: Vec<usize>,
    /// Output tensor shape, batch dimension first (e.g. `[1, 24]`).
    pub output_shape: Vec<usize>,
    /// Feature names in the order the model expects them.
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub performance_metrics: HashMap<String, f64>,
}

impl ModelMetadata {
    /// Number of future time steps one inference call produces.
    pub fn horizon(&self) -> usize {
        self.output_shape.last().copied().unwrap_or(0)
    }

    /// Number of input features the model expects.
    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Parsed version, when the version string is a semantic version.
    pub fn parsed_version(&self) -> Option<ModelVersion> {
        ModelVersion::from_str(&self.version).ok()
    }
}

/// A totally ordered `major.minor.patch` model version.
///
/// The remote store publishes versions as strings; comparing them as
/// parsed versions lets the sync agent distinguish an upgrade from a
/// rollback instead of treating any inequality as "needs update".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for ModelVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().splitn(3, '.');
        let mut next = |name: &str| -> Result<u32> {
            parts
                .next()
                .ok_or_else(|| anyhow!("version '{}' is missing its {} component", s, name))?
                .parse::<u32>()
                .map_err(|e| anyhow!("version '{}' has a non-numeric {} component: {}", s, name, e))
        };
        Ok(Self {
            major: next("major")?,
            minor: next("minor")?,
            patch: next("patch")?,
        })
    }
}

impl Ord for ModelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl PartialOrd for ModelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Relationship of a remote version to the local one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDrift {
    /// Local and remote agree.
    UpToDate,
    /// Remote is newer (or no local model exists).
    UpdateAvailable,
    /// Remote is older than the installed model.
    Rollback,
}

/// Compare a remote version against the locally installed one.
///
/// Falls back to string inequality when either side is not a parseable
/// semantic version; in that mode any difference counts as an update,
/// which matches how non-semver tags (e.g. build hashes) are published.
pub fn compare_versions(local: Option<&str>, remote: &str) -> VersionDrift {
    let Some(local) = local else {
        return VersionDrift::UpdateAvailable;
    };

    match (ModelVersion::from_str(local), ModelVersion::from_str(remote)) {
        (Ok(l), Ok(r)) => match r.cmp(&l) {
            Ordering::Equal => VersionDrift::UpToDate,
            Ordering::Greater => VersionDrift::UpdateAvailable,
            Ordering::Less => VersionDrift::Rollback,
        },
        _ => {
            if local == remote {
                VersionDrift::UpToDate
            } else {
                tracing::warn!(
                    local,
                    remote,
                    "model versions are not semantic versions, falling back to string comparison"
                );
                VersionDrift::UpdateAvailable
            }
        }
    }
}

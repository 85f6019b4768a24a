use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A committed artifact as seen by readers.
///
/// Timestamps are read from the backend at listing time rather than stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub size_bytes: u64,
    /// `None` when the backend cannot report a creation time.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Artifact {
    /// Build an artifact description from filesystem metadata.
    pub fn from_metadata(name: impl Into<String>, metadata: &Metadata) -> Self {
        Self {
            name: name.into(),
            size_bytes: metadata.len(),
            created_at: metadata.created().ok().map(DateTime::<Utc>::from),
            updated_at: metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH)),
        }
    }
}

/// Check that `name` is a bare filename usable as a key in either area.
///
/// Upstream validation already strips directories; this is the store's own
/// guard so no backend ever resolves a path outside its directories.
pub fn validate_artifact_name(name: &str) -> StoreResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where the filesystem backend keeps its two areas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Partially received artifacts. Never listed, never served.
    pub staging_path: PathBuf,
    /// Committed artifacts. Must be on the same filesystem as `staging_path`.
    pub completed_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            staging_path: PathBuf::from("./data/staging"),
            completed_path: PathBuf::from("./data/completed"),
        }
    }
}

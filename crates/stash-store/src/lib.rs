//! Artifact storage engine for stash.
//!
//! Uploads are written to a staging area and become visible only once
//! committed. Two backends are provided:
//!
//! - [`FsArtifactStore`]: staging and completed directories on one
//!   filesystem, commit by atomic rename.
//! - [`InMemoryArtifactStore`]: a map behind a lock, for tests.
//!
//! Both implement [`ArtifactStore`] and share its invariants: staged bytes
//! are never observable, committed artifacts are never overwritten, and an
//! abandoned staging handle cleans up after itself.

pub mod artifact;
pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use artifact::{validate_artifact_name, Artifact};
pub use config::StorageConfig;
pub use error::{StoreError, StoreResult};
pub use fs::{FsArtifactStore, FsStaging};
pub use memory::{InMemoryArtifactStore, MemoryStaging};
pub use traits::ArtifactStore;

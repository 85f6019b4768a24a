use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::artifact::{validate_artifact_name, Artifact};
use crate::config::StorageConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::ArtifactStore;

/// Filesystem artifact store with separate staging and completed directories.
///
/// Commit hard-links the staging file into completed, so both directories
/// must live on the same filesystem. The link never replaces an existing
/// entry, including one placed in completed by another writer.
///
/// A store instance assumes sole ownership of its staging directory: `open`
/// deletes everything found there. Two stores must never share one.
#[derive(Debug)]
pub struct FsArtifactStore {
    staging: PathBuf,
    completed: PathBuf,
    stage_lock: Mutex<()>,
}

/// An in-progress upload backed by a file in the staging directory.
///
/// Dropping the handle without committing or aborting removes the file.
#[derive(Debug)]
pub struct FsStaging {
    name: String,
    path: PathBuf,
    file: Option<File>,
    written: u64,
    armed: bool,
}

impl FsStaging {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for FsStaging {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.file.take();
        // Blocking unlink; Drop cannot await.
        match std::fs::remove_file(&self.path) {
            Ok(()) => warn!(artifact = %self.name, "staging entry dropped before commit, removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(
                artifact = %self.name,
                path = %self.path.display(),
                error = %e,
                "failed to remove abandoned staging entry"
            ),
        }
    }
}

impl FsArtifactStore {
    /// Open a store over two existing, distinct directories.
    ///
    /// Anything left in the staging directory by a previous process is an
    /// orphan of an interrupted upload and is removed.
    pub async fn open(config: &StorageConfig) -> StoreResult<Self> {
        let staging = checked_dir(&config.staging_path).await?;
        let completed = checked_dir(&config.completed_path).await?;
        if staging == completed {
            return Err(StoreError::BadDirectory {
                path: staging,
                reason: "staging and completed areas must be different directories".into(),
            });
        }

        let store = Self {
            staging,
            completed,
            stage_lock: Mutex::new(()),
        };
        let purged = store.purge_staging().await?;
        if purged > 0 {
            warn!(purged, "removed orphaned staging entries");
        }
        debug!(
            staging = %store.staging.display(),
            completed = %store.completed.display(),
            "opened filesystem artifact store"
        );
        Ok(store)
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    pub fn completed_path(&self) -> &Path {
        &self.completed
    }

    async fn purge_staging(&self) -> StoreResult<usize> {
        let mut entries = fs::read_dir(&self.staging).await?;
        let mut purged = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => purged += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(purged)
    }

    fn completed_file(&self, name: &str) -> StoreResult<PathBuf> {
        validate_artifact_name(name)?;
        Ok(self.completed.join(name))
    }
}

async fn checked_dir(path: &Path) -> StoreResult<PathBuf> {
    let bad = |reason: String| StoreError::BadDirectory {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = fs::metadata(path).await.map_err(|e| bad(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(bad("not a directory".into()));
    }
    fs::canonicalize(path).await.map_err(|e| bad(e.to_string()))
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    type Staging = FsStaging;
    type Reader = File;

    async fn exists(&self, name: &str) -> StoreResult<bool> {
        let path = self.completed_file(name)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn begin_staging(&self, name: &str) -> StoreResult<FsStaging> {
        validate_artifact_name(name)?;
        let path = self.staging.join(name);

        let _guard = self.stage_lock.lock().await;
        // Claim the staging slot first, then look at the completed area. A
        // commit that lands in between is still observed by the second check.
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let staging = FsStaging {
            name: name.to_string(),
            path,
            file: Some(file),
            written: 0,
            armed: true,
        };
        if self.exists(name).await? {
            self.abort(staging).await?;
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        debug!(artifact = name, "staging entry created");
        Ok(staging)
    }

    async fn write_chunk(&self, staging: &mut FsStaging, bytes: &[u8]) -> StoreResult<()> {
        let file = staging.file.as_mut().ok_or_else(|| {
            StoreError::Io(std::io::Error::other("staging entry is already closed"))
        })?;
        file.write_all(bytes).await?;
        staging.written += bytes.len() as u64;
        Ok(())
    }

    async fn commit(&self, mut staging: FsStaging) -> StoreResult<Artifact> {
        let target = self.completed_file(&staging.name)?;
        if let Some(mut file) = staging.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        match fs::hard_link(&staging.path, &target).await {
            Ok(()) => staging.disarm(),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let name = staging.name.clone();
                self.abort(staging).await?;
                return Err(StoreError::AlreadyExists(name));
            }
            Err(e) => return Err(e.into()),
        }
        if let Err(e) = fs::remove_file(&staging.path).await {
            // Committed regardless; the next open purges the leftover link.
            warn!(artifact = %staging.name, error = %e, "failed to unlink staging entry");
        }

        if let Err(e) = sync_dir(&self.completed).await {
            warn!(artifact = %staging.name, error = %e, "failed to sync completed directory");
        }

        let artifact = match fs::metadata(&target).await {
            Ok(metadata) => Artifact::from_metadata(&staging.name, &metadata),
            Err(e) => {
                warn!(
                    artifact = %staging.name,
                    error = %e,
                    "committed artifact metadata unavailable"
                );
                Artifact {
                    name: staging.name.clone(),
                    size_bytes: staging.written,
                    created_at: None,
                    updated_at: Utc::now(),
                }
            }
        };
        debug!(artifact = %artifact.name, size = artifact.size_bytes, "artifact committed");
        Ok(artifact)
    }

    async fn abort(&self, mut staging: FsStaging) -> StoreResult<()> {
        staging.file.take();
        staging.disarm();
        match fs::remove_file(&staging.path).await {
            Ok(()) => {
                debug!(artifact = %staging.name, "staging entry aborted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> StoreResult<Vec<Artifact>> {
        let mut entries = fs::read_dir(&self.completed).await?;
        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "skipping artifact with non UTF-8 name");
                    continue;
                }
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.is_file() {
                artifacts.push(Artifact::from_metadata(name, &metadata));
            }
        }
        Ok(artifacts)
    }

    async fn search(&self, name: &str) -> StoreResult<File> {
        let path = self.completed_file(name)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !file.metadata().await?.is_file() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        Ok(file)
    }
}

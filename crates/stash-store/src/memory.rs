use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::artifact::{validate_artifact_name, Artifact};
use crate::error::{StoreError, StoreResult};
use crate::traits::ArtifactStore;

#[derive(Debug, Default)]
struct MemoryState {
    staging: HashSet<String>,
    completed: BTreeMap<String, StoredArtifact>,
}

#[derive(Debug)]
struct StoredArtifact {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
}

impl StoredArtifact {
    fn describe(&self, name: &str) -> Artifact {
        Artifact {
            name: name.to_string(),
            size_bytes: self.data.len() as u64,
            created_at: Some(self.created_at),
            updated_at: self.created_at,
        }
    }
}

/// In-memory artifact store for tests and embedding.
///
/// Listing is in name order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArtifactStore {
    state: Arc<RwLock<MemoryState>>,
}

/// Buffered upload for [`InMemoryArtifactStore`]. Releases its name on drop.
#[derive(Debug)]
pub struct MemoryStaging {
    name: String,
    buffer: Vec<u8>,
    state: Arc<RwLock<MemoryState>>,
    armed: bool,
}

impl MemoryStaging {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn written(&self) -> u64 {
        self.buffer.len() as u64
    }
}

impl Drop for MemoryStaging {
    fn drop(&mut self) {
        if self.armed {
            write_state(&self.state).staging.remove(&self.name);
        }
    }
}

fn write_state(state: &RwLock<MemoryState>) -> RwLockWriteGuard<'_, MemoryState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed artifacts.
    pub fn len(&self) -> usize {
        self.read().completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of uploads currently staged.
    pub fn staging_len(&self) -> usize {
        self.read().staging.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    type Staging = MemoryStaging;
    type Reader = Cursor<Vec<u8>>;

    async fn exists(&self, name: &str) -> StoreResult<bool> {
        validate_artifact_name(name)?;
        Ok(self.read().completed.contains_key(name))
    }

    async fn begin_staging(&self, name: &str) -> StoreResult<MemoryStaging> {
        validate_artifact_name(name)?;
        let mut state = write_state(&self.state);
        if state.completed.contains_key(name) || !state.staging.insert(name.to_string()) {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        Ok(MemoryStaging {
            name: name.to_string(),
            buffer: Vec::new(),
            state: Arc::clone(&self.state),
            armed: true,
        })
    }

    async fn write_chunk(&self, staging: &mut MemoryStaging, bytes: &[u8]) -> StoreResult<()> {
        staging.buffer.extend_from_slice(bytes);
        Ok(())
    }

    async fn commit(&self, mut staging: MemoryStaging) -> StoreResult<Artifact> {
        staging.armed = false;
        let mut state = write_state(&self.state);
        state.staging.remove(&staging.name);
        if state.completed.contains_key(&staging.name) {
            return Err(StoreError::AlreadyExists(staging.name.clone()));
        }
        let stored = StoredArtifact {
            data: std::mem::take(&mut staging.buffer),
            created_at: Utc::now(),
        };
        let artifact = stored.describe(&staging.name);
        state.completed.insert(staging.name.clone(), stored);
        Ok(artifact)
    }

    async fn abort(&self, mut staging: MemoryStaging) -> StoreResult<()> {
        staging.armed = false;
        write_state(&self.state).staging.remove(&staging.name);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Artifact>> {
        Ok(self
            .read()
            .completed
            .iter()
            .map(|(name, stored)| stored.describe(name))
            .collect())
    }

    async fn search(&self, name: &str) -> StoreResult<Cursor<Vec<u8>>> {
        validate_artifact_name(name)?;
        self.read()
            .completed
            .get(name)
            .map(|stored| Cursor::new(stored.data.clone()))
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn commit_then_search() {
        let store = InMemoryArtifactStore::new();
        let mut staging = store.begin_staging("a.png").await.unwrap();
        store.write_chunk(&mut staging, b"abc").await.unwrap();
        store.write_chunk(&mut staging, b"def").await.unwrap();
        assert_eq!(staging.written(), 6);
        let artifact = store.commit(staging).await.unwrap();
        assert_eq!(artifact.size_bytes, 6);

        let mut out = Vec::new();
        store
            .search("a.png")
            .await
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"abcdef");
        assert_eq!(store.len(), 1);
        assert_eq!(store.staging_len(), 0);
    }

    #[tokio::test]
    async fn staged_names_are_reserved_and_hidden() {
        let store = InMemoryArtifactStore::new();
        let staging = store.begin_staging("a.png").await.unwrap();
        assert!(matches!(
            store.begin_staging("a.png").await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(!store.exists("a.png").await.unwrap());
        assert!(store.list().await.unwrap().is_empty());
        store.abort(staging).await.unwrap();
        assert!(store.begin_staging("a.png").await.is_ok());
    }

    #[tokio::test]
    async fn drop_releases_name() {
        let store = InMemoryArtifactStore::new();
        let staging = store.begin_staging("a.png").await.unwrap();
        assert_eq!(store.staging_len(), 1);
        drop(staging);
        assert_eq!(store.staging_len(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_is_name_ordered() {
        let store = InMemoryArtifactStore::new();
        for name in ["c.png", "a.png", "b.png"] {
            let staging = store.begin_staging(name).await.unwrap();
            store.commit(staging).await.unwrap();
        }
        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
    }

    #[tokio::test]
    async fn committed_names_are_final() {
        let store = InMemoryArtifactStore::new();
        let staging = store.begin_staging("a.png").await.unwrap();
        store.commit(staging).await.unwrap();
        assert!(matches!(
            store.begin_staging("a.png").await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            store.search("b.png").await,
            Err(StoreError::NotFound(_))
        ));
    }
}

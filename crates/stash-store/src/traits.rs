use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::artifact::Artifact;
use crate::error::StoreResult;

/// Two-phase artifact store.
///
/// All implementations must satisfy these invariants:
/// - A name is visible to `exists`, `list` and `search` if and only if its
///   commit has completed. Staging entries are never observable.
/// - At most one committed artifact exists per name; committed artifacts are
///   never overwritten.
/// - `begin_staging` is the only critical section: of any number of
///   concurrent attempts on one name, at most one succeeds.
/// - A staging handle that is dropped without `commit` or `abort` discards
///   its staged bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Handle to one in-progress upload.
    type Staging: Send + 'static;

    /// Streamed reader over a committed artifact.
    type Reader: AsyncRead + Send + Unpin + 'static;

    /// Whether a committed artifact with this name exists.
    async fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Reserve `name` and open a staging entry for it.
    ///
    /// Fails with `AlreadyExists` if the name is committed or already staged.
    async fn begin_staging(&self, name: &str) -> StoreResult<Self::Staging>;

    /// Append bytes to a staging entry.
    async fn write_chunk(&self, staging: &mut Self::Staging, bytes: &[u8]) -> StoreResult<()>;

    /// Atomically promote a staging entry to a committed artifact.
    ///
    /// On error the staging entry is discarded and nothing is committed.
    async fn commit(&self, staging: Self::Staging) -> StoreResult<Artifact>;

    /// Discard a staging entry. An entry that is already gone is not an error.
    async fn abort(&self, staging: Self::Staging) -> StoreResult<()>;

    /// Enumerate committed artifacts. Order is backend-defined.
    async fn list(&self) -> StoreResult<Vec<Artifact>>;

    /// Open a committed artifact for reading. Fails with `NotFound`.
    async fn search(&self, name: &str) -> StoreResult<Self::Reader>;
}

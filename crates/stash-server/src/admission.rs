use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Caps concurrent long-running operations with two independent pools:
/// one shared by uploads and downloads, one for listings.
#[derive(Debug)]
pub struct AdmissionController {
    transfers: Pool,
    lists: Pool,
}

#[derive(Debug)]
struct Pool {
    kind: &'static str,
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Pool {
    fn new(kind: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            kind,
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    async fn acquire(&self) -> ServerResult<AdmissionSlot> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Internal(format!("{} pool closed", self.kind)))?;
        debug!(
            pool = self.kind,
            in_use = self.in_use(),
            capacity = self.capacity,
            "admission slot acquired"
        );
        Ok(AdmissionSlot {
            pool: self.kind,
            _permit: permit,
        })
    }

    fn in_use(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

/// Capacity token held for the lifetime of one operation. Released on drop.
#[derive(Debug)]
pub struct AdmissionSlot {
    pool: &'static str,
    _permit: OwnedSemaphorePermit,
}

impl AdmissionSlot {
    pub fn pool(&self) -> &'static str {
        self.pool
    }
}

impl Drop for AdmissionSlot {
    fn drop(&mut self) {
        debug!(pool = self.pool, "admission slot released");
    }
}

impl AdmissionController {
    /// Capacities below one are raised to one.
    pub fn new(max_transfers: usize, max_lists: usize) -> Self {
        Self {
            transfers: Pool::new("transfer", max_transfers),
            lists: Pool::new("list", max_lists),
        }
    }

    /// Wait for an upload/download slot.
    pub async fn acquire_transfer(&self) -> ServerResult<AdmissionSlot> {
        self.transfers.acquire().await
    }

    /// Wait for a listing slot.
    pub async fn acquire_list(&self) -> ServerResult<AdmissionSlot> {
        self.lists.acquire().await
    }

    pub fn transfers_in_use(&self) -> usize {
        self.transfers.in_use()
    }

    pub fn lists_in_use(&self) -> usize {
        self.lists.in_use()
    }

    pub fn transfer_capacity(&self) -> usize {
        self.transfers.capacity
    }

    pub fn list_capacity(&self) -> usize {
        self.lists.capacity
    }
}

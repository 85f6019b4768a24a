use std::future::Future;

use stash_gate::UploadGate;
use stash_store::{ArtifactStore, FsArtifactStore};
use tokio::net::TcpListener;
use tracing::info;

use crate::admission::AdmissionController;
use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::transfer::TransferService;

/// Stash artifact server.
pub struct StashServer<S: ArtifactStore> {
    config: ServerConfig,
    transfers: TransferService<S>,
}

impl StashServer<FsArtifactStore> {
    /// Open the filesystem store named in `config`.
    pub async fn open(config: ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        let store = FsArtifactStore::open(&config.storage).await?;
        Self::with_store(config, store)
    }
}

impl<S: ArtifactStore> StashServer<S> {
    pub fn with_store(config: ServerConfig, store: S) -> ServerResult<Self> {
        config.validate()?;
        let gate = UploadGate::with_default_stages(config.gate_config());
        let admission = AdmissionController::new(
            config.limits.max_concurrent_transfers,
            config.limits.max_concurrent_lists,
        );
        Ok(Self {
            transfers: TransferService::new(store, gate, admission),
            config,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn transfers(&self) -> &TransferService<S> {
        &self.transfers
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.transfers.clone())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener. In-flight requests finish before
    /// this returns.
    pub async fn serve_listener<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            max_transfers = self.config.limits.max_concurrent_transfers,
            max_lists = self.config.limits.max_concurrent_lists,
            "stash server listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("stash server stopped");
        Ok(())
    }
}

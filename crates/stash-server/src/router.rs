use axum::routing::{get, post};
use axum::Router;
use stash_protocol::endpoints;
use stash_store::ArtifactStore;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};
use crate::transfer::TransferService;

/// Build the axum router with all stash endpoints.
pub fn build_router<S: ArtifactStore>(transfers: TransferService<S>) -> Router {
    Router::new()
        .route(endpoints::UPLOAD, post(handler::upload_handler::<S>))
        .route(endpoints::DOWNLOAD, post(handler::download_handler::<S>))
        .route(endpoints::LIST, post(handler::list_handler::<S>))
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::INFO, get(handler::info_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { transfers })
}

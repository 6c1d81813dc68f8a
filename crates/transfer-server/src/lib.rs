//! HTTP service for storage transfers.
//!
//! Routes requests into the `TransferPipeline` with the caller's session
//! credentials and maps pipeline errors onto status codes.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use transfer_core::{CredentialAccessor, TransferPipeline};

pub mod config;
pub mod d1;
pub mod error;
pub mod handlers;
pub mod session;

use handlers::{
    create_folder_handler, get_transfer_handler, health_handler, transfer_from_handler,
    transfer_to_handler, update_transfer_handler,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<TransferPipeline>,
    pub credentials: Arc<dyn CredentialAccessor>,
    /// Key a remote runner must present when reporting task status. Without
    /// one, task status is read-only over HTTP.
    pub runner_key: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let transfers = get(get_transfer_handler);
    let transfers = if state.runner_key.is_some() {
        transfers.put(update_transfer_handler)
    } else {
        transfers
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/storage/createFolder", post(create_folder_handler))
        .route("/api/storage/transferTo", post(transfer_to_handler))
        .route("/api/storage/transferFrom", post(transfer_from_handler))
        .route("/api/storage/transfers/{task_id}", transfers)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

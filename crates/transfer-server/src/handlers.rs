//! HTTP handlers.
//!
//! Implements:
//! - POST /api/storage/createFolder - Find or create a Drive folder
//! - POST /api/storage/transferTo - Export a version to Drive
//! - POST /api/storage/transferFrom - Import a Drive file
//! - GET /api/storage/transfers/{task_id} - Task status
//! - PUT /api/storage/transfers/{task_id} - Runner status report (runner key only)
//! - GET /health - Health check endpoint

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;
use transfer_core::{TaskStatus, TransferError, TransferTask};

use crate::error::{ApiError, Result};
use crate::session::Session;
use crate::AppState;

pub const RUNNER_KEY_HEADER: &str = "x-api-key";

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub tasks: usize,
}

/// GET /health - Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        tasks: state.pipeline.dispatcher().tasks().len(),
    })
}

// Bodies are parsed only after the session check, so an unauthenticated
// caller gets 401 whatever it sent. Missing fields become empty strings and
// surface as `InvalidArgument` from the pipeline.

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub parent_folder: String,
    pub folder_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderResponse {
    pub folder_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferToRequest {
    pub autodesk_item: String,
    pub storage_folder: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransferFromRequest {
    pub autodesk_folder: String,
    pub storage_item: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub task_id: String,
    pub status: TaskStatus,
}

impl From<TransferTask> for TransferResponse {
    fn from(task: TransferTask) -> Self {
        Self {
            task_id: task.task_id,
            status: task.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub error: Option<String>,
}

/// Empty bodies read as `{}`; anything else must be a JSON object.
fn parse_body<T>(body: &[u8]) -> std::result::Result<T, TransferError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| TransferError::InvalidArgument(format!("request body: {}", e)))
}

/// POST /api/storage/createFolder
pub async fn create_folder_handler(
    State(state): State<AppState>,
    Session(session): Session,
    body: Bytes,
) -> Result<Json<CreateFolderResponse>> {
    session.external()?;
    let req: CreateFolderRequest = parse_body(&body)?;

    let folder = state
        .pipeline
        .create_folder(&session, &req.parent_folder, &req.folder_name)
        .await?;

    Ok(Json(CreateFolderResponse {
        folder_id: folder.to_string(),
    }))
}

/// POST /api/storage/transferTo
pub async fn transfer_to_handler(
    State(state): State<AppState>,
    Session(session): Session,
    body: Bytes,
) -> Result<Json<TransferResponse>> {
    session.require_both()?;
    let req: TransferToRequest = parse_body(&body)?;

    let task = state
        .pipeline
        .transfer_to(&session, &req.autodesk_item, &req.storage_folder)
        .await?;
    Ok(Json(task.into()))
}

/// POST /api/storage/transferFrom
pub async fn transfer_from_handler(
    State(state): State<AppState>,
    Session(session): Session,
    body: Bytes,
) -> Result<Json<TransferResponse>> {
    session.require_both()?;
    let req: TransferFromRequest = parse_body(&body)?;

    let task = state
        .pipeline
        .transfer_from(&session, &req.autodesk_folder, &req.storage_item)
        .await?;
    Ok(Json(task.into()))
}

/// GET /api/storage/transfers/{task_id}
pub async fn get_transfer_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<TransferTask>> {
    state
        .pipeline
        .dispatcher()
        .tasks()
        .get(&task_id)
        .map(Json)
        .ok_or_else(|| TransferError::NotFound(format!("task {}", task_id)).into())
}

/// PUT /api/storage/transfers/{task_id}
///
/// Progress reports from a remote job runner, authenticated by the runner
/// key in `x-api-key`. Only routed when a runner key is configured.
pub async fn update_transfer_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<TransferTask>> {
    let expected = state
        .runner_key
        .as_deref()
        .ok_or(ApiError::InvalidRunnerKey)?;
    let provided = headers.get(RUNNER_KEY_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        return Err(ApiError::InvalidRunnerKey);
    }

    let task = state
        .pipeline
        .dispatcher()
        .tasks()
        .update_status(&task_id, req.status, req.error)?;

    info!("Runner reported task {} as {:?}", task_id, task.status);
    Ok(Json(task))
}

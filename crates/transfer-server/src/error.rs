//! Error types for the HTTP service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use transfer_core::TransferError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Invalid or missing runner key")]
    InvalidRunnerKey,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::InvalidRunnerKey => (StatusCode::UNAUTHORIZED, "INVALID_RUNNER_KEY"),
            ApiError::Transfer(e) => match e {
                TransferError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
                TransferError::InvalidArgument(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_ARGUMENT")
                }
                TransferError::Provider(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR"),
                TransferError::NotAFolder(_) => (StatusCode::BAD_REQUEST, "NOT_A_FOLDER"),
                TransferError::NotAVersion(_) => (StatusCode::BAD_REQUEST, "NOT_A_VERSION"),
                TransferError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                TransferError::DestinationProvisioning(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DESTINATION_PROVISIONING_ERROR",
                ),
                TransferError::Dispatch(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DISPATCH_ERROR"),
                TransferError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            error: String,
            code: &'static str,
        }

        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            code,
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

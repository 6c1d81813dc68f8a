//! Per-request session credentials.
//!
//! The session id comes from the `x-session-id` header, falling back to the
//! `session` cookie. Requests without one get empty credentials, so the
//! pipeline rejects them as unauthenticated.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use tracing::debug;
use transfer_core::SessionCredentials;

use crate::error::ApiError;
use crate::AppState;

pub const SESSION_HEADER: &str = "x-session-id";
pub const SESSION_COOKIE: &str = "session";

/// Credentials loaded for the current request's session.
#[derive(Debug, Clone)]
pub struct Session(pub SessionCredentials);

impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(session_id) = session_id(&parts.headers) else {
            debug!("Request carries no session");
            return Ok(Session(SessionCredentials::default()));
        };

        let credentials = state.credentials.session_credentials(&session_id).await?;
        Ok(Session(credentials))
    }
}

pub fn session_id(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(id) = from_header {
        return Some(id.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

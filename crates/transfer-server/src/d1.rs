//! Session credentials read from Cloudflare D1 via its REST API.
//!
//! Table `transfer_session_token(sessionId, provider, accessToken, tokenExpiresAt)`,
//! one row per session and provider (`forge` or `gdrive`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};
use transfer_core::{AccessToken, CredentialAccessor, SessionCredentials, TransferError};

const DEFAULT_API_URL: &str = "https://api.cloudflare.com/client/v4";

pub const INTERNAL_PROVIDER: &str = "forge";
pub const EXTERNAL_PROVIDER: &str = "gdrive";

#[derive(Debug, Clone, Deserialize)]
struct SessionTokenRow {
    provider: String,
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "tokenExpiresAt")]
    token_expires_at: Option<String>,
}

impl SessionTokenRow {
    fn into_token(self) -> AccessToken {
        let token = AccessToken::new(self.access_token);
        match self
            .token_expires_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        {
            Some(exp) => token.with_expiry(exp.with_timezone(&Utc)),
            None => token,
        }
    }
}

#[derive(Serialize)]
struct D1QueryRequest {
    sql: String,
    params: Vec<String>,
}

#[derive(Deserialize)]
struct D1Response {
    success: bool,
    result: Option<Vec<D1QueryResult>>,
    errors: Option<Vec<D1Error>>,
}

#[derive(Deserialize)]
struct D1QueryResult {
    results: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct D1Error {
    message: String,
}

pub struct D1CredentialStore {
    http: Client,
    api_url: String,
    account_id: String,
    api_token: String,
    database_id: String,
}

impl D1CredentialStore {
    pub fn new(account_id: String, api_token: String, database_id: String) -> Self {
        Self::with_api_url(DEFAULT_API_URL, account_id, api_token, database_id)
    }

    pub fn with_api_url(
        api_url: &str,
        account_id: String,
        api_token: String,
        database_id: String,
    ) -> Self {
        Self {
            http: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            account_id,
            api_token,
            database_id,
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/accounts/{}/d1/database/{}/query",
            self.api_url, self.account_id, self.database_id
        )
    }

    async fn execute_query(
        &self,
        sql: &str,
        params: Vec<String>,
    ) -> anyhow::Result<Vec<serde_json::Value>> {
        let query = D1QueryRequest {
            sql: sql.to_string(),
            params,
        };

        let response = self
            .http
            .post(self.query_url())
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("D1 API returned {}: {}", status, body);
        }

        let d1_response: D1Response = serde_json::from_str(&body)?;

        if !d1_response.success {
            let error_msg = d1_response
                .errors
                .map(|errs| {
                    errs.into_iter()
                        .map(|e| e.message)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_else(|| "Unknown D1 error".to_string());
            anyhow::bail!("D1 query failed: {}", error_msg);
        }

        Ok(d1_response
            .result
            .and_then(|mut r| r.pop())
            .map(|qr| qr.results)
            .unwrap_or_default())
    }

    async fn load_rows(&self, session_id: &str) -> anyhow::Result<Vec<SessionTokenRow>> {
        let results = self
            .execute_query(
                "SELECT provider, accessToken, tokenExpiresAt \
                 FROM transfer_session_token WHERE sessionId = ?1",
                vec![session_id.to_string()],
            )
            .await?;

        let mut rows = Vec::new();
        for row in results {
            match serde_json::from_value(row) {
                Ok(row) => rows.push(row),
                Err(e) => warn!("Failed to parse session token row: {}", e),
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl CredentialAccessor for D1CredentialStore {
    #[instrument(skip(self, session_id), level = "debug")]
    async fn session_credentials(
        &self,
        session_id: &str,
    ) -> Result<SessionCredentials, TransferError> {
        let rows = self
            .load_rows(session_id)
            .await
            .map_err(|e| TransferError::provider("loading session credentials", e))?;

        let mut credentials = SessionCredentials::default();
        for row in rows {
            match row.provider.as_str() {
                INTERNAL_PROVIDER => credentials.internal = Some(row.into_token()),
                EXTERNAL_PROVIDER => credentials.external = Some(row.into_token()),
                other => warn!("Ignoring token for unknown provider {}", other),
            }
        }
        Ok(credentials)
    }
}

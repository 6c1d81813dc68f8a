use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransferError;

/// Bearer token scoped to one provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Tokens without expiration info are assumed valid; refresh happens elsewhere.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() >= exp,
            None => false,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Tokens available to one session. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCredentials {
    pub internal: Option<AccessToken>,
    pub external: Option<AccessToken>,
}

impl SessionCredentials {
    pub fn internal(&self) -> Result<&AccessToken, TransferError> {
        valid(self.internal.as_ref(), "internal store")
    }

    pub fn external(&self) -> Result<&AccessToken, TransferError> {
        valid(self.external.as_ref(), "external store")
    }

    /// Both tokens, or `Unauthenticated`. A transfer is never dispatched without this.
    pub fn require_both(&self) -> Result<TransferCredentials, TransferError> {
        Ok(TransferCredentials {
            external: self.external()?.clone(),
            internal: self.internal()?.clone(),
        })
    }
}

fn valid<'a>(
    token: Option<&'a AccessToken>,
    which: &'static str,
) -> Result<&'a AccessToken, TransferError> {
    match token {
        Some(t) if !t.is_expired() => Ok(t),
        _ => Err(TransferError::Unauthenticated(which)),
    }
}

/// Both tokens of a session, validated. Travels with the job to the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCredentials {
    pub internal: AccessToken,
    pub external: AccessToken,
}

/// Looks up the tokens stored for a session.
#[async_trait]
pub trait CredentialAccessor: Send + Sync {
    /// Returns empty credentials for unknown sessions.
    async fn session_credentials(&self, session_id: &str)
        -> Result<SessionCredentials, TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_expiry() {
        assert!(!AccessToken::new("a").is_expired());
        assert!(!AccessToken::new("a")
            .with_expiry(Utc::now() + Duration::minutes(10))
            .is_expired());
        assert!(AccessToken::new("a")
            .with_expiry(Utc::now() - Duration::seconds(1))
            .is_expired());
    }

    #[test]
    fn test_require_both() {
        let creds = SessionCredentials {
            internal: Some(AccessToken::new("forge")),
            external: None,
        };
        assert_eq!(
            creds.require_both(),
            Err(TransferError::Unauthenticated("external store"))
        );

        let creds = SessionCredentials {
            internal: Some(
                AccessToken::new("forge").with_expiry(Utc::now() - Duration::minutes(1)),
            ),
            external: Some(AccessToken::new("gdrive")),
        };
        assert_eq!(
            creds.require_both(),
            Err(TransferError::Unauthenticated("internal store"))
        );

        let creds = SessionCredentials {
            internal: Some(AccessToken::new("forge")),
            external: Some(AccessToken::new("gdrive")),
        };
        let both = creds.require_both().unwrap();
        assert_eq!(both.internal.access_token, "forge");
        assert_eq!(both.external.access_token, "gdrive");
    }

    #[test]
    fn test_debug_redacts_token() {
        let dbg = format!("{:?}", AccessToken::new("secret-value"));
        assert!(!dbg.contains("secret-value"));
    }
}

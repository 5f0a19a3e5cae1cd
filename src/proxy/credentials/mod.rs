//! Bearer token acquisition for the downstream API.
//!
//! The handler depends only on [`CredentialProvider`]. The production
//! implementation is [`ApplicationDefaultCredentials`], which resolves the
//! ambient Google credentials and refreshes them on every call.

pub mod adc;
pub mod error;
pub mod key_file;
pub mod metadata;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

pub use adc::{AdcSettings, ApplicationDefaultCredentials};
pub use error::CredentialError;

/// OAuth scope requested for Vertex AI calls
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Timeout for token endpoint and metadata server calls
pub const CREDENTIAL_TIMEOUT_SECS: u64 = 15;

/// Supplies a fresh bearer token per call.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Short-lived bearer credential
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_in_secs: i64) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in_secs),
        }
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint / metadata server response
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

impl From<TokenResponse> for AccessToken {
    fn from(resp: TokenResponse) -> Self {
        let mut token = AccessToken::new(resp.access_token, resp.expires_in);
        if let Some(token_type) = resp.token_type.filter(|t| !t.is_empty()) {
            token.token_type = token_type;
        }
        token
    }
}

/// Read a token endpoint reply, mapping non-2xx and bad JSON to errors
pub(crate) async fn read_token_response(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<AccessToken, CredentialError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Rejected {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
    Ok(token.into())
}

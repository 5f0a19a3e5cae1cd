// Credential key files: service account keys and gcloud user credentials

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{read_token_response, AccessToken, CredentialError, CLOUD_PLATFORM_SCOPE};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// JWT assertion lifetime for the service account grant
const JWT_LIFETIME_SECONDS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl KeyFile {
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        serde_json::from_str(&content).map_err(|e| CredentialError::InvalidFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub async fn fetch_token(&self, client: &Client) -> Result<AccessToken, CredentialError> {
        match self {
            Self::ServiceAccount(key) => key.fetch_token(client).await,
            Self::AuthorizedUser(key) => key.fetch_token(client).await,
        }
    }
}

impl ServiceAccountKey {
    fn create_jwt(&self) -> Result<String, CredentialError> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            exp: i64,
            iat: i64,
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.token_uri,
            exp: now + JWT_LIFETIME_SECONDS,
            iat: now,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }

    async fn fetch_token(&self, client: &Client) -> Result<AccessToken, CredentialError> {
        let assertion = self.create_jwt()?;
        let params = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

        tracing::debug!("Exchanging JWT assertion for {}", self.client_email);

        let response = client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Request {
                endpoint: self.token_uri.clone(),
                message: e.to_string(),
            })?;

        read_token_response(&self.token_uri, response).await
    }
}

impl AuthorizedUserKey {
    async fn fetch_token(&self, client: &Client) -> Result<AccessToken, CredentialError> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", self.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        tracing::debug!("Refreshing user credentials for client {}", self.client_id);

        let response = client
            .post(&self.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| CredentialError::Request {
                endpoint: self.token_uri.clone(),
                message: e.to_string(),
            })?;

        read_token_response(&self.token_uri, response).await
    }
}

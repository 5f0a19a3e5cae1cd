// Application Default Credentials
//
// Resolution order:
// 1. GOOGLE_APPLICATION_CREDENTIALS key file
// 2. gcloud well-known file (application_default_credentials.json)
// 3. Compute metadata server

use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use std::time::Duration;

use super::key_file::KeyFile;
use super::metadata::{self, DEFAULT_METADATA_HOST};
use super::{AccessToken, CredentialError, CredentialProvider, CREDENTIAL_TIMEOUT_SECS};
use crate::proxy::config::UpstreamProxyConfig;

const WELL_KNOWN_FILE: &str = "application_default_credentials.json";

/// Where to look for ambient credentials
#[derive(Debug, Clone)]
pub struct AdcSettings {
    /// Explicit key file; a missing file is an error rather than a fallthrough
    pub credentials_file: Option<PathBuf>,
    pub well_known_file: Option<PathBuf>,
    pub metadata_host: String,
}

impl AdcSettings {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Self {
            credentials_file: non_empty("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            well_known_file: well_known_file_path(),
            metadata_host: non_empty("GCE_METADATA_HOST")
                .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string()),
        }
    }
}

impl Default for AdcSettings {
    fn default() -> Self {
        Self {
            credentials_file: None,
            well_known_file: None,
            metadata_host: DEFAULT_METADATA_HOST.to_string(),
        }
    }
}

/// gcloud keeps ADC under `$CLOUDSDK_CONFIG` or `~/.config/gcloud`
/// (`%APPDATA%\gcloud` on Windows)
fn well_known_file_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("CLOUDSDK_CONFIG") {
        if !dir.trim().is_empty() {
            return Some(PathBuf::from(dir).join(WELL_KNOWN_FILE));
        }
    }

    let base = if cfg!(windows) {
        dirs::config_dir()
    } else {
        dirs::home_dir().map(|home| home.join(".config"))
    };
    base.map(|dir| dir.join("gcloud").join(WELL_KNOWN_FILE))
}

#[derive(Debug)]
enum CredentialSource {
    KeyFile(PathBuf, KeyFile),
    MetadataServer,
}

/// Ambient Google credentials, discovered and refreshed on every call
pub struct ApplicationDefaultCredentials {
    settings: AdcSettings,
    http_client: Client,
    metadata_client: Client,
}

impl ApplicationDefaultCredentials {
    pub fn new(settings: AdcSettings, upstream_proxy: Option<&UpstreamProxyConfig>) -> Self {
        let timeout = Duration::from_secs(CREDENTIAL_TIMEOUT_SECS);
        let http_client = crate::utils::http::create_client_with_proxy(timeout, upstream_proxy);
        // The metadata server is link-local; never route it through a proxy
        let metadata_client = Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            settings,
            http_client,
            metadata_client,
        }
    }

    pub fn from_env(upstream_proxy: Option<&UpstreamProxyConfig>) -> Self {
        Self::new(AdcSettings::from_env(), upstream_proxy)
    }

    async fn discover(&self) -> Result<CredentialSource, CredentialError> {
        if let Some(path) = &self.settings.credentials_file {
            let key = KeyFile::load(path).await?;
            return Ok(CredentialSource::KeyFile(path.clone(), key));
        }

        if let Some(path) = &self.settings.well_known_file {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                let key = KeyFile::load(path).await?;
                return Ok(CredentialSource::KeyFile(path.clone(), key));
            }
        }

        Ok(CredentialSource::MetadataServer)
    }
}

#[async_trait]
impl CredentialProvider for ApplicationDefaultCredentials {
    async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
        match self.discover().await? {
            CredentialSource::KeyFile(path, key) => {
                tracing::debug!("Using credentials file {:?}", path);
                key.fetch_token(&self.http_client).await
            }
            CredentialSource::MetadataServer => {
                tracing::debug!("Using metadata server {}", self.settings.metadata_host);
                metadata::fetch_token(&self.metadata_client, &self.settings.metadata_host).await
            }
        }
    }
}

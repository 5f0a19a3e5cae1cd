// Compute metadata server token source (GCE, Cloud Run, Cloud Functions)

use reqwest::Client;

use super::{read_token_response, AccessToken, CredentialError};

pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

pub fn token_url(host: &str) -> String {
    format!("http://{}{}", host, TOKEN_PATH)
}

/// Fetch the default service account token from the metadata server.
///
/// A connection failure means there are no ambient credentials at all.
pub async fn fetch_token(client: &Client, host: &str) -> Result<AccessToken, CredentialError> {
    let url = token_url(host);

    let response = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| CredentialError::NotFound(e.to_string()))?;

    read_token_response(&url, response).await
}

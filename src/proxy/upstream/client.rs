// Upstream client for the Vertex AI generateContent endpoint

use reqwest::{header, Client, StatusCode};
use std::time::Duration;

use crate::error::ProxyError;
use crate::proxy::config::ProxyConfig;
use crate::proxy::mappers::vertex::GenerateContentRequest;

/// Fixed budget for one downstream call, connect to last byte
pub const UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Status and raw body text of a downstream reply
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    pub body: String,
}

pub struct UpstreamClient {
    http_client: Client,
    api_base: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Self {
        Self::with_timeout(config, Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
    }

    pub fn with_timeout(config: &ProxyConfig, timeout: Duration) -> Self {
        let http_client =
            crate::utils::http::create_client_with_proxy(timeout, Some(&config.upstream_proxy));

        Self {
            http_client,
            api_base: config.api_endpoint.clone(),
        }
    }

    /// Build the generateContent URL for a publisher model
    pub fn build_url(&self, location: &str, project_id: &str, model: &str) -> String {
        let base = match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", location),
        };
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            base, project_id, location, model
        )
    }

    /// POST the request and read the whole reply.
    ///
    /// Only transport failures are errors here; every HTTP status is
    /// returned to the caller.
    pub async fn generate_content(
        &self,
        url: &str,
        access_token: &str,
        body: &GenerateContentRequest,
    ) -> Result<UpstreamReply, ProxyError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| ProxyError::Dispatch(format!("invalid access token: {}", e)))?,
        );

        let response = self
            .http_client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| ProxyError::Dispatch(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProxyError::Dispatch(format!("failed to read response body: {}", e)))?;

        Ok(UpstreamReply { status, body })
    }
}

// Text generation handler
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use crate::error::ProxyError;
use crate::proxy::config::ProxyConfig;
use crate::proxy::credentials::CredentialProvider;
use crate::proxy::mappers::vertex::{build_generate_request, extract_text, TextRequest};
use crate::proxy::middleware::{base_headers, preflight_headers};
use crate::proxy::server::AppState;
use crate::proxy::upstream::client::UpstreamClient;

/// Status, JSON body and headers returned to the caller.
/// `body` is `None` only for preflight responses.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl ProxyResponse {
    pub fn preflight() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: None,
            headers: preflight_headers(),
        }
    }

    pub fn json(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            headers: base_headers(),
        }
    }
}

impl From<ProxyError> for ProxyResponse {
    fn from(err: ProxyError) -> Self {
        Self::json(err.status(), err.body())
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Translates simplified text requests into Vertex AI `generateContent` calls
pub struct TextProxy {
    config: Arc<ProxyConfig>,
    credentials: Arc<dyn CredentialProvider>,
    upstream: UpstreamClient,
}

impl TextProxy {
    pub fn new(config: Arc<ProxyConfig>, credentials: Arc<dyn CredentialProvider>) -> Self {
        let upstream = UpstreamClient::new(&config);
        Self::with_upstream(config, credentials, upstream)
    }

    pub fn with_upstream(
        config: Arc<ProxyConfig>,
        credentials: Arc<dyn CredentialProvider>,
        upstream: UpstreamClient,
    ) -> Self {
        Self {
            config,
            credentials,
            upstream,
        }
    }

    /// Handle one inbound request. Never fails: every outcome is a response.
    pub async fn handle(&self, method: &Method, body: &[u8]) -> ProxyResponse {
        if *method == Method::OPTIONS {
            return ProxyResponse::preflight();
        }

        let span = tracing::info_span!("text_request", request_id = %uuid::Uuid::new_v4());

        async move {
            match AssertUnwindSafe(self.process(body)).catch_unwind().await {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    log_failure(&err);
                    err.into()
                }
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!("Unhandled error: {}", message);
                    ProxyError::Unhandled(message).into()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, body: &[u8]) -> Result<ProxyResponse, ProxyError> {
        info!("Request received");

        let payload = parse_payload(body)?;
        info!(
            "Request payload: {}",
            serde_json::to_string(&payload).unwrap_or_default()
        );

        let request = TextRequest::from_payload(&payload)?;

        info!(
            "PROJECT_ID: {}, LOCATION: {}",
            self.config.project_id, self.config.location
        );
        info!("Using model: {}", request.model);

        let url =
            self.upstream
                .build_url(&self.config.location, &self.config.project_id, &request.model);
        info!("API URL: {}", url);

        let token = self
            .credentials
            .fetch_token()
            .await
            .map_err(|e| ProxyError::Credential(e.to_string()))?;
        info!(
            "Access token acquired ({} token, expires at {})",
            token.token_type,
            token.expires_at.to_rfc3339()
        );

        let downstream = build_generate_request(&request);
        info!(
            "Gemini API request: {}",
            serde_json::to_string(&downstream).unwrap_or_default()
        );

        let reply = self
            .upstream
            .generate_content(&url, &token.token, &downstream)
            .await?;
        info!("Gemini API response status: {}", reply.status);

        if reply.status != StatusCode::OK {
            return Err(ProxyError::DownstreamApi {
                status: reply.status,
                body: reply.body,
            });
        }

        let decoded = serde_json::from_str::<Value>(&reply.body);
        let parsed = match decoded {
            Ok(value) => value,
            Err(e) => {
                error!("JSON decode error: {}", e);
                return Err(ProxyError::DownstreamJsonInvalid { raw: reply.body });
            }
        };
        info!("Response JSON parsed");

        // Extraction problems keep the 200: the downstream call itself succeeded
        let body = match extract_text(&parsed) {
            Ok(text) => json!({ "response": parsed, "text": text }),
            Err(e) => {
                error!("Text extraction error: {}", e);
                json!({
                    "response": parsed,
                    "error": format!("text extraction error: {}", e),
                })
            }
        };

        Ok(ProxyResponse::json(StatusCode::OK, body))
    }
}

/// Absent, non-JSON and non-object bodies are all a missing payload
fn parse_payload(body: &[u8]) -> Result<Map<String, Value>, ProxyError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(payload)) => Ok(payload),
        _ => Err(ProxyError::MissingPayload),
    }
}

fn log_failure(err: &ProxyError) {
    match err {
        ProxyError::MissingPayload | ProxyError::MissingPrompt => warn!("Rejected request: {}", err),
        ProxyError::DownstreamApi { status, body } => {
            error!("API error: {}, {}", status.as_u16(), body)
        }
        ProxyError::DownstreamJsonInvalid { raw } => {
            error!("{}: {} bytes of raw response", err, raw.len())
        }
        _ => error!("{}", err),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected internal error".to_string()
    }
}

/// Axum entry point: any method, any path
pub async fn handle_text_request(
    State(state): State<AppState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match body {
        Ok(body) => state.text_proxy.handle(&method, &body).await.into_response(),
        Err(rejection) => {
            warn!("Failed to read request body: {}", rejection);
            ProxyResponse::from(ProxyError::MissingPayload).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::credentials::{AccessToken, CredentialError};
    use async_trait::async_trait;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-2.0-flash-001:generateContent";

    enum FakeCredentials {
        Token(&'static str),
        Failure(&'static str),
        Panic,
    }

    #[async_trait]
    impl CredentialProvider for FakeCredentials {
        async fn fetch_token(&self) -> Result<AccessToken, CredentialError> {
            match self {
                Self::Token(token) => Ok(AccessToken::new(*token, 3600)),
                Self::Failure(message) => Err(CredentialError::NotFound(message.to_string())),
                Self::Panic => panic!("credential store corrupted"),
            }
        }
    }

    fn config(api_endpoint: Option<String>) -> Arc<ProxyConfig> {
        Arc::new(ProxyConfig {
            project_id: "test-project".to_string(),
            api_endpoint,
            ..ProxyConfig::default()
        })
    }

    fn proxy_for(server: &MockServer, credentials: FakeCredentials) -> TextProxy {
        TextProxy::new(config(Some(server.uri())), Arc::new(credentials))
    }

    async fn post(proxy: &TextProxy, body: &str) -> ProxyResponse {
        proxy.handle(&Method::POST, body.as_bytes()).await
    }

    async fn mount_reply(server: &MockServer, template: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_preflight() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server, FakeCredentials::Token("t"));

        let resp = proxy.handle(&Method::OPTIONS, b"").await;

        assert_eq!(resp.status, StatusCode::NO_CONTENT);
        assert!(resp.body.is_none());
        assert_eq!(resp.headers["access-control-allow-origin"], "*");
        assert_eq!(resp.headers["access-control-allow-methods"], "POST");
        assert_eq!(resp.headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(resp.headers["access-control-max-age"], "3600");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_payload() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server, FakeCredentials::Token("t"));

        for body in ["", "not json", "[1, 2]", "\"prompt\"", "null"] {
            let resp = post(&proxy, body).await;
            assert_eq!(resp.status, StatusCode::BAD_REQUEST, "body: {:?}", body);
            assert_eq!(
                resp.body.unwrap(),
                json!({"error": "request payload is required"})
            );
            assert_eq!(resp.headers["access-control-allow-origin"], "*");
        }
    }

    #[tokio::test]
    async fn test_missing_prompt() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server, FakeCredentials::Token("t"));

        let resp = post(&proxy, "{}").await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(resp.body.unwrap(), json!({"error": "prompt is required"}));

        let resp = post(&proxy, r#"{"model": "gemini-pro"}"#).await;
        assert_eq!(resp.body.unwrap(), json!({"error": "prompt is required"}));
    }

    #[tokio::test]
    async fn test_success_with_defaults() {
        let server = MockServer::start().await;
        let downstream = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}, {"text": "c"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 1, "candidatesTokenCount": 3}
        });

        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("authorization", "Bearer ya29.fake"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {
                    "temperature": 0.7,
                    "maxOutputTokens": 1024,
                    "topP": 0.95,
                    "topK": 40
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(downstream.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("ya29.fake"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers["access-control-allow-origin"], "*");
        let body = resp.body.unwrap();
        assert_eq!(body["text"], "abc");
        assert_eq!(body["response"], downstream);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn test_system_instruction_and_model_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-1.5-pro-002:generateContent",
            ))
            .and(body_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "  hi  "}]}],
                "generationConfig": {
                    "temperature": 0.1,
                    "maxOutputTokens": 1024,
                    "topP": 0.95,
                    "topK": 40
                },
                "systemInstruction": {"parts": [{"text": "be terse"}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(
            &proxy,
            r#"{"prompt": "  hi  ", "model": "gemini-1.5-pro-002", "system_instruction": "be terse", "temperature": 0.1}"#,
        )
        .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.unwrap()["text"], "ok");
    }

    #[tokio::test]
    async fn test_no_candidates_yields_empty_text() {
        let server = MockServer::start().await;
        let downstream = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        mount_reply(
            &server,
            ResponseTemplate::new(200).set_body_json(downstream.clone()),
        )
        .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.body.unwrap(),
            json!({"response": downstream, "text": ""})
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_keeps_status_and_response() {
        let server = MockServer::start().await;
        let downstream = json!({"candidates": {"unexpected": true}});
        mount_reply(
            &server,
            ResponseTemplate::new(200).set_body_json(downstream.clone()),
        )
        .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::OK);
        let body = resp.body.unwrap();
        assert_eq!(body["response"], downstream);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("text extraction error: "));
        assert!(body.get("text").is_none());
    }

    #[tokio::test]
    async fn test_invalid_json_from_downstream() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            ResponseTemplate::new(200).set_body_string("<html>oops</html>"),
        )
        .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.body.unwrap(),
            json!({"error": "failed to parse response JSON", "raw_response": "<html>oops</html>"})
        );
    }

    #[tokio::test]
    async fn test_downstream_error_status_passed_through() {
        let server = MockServer::start().await;
        let raw = r#"{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}"#;
        mount_reply(&server, ResponseTemplate::new(429).set_body_string(raw)).await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers["access-control-allow-origin"], "*");
        assert_eq!(
            resp.body.unwrap(),
            json!({"error": "error from Gemini API", "status_code": 429, "response": raw})
        );
    }

    #[tokio::test]
    async fn test_credential_failure_skips_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, FakeCredentials::Failure("connection refused"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = resp.body.unwrap()["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("error during API request: "));
        assert!(error.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_downstream_timeout() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"candidates": []}))
                .set_delay(Duration::from_secs(2)),
        )
        .await;

        let config = config(Some(server.uri()));
        let upstream = UpstreamClient::with_timeout(&config, Duration::from_millis(200));
        let proxy =
            TextProxy::with_upstream(config, Arc::new(FakeCredentials::Token("t")), upstream);

        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp.body.unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("error during API request: "));
        assert!(body.get("response").is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server, FakeCredentials::Panic);

        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.body.unwrap(),
            json!({"error": "credential store corrupted"})
        );
        assert_eq!(resp.headers["access-control-allow-origin"], "*");
    }

    #[test]
    fn test_into_response_sets_headers() {
        let response = ProxyResponse::preflight().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-max-age"], "3600");

        let response =
            ProxyResponse::from(ProxyError::MissingPrompt).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_get_without_body_is_missing_payload() {
        let server = MockServer::start().await;
        let proxy = proxy_for(&server, FakeCredentials::Token("t"));

        let resp = proxy.handle(&Method::GET, b"").await;

        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.body.unwrap(),
            json!({"error": "request payload is required"})
        );
        assert_eq!(resp.headers["access-control-allow-origin"], "*");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_with_prompt_is_proxied() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "ok"}]}}]
            })),
        )
        .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = proxy.handle(&Method::GET, br#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.unwrap()["text"], "ok");
    }

    #[tokio::test]
    async fn test_null_tunables_fall_back_to_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(body_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {
                    "temperature": 0.7,
                    "maxOutputTokens": 1024,
                    "topP": 0.95,
                    "topK": 40
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(
            &proxy,
            r#"{"prompt": "hello", "model": null, "temperature": null, "system_instruction": null}"#,
        )
        .await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.body.unwrap()["text"], "");
    }

    #[tokio::test]
    async fn test_array_response_yields_empty_text() {
        let server = MockServer::start().await;
        mount_reply(
            &server,
            ResponseTemplate::new(200).set_body_json(json!([1, 2, 3])),
        )
        .await;

        let proxy = proxy_for(&server, FakeCredentials::Token("t"));
        let resp = post(&proxy, r#"{"prompt": "hello"}"#).await;

        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.body.unwrap(),
            json!({"response": [1, 2, 3], "text": ""})
        );
    }
}

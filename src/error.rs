use axum::http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

/// Start-up and server lifecycle errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to bind address {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

// Implement alias for Result to simplify usage
pub type AppResult<T> = Result<T, AppError>;

/// Failures of a single proxied request.
///
/// Each variant maps to exactly one status code and JSON body, see
/// [`ProxyError::status`] and [`ProxyError::body`].
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("request payload is required")]
    MissingPayload,

    #[error("prompt is required")]
    MissingPrompt,

    /// Token acquisition or refresh failed
    #[error("error during API request: {0}")]
    Credential(String),

    /// Transport failure talking to the generation API (timeout, DNS, connect)
    #[error("error during API request: {0}")]
    Dispatch(String),

    #[error("failed to parse response JSON")]
    DownstreamJsonInvalid { raw: String },

    #[error("error from Gemini API")]
    DownstreamApi { status: StatusCode, body: String },

    #[error("{0}")]
    Unhandled(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingPayload | Self::MissingPrompt => StatusCode::BAD_REQUEST,
            Self::DownstreamApi { status, .. } => *status,
            Self::Credential(_)
            | Self::Dispatch(_)
            | Self::DownstreamJsonInvalid { .. }
            | Self::Unhandled(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Self::DownstreamJsonInvalid { raw } => json!({
                "error": self.to_string(),
                "raw_response": raw,
            }),
            Self::DownstreamApi { status, body } => json!({
                "error": self.to_string(),
                "status_code": status.as_u16(),
                "response": body,
            }),
            _ => json!({ "error": self.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_request_with_distinct_messages() {
        let payload = ProxyError::MissingPayload;
        let prompt = ProxyError::MissingPrompt;

        assert_eq!(payload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(prompt.status(), StatusCode::BAD_REQUEST);
        assert_ne!(payload.body()["error"], prompt.body()["error"]);
    }

    #[test]
    fn test_credential_and_dispatch_share_status() {
        let cred = ProxyError::Credential("metadata server unreachable".to_string());
        let dispatch = ProxyError::Dispatch("operation timed out".to_string());

        assert_eq!(cred.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(dispatch.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            cred.body()["error"],
            "error during API request: metadata server unreachable"
        );
    }

    #[test]
    fn test_downstream_api_error_passes_status_through() {
        let err = ProxyError::DownstreamApi {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: "quota".to_string(),
        };

        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = err.body();
        assert_eq!(body["error"], "error from Gemini API");
        assert_eq!(body["status_code"], 429);
        assert_eq!(body["response"], "quota");
    }

    #[test]
    fn test_invalid_json_keeps_raw_body() {
        let err = ProxyError::DownstreamJsonInvalid {
            raw: "<html>".to_string(),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body()["raw_response"], "<html>");
    }
}

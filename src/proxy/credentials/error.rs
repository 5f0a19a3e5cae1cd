use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("failed to read credentials file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid credentials file {path:?}: {message}")]
    InvalidFile { path: PathBuf, message: String },

    #[error("failed to sign JWT assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("token request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("token endpoint {endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse token response: {0}")]
    InvalidResponse(String),

    #[error("could not find default credentials and the metadata server is unreachable: {0}")]
    NotFound(String),
}

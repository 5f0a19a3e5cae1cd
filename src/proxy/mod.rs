// proxy module - Vertex AI text generation proxy

pub mod config;
pub mod server;

pub mod credentials; // Bearer token acquisition
pub mod handlers; // API endpoint handlers
pub mod mappers; // Protocol mappers
pub mod middleware; // Response header policy
pub mod upstream; // Upstream client

pub use config::ProxyConfig;
pub use handlers::text::{ProxyResponse, TextProxy};
pub use server::AxumServer;

// Vertex AI mapper module
// Simplified text request -> generateContent, generateContent -> text

pub mod models;
pub mod request;
pub mod response;

pub use models::*;
pub use request::build_generate_request;
pub use response::{extract_text, ExtractionError};

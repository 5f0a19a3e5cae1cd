pub mod error;
pub mod modules;
pub mod proxy; // Proxy service module
mod utils;

pub use error::{AppError, AppResult, ProxyError};

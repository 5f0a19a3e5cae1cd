// Middleware module - response header policy

pub mod cors;

pub use cors::{base_headers, preflight_headers};

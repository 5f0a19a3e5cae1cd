pub mod config;
pub mod logger;

pub use config::load_proxy_config;
pub use logger::init_logger;

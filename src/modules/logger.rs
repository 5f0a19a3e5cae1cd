use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const APP_DIR_NAME: &str = "vertex-text-proxy";

/// Resolve the log directory: `LOG_DIR`, else `<data dir>/vertex-text-proxy/logs`
pub fn get_log_dir() -> Result<PathBuf, String> {
    let log_dir = match std::env::var("LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => dirs::data_dir()
            .ok_or("Failed to resolve data directory")?
            .join(APP_DIR_NAME)
            .join("logs"),
    };

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }

    Ok(log_dir)
}

/// Initialize logger system
pub fn init_logger() {
    // Capture log macro logs
    let _ = tracing_log::LogTracer::init();

    // Console output layer
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    // Default to INFO and above
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // File persistence is optional: read-only container filesystems have no data dir
    let (file_layer, file_error) = match get_log_dir() {
        Ok(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "proxy.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Keep the worker alive until process exit
            std::mem::forget(guard);

            let layer = fmt::Layer::new()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_level(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    // try_init avoids a panic on re-initialization (tests)
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    match file_error {
        None => info!("Logger system initialized (Console + File Persistence)"),
        Some(e) => info!("Logger system initialized (Console only): {}", e),
    }
}

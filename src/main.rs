use std::sync::Arc;
use tracing::info;

use vertex_text_proxy_lib::modules::{init_logger, load_proxy_config};
use vertex_text_proxy_lib::proxy::credentials::ApplicationDefaultCredentials;
use vertex_text_proxy_lib::proxy::{AxumServer, TextProxy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = Arc::new(load_proxy_config()?);
    if config.project_id.is_empty() {
        tracing::warn!("PROJECT_ID is not set; downstream requests will fail");
    }

    let credentials = Arc::new(ApplicationDefaultCredentials::from_env(Some(
        &config.upstream_proxy,
    )));
    let text_proxy = Arc::new(TextProxy::new(config.clone(), credentials));

    let (server, handle) =
        AxumServer::start(config.get_bind_address(), config.port, text_proxy).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    server.stop();
    handle.await?;
    Ok(())
}

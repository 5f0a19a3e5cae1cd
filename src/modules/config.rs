use crate::error::{AppError, AppResult};
use crate::proxy::config::{ProxyConfig, UpstreamProxyConfig, DEFAULT_LOCATION, DEFAULT_PORT};

/// Load proxy config from the process environment
pub fn load_proxy_config() -> AppResult<ProxyConfig> {
    load_from(|key| std::env::var(key).ok())
}

/// Build the config from any key lookup; empty values count as unset.
pub(crate) fn load_from<F>(lookup: F) -> AppResult<ProxyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let port = match get("PORT") {
        Some(raw) => raw
            .trim()
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("invalid PORT '{}': {}", raw, e)))?,
        None => DEFAULT_PORT,
    };

    let allow_lan_access = match get("ALLOW_LAN_ACCESS") {
        Some(raw) => parse_flag(&raw)
            .ok_or_else(|| AppError::Config(format!("invalid ALLOW_LAN_ACCESS '{}'", raw)))?,
        // Cloud runtimes route traffic from outside the container
        None => get("K_SERVICE").is_some(),
    };

    let upstream_proxy = match get("UPSTREAM_PROXY_URL") {
        Some(url) => UpstreamProxyConfig { enabled: true, url },
        None => UpstreamProxyConfig::default(),
    };

    Ok(ProxyConfig {
        project_id: get("PROJECT_ID").unwrap_or_default(),
        location: get("LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
        allow_lan_access,
        port,
        api_endpoint: get("VERTEX_API_ENDPOINT"),
        upstream_proxy,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

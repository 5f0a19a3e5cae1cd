use serde::{Deserialize, Serialize};

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_PORT: u16 = 8080;

/// 反代服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Google Cloud project hosting the Vertex AI endpoint.
    /// Not validated: an empty value is sent through and rejected upstream.
    #[serde(default)]
    pub project_id: String,

    /// Vertex AI region
    #[serde(default = "default_location")]
    pub location: String,

    /// 是否允许局域网访问
    /// - false: 仅本机访问 127.0.0.1
    /// - true: 允许局域网访问 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL replacing `https://{location}-aiplatform.googleapis.com`
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// 上游代理配置
    #[serde(default)]
    pub upstream_proxy: UpstreamProxyConfig,
}

/// 上游代理配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpstreamProxyConfig {
    /// 是否启用
    pub enabled: bool,
    /// 代理地址 (http://, https://, socks5://)
    pub url: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: default_location(),
            allow_lan_access: false,
            port: default_port(),
            api_endpoint: None,
            upstream_proxy: UpstreamProxyConfig::default(),
        }
    }
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ProxyConfig {
    /// 获取实际的监听地址
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }
}

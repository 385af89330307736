use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::{non_blank, parse_bool, parse_port_list};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub intel: FileIntelConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    #[serde(default)]
    pub backend: FileBackendConfig,
    #[serde(default)]
    pub agent: FileAgentConfig,
    #[serde(default)]
    pub scan_server: FileScanServerConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileIntelConfig {
    #[serde(default)]
    pub greynoise: FileSourceConfig,
    #[serde(default)]
    pub shodan: FileSourceConfig,
    #[serde(default)]
    pub vulners: FileSourceConfig,
    #[serde(default)]
    pub nvd: FileSourceConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileBackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_ports: Option<Vec<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub down_hosts: Option<String>,
    /// Human readable duration, e.g. `"30s"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrich_deadline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrich_concurrency: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileScanServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nmap_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_proxy_headers: Option<bool>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub greynoise_api_key: Option<String>,
    pub shodan_api_key: Option<String>,
    pub vulners_api_key: Option<String>,
    pub nvd_api_key: Option<String>,
    pub greynoise_base_url: Option<String>,
    pub shodan_base_url: Option<String>,
    pub vulners_base_url: Option<String>,
    pub nvd_base_url: Option<String>,
    pub redis_url: Option<String>,
    pub backend_api_url: Option<String>,
    pub backend_token: Option<String>,
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    pub camera_network: Option<String>,
    pub camera_ports: Option<Vec<u16>>,
    pub report_dir: Option<PathBuf>,
    pub error_log_path: Option<PathBuf>,
    pub inventory_path: Option<PathBuf>,
    pub down_hosts: Option<String>,
    pub enrich_deadline_secs: Option<u64>,
    pub enrich_concurrency: Option<usize>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub jwt_secret: Option<String>,
    pub scan_default_args: Option<String>,
    pub nmap_path: Option<String>,
    pub trust_proxy_headers: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment view from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| non_blank(lookup(name));
        let path = |name: &str| text(name).map(PathBuf::from);
        let number =
            |name: &str| text(name).and_then(|s| s.parse::<u64>().ok());

        Self {
            config_path: path("VIGIL_CONFIG"),
            greynoise_api_key: text("GREYNOISE_API_KEY"),
            shodan_api_key: text("SHODAN_API_KEY"),
            vulners_api_key: text("VULNERS_API_KEY"),
            nvd_api_key: text("NVD_API_KEY"),
            greynoise_base_url: text("GREYNOISE_BASE_URL"),
            shodan_base_url: text("SHODAN_BASE_URL"),
            vulners_base_url: text("VULNERS_BASE_URL"),
            nvd_base_url: text("NVD_BASE_URL"),
            redis_url: text("REDIS_URL"),
            backend_api_url: text("BACKEND_API_URL"),
            backend_token: text("BACKEND_TOKEN"),
            client_id: text("CLIENT_ID"),
            tenant_id: text("TENANT_ID"),
            client_secret: text("CLIENT_SECRET"),
            camera_network: text("CAMERA_NETWORK"),
            camera_ports: text("CAMERA_PORTS")
                .and_then(|raw| parse_port_list(&raw)),
            report_dir: path("REPORT_DIR"),
            error_log_path: path("ERROR_LOG_PATH"),
            inventory_path: path("INVENTORY_PATH"),
            down_hosts: text("REPORT_DOWN_HOSTS"),
            enrich_deadline_secs: number("ENRICH_DEADLINE_SECS"),
            enrich_concurrency: number("ENRICH_CONCURRENCY")
                .map(|n| n as usize),
            server_host: text("SERVER_HOST"),
            server_port: text("SERVER_PORT").and_then(|s| s.parse().ok()),
            jwt_secret: text("JWT_SECRET"),
            scan_default_args: text("SCAN_DEFAULT_ARGS"),
            nmap_path: text("NMAP_PATH"),
            trust_proxy_headers: text("TRUST_PROXY_HEADERS")
                .and_then(|raw| parse_bool(&raw)),
        }
    }
}

pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::loader::error::ConfigLoadError;

#[derive(Debug, Clone)]
pub struct Config {
    pub intel: IntelConfig,
    pub cache: CacheConfig,
    pub backend: BackendConfig,
    pub agent: AgentConfig,
    pub scan_server: ScanServerConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// The scan server refuses to start without a signing secret.
    pub fn require_jwt_secret(&self) -> Result<&str, ConfigLoadError> {
        self.scan_server
            .jwt_secret
            .as_deref()
            .ok_or(ConfigLoadError::MissingSecret { name: "JWT_SECRET" })
    }
}

/// Endpoint and credential of one intelligence source.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub api_key: Option<String>,
    /// Base URL without a trailing slash.
    pub base_url: String,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelConfig {
    pub greynoise: SourceConfig,
    pub shodan: SourceConfig,
    pub vulners: SourceConfig,
    pub nvd: SourceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// `None` selects the in-process cache.
    pub redis_url: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub tenant_id: String,
    pub client_secret: String,
    pub scope: String,
}

impl OAuthClientConfig {
    pub fn token_url(&self) -> String {
        format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            self.tenant_id
        )
    }
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub oauth: Option<OAuthClientConfig>,
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("oauth", &self.oauth)
            .finish()
    }
}

/// Whether hosts a sweep reports as `down` are forwarded to the backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HostStatePolicy {
    Report,
    #[default]
    Suppress,
}

impl HostStatePolicy {
    pub fn from_flag(report: bool) -> Self {
        if report {
            HostStatePolicy::Report
        } else {
            HostStatePolicy::Suppress
        }
    }
}

impl FromStr for HostStatePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "report" => Ok(HostStatePolicy::Report),
            "suppress" => Ok(HostStatePolicy::Suppress),
            other => crate::util::parse_bool(other)
                .map(HostStatePolicy::from_flag)
                .ok_or_else(|| format!("unknown host state policy '{raw}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub camera_network: String,
    pub camera_ports: Vec<u16>,
    pub report_dir: PathBuf,
    pub error_log_path: PathBuf,
    /// JSON array of `{name, version}`; absent means an empty inventory.
    pub inventory_path: Option<PathBuf>,
    pub down_hosts: HostStatePolicy,
    pub enrich_deadline: Duration,
    pub enrich_concurrency: usize,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ScanServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: Option<String>,
    pub default_args: String,
    pub nmap_path: String,
    pub trust_proxy_headers: bool,
}

impl fmt::Debug for ScanServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "jwt_secret",
                &self.jwt_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("default_args", &self.default_args)
            .field("nmap_path", &self.nmap_path)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::debug;
use url::Url;

use crate::constants::*;
use crate::models::sources::{EnvConfig, FileConfig, FileSourceConfig};
use crate::models::{
    AgentConfig, BackendConfig, CacheConfig, Config, ConfigMetadata,
    HostStatePolicy, IntelConfig, OAuthClientConfig, ScanServerConfig,
    SourceConfig,
};
use crate::util::non_blank;
use crate::validation::ConfigWarnings;
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![PathBuf::from("vigil.toml"), PathBuf::from("config/vigil.toml")]
});

#[derive(Debug, Default, Clone)]
struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then composes the process environment over the
    /// optional TOML file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Composes a configuration from an explicit environment view. The
    /// process environment and `.env` are not consulted.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            compose_config(file.unwrap_or_default(), env, config_path);
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let file = read_file_config(&path)?;
        Ok((Some(file), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the typed configuration. A bad value for one capability is
/// reported as a warning and replaced by its default (or disables that
/// capability); it never fails the load.
fn compose_config(
    file: FileConfig,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> (Config, ConfigWarnings) {
    let mut warnings = ConfigWarnings::default();

    let intel = IntelConfig {
        greynoise: compose_source(
            ("GREYNOISE_API_KEY", "GREYNOISE_BASE_URL"),
            env.greynoise_api_key.clone(),
            env.greynoise_base_url.clone(),
            &file.intel.greynoise,
            DEFAULT_GREYNOISE_BASE_URL,
            &mut warnings,
        ),
        shodan: compose_source(
            ("SHODAN_API_KEY", "SHODAN_BASE_URL"),
            env.shodan_api_key.clone(),
            env.shodan_base_url.clone(),
            &file.intel.shodan,
            DEFAULT_SHODAN_BASE_URL,
            &mut warnings,
        ),
        vulners: compose_source(
            ("VULNERS_API_KEY", "VULNERS_BASE_URL"),
            env.vulners_api_key.clone(),
            env.vulners_base_url.clone(),
            &file.intel.vulners,
            DEFAULT_VULNERS_BASE_URL,
            &mut warnings,
        ),
        nvd: compose_source(
            ("NVD_API_KEY", "NVD_BASE_URL"),
            env.nvd_api_key.clone(),
            env.nvd_base_url.clone(),
            &file.intel.nvd,
            DEFAULT_NVD_BASE_URL,
            &mut warnings,
        ),
    };

    let redis_url = env
        .redis_url
        .clone()
        .or(non_blank(file.cache.redis_url))
        .and_then(|url| checked_url("REDIS_URL", url, None, &mut warnings));
    let cache = CacheConfig { redis_url };

    let api_url = env
        .backend_api_url
        .clone()
        .or(non_blank(file.backend.api_url))
        .and_then(|url| {
            checked_url(
                "BACKEND_API_URL",
                url,
                Some(DEFAULT_BACKEND_API_URL),
                &mut warnings,
            )
        })
        .unwrap_or_else(|| DEFAULT_BACKEND_API_URL.to_string());
    let oauth = match (
        env.client_id.clone().or(non_blank(file.backend.client_id)),
        env.tenant_id.clone().or(non_blank(file.backend.tenant_id)),
        env.client_secret
            .clone()
            .or(non_blank(file.backend.client_secret)),
    ) {
        (Some(client_id), Some(tenant_id), Some(client_secret)) => {
            Some(OAuthClientConfig {
                client_id,
                tenant_id,
                client_secret,
                scope: DEFAULT_OAUTH_SCOPE.to_string(),
            })
        }
        (None, None, None) => None,
        _ => {
            warnings.push_with_hint(
                "incomplete OAuth client credentials; ignoring them",
                "set CLIENT_ID, TENANT_ID and CLIENT_SECRET together",
            );
            None
        }
    };
    let token = env.backend_token.clone().or(non_blank(file.backend.token));
    if token.is_none() && oauth.is_none() {
        warnings.push_with_hint(
            "no backend credential configured; registration will be skipped",
            "set BACKEND_TOKEN or the OAuth client credentials",
        );
    }
    let backend = BackendConfig {
        api_url: api_url.trim_end_matches('/').to_string(),
        token,
        oauth,
    };

    let down_hosts = match env.down_hosts.clone().or(file.agent.down_hosts) {
        Some(raw) => raw.parse::<HostStatePolicy>().unwrap_or_else(|reason| {
            warnings.push_with_hint(
                format!("invalid value for REPORT_DOWN_HOSTS: {reason}"),
                "falling back to suppressing down hosts",
            );
            HostStatePolicy::default()
        }),
        None => HostStatePolicy::default(),
    };
    let default_deadline = Duration::from_secs(DEFAULT_ENRICH_DEADLINE_SECS);
    let enrich_deadline =
        match (env.enrich_deadline_secs, file.agent.enrich_deadline) {
            (Some(secs), _) => Duration::from_secs(secs),
            (None, Some(raw)) => checked_duration(
                "agent.enrich_deadline",
                &raw,
                default_deadline,
                &mut warnings,
            ),
            (None, None) => default_deadline,
        };
    let enrich_concurrency = env
        .enrich_concurrency
        .or(file.agent.enrich_concurrency)
        .unwrap_or(DEFAULT_ENRICH_CONCURRENCY)
        .max(1);
    let agent = AgentConfig {
        camera_network: env
            .camera_network
            .clone()
            .or(non_blank(file.agent.camera_network))
            .unwrap_or_else(|| DEFAULT_CAMERA_NETWORK.to_string()),
        camera_ports: env
            .camera_ports
            .clone()
            .or(file.agent.camera_ports)
            .filter(|ports| !ports.is_empty())
            .unwrap_or_else(|| DEFAULT_CAMERA_PORTS.to_vec()),
        report_dir: env
            .report_dir
            .clone()
            .or(file.agent.report_dir)
            .unwrap_or_else(|| PathBuf::from(".")),
        error_log_path: env
            .error_log_path
            .clone()
            .or(file.agent.error_log_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ERROR_LOG)),
        inventory_path: env
            .inventory_path
            .clone()
            .or(file.agent.inventory_path),
        down_hosts,
        enrich_deadline,
        enrich_concurrency,
    };

    let scan_server = ScanServerConfig {
        host: env
            .server_host
            .clone()
            .or(non_blank(file.scan_server.host))
            .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
        port: env
            .server_port
            .or(file.scan_server.port)
            .unwrap_or(DEFAULT_SERVER_PORT),
        jwt_secret: env
            .jwt_secret
            .clone()
            .or(non_blank(file.scan_server.jwt_secret)),
        default_args: env
            .scan_default_args
            .clone()
            .or(non_blank(file.scan_server.default_args))
            .unwrap_or_else(|| DEFAULT_SCAN_ARGS.to_string()),
        nmap_path: env
            .nmap_path
            .clone()
            .or(non_blank(file.scan_server.nmap_path))
            .unwrap_or_else(|| DEFAULT_NMAP_PATH.to_string()),
        trust_proxy_headers: env
            .trust_proxy_headers
            .or(file.scan_server.trust_proxy_headers)
            .unwrap_or(false),
    };

    let config = Config {
        intel,
        cache,
        backend,
        agent,
        scan_server,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    (config, warnings)
}

fn compose_source(
    (key_var, url_var): (&'static str, &'static str),
    env_key: Option<String>,
    env_url: Option<String>,
    file: &FileSourceConfig,
    default_url: &str,
    warnings: &mut ConfigWarnings,
) -> SourceConfig {
    let api_key = env_key.or(non_blank(file.api_key.clone()));
    if api_key.is_none() {
        warnings.push_with_hint(
            format!("{key_var} is not set; lookups report missing_credential"),
            format!("set {key_var} to enable it"),
        );
    }
    let base_url = env_url
        .or(non_blank(file.base_url.clone()))
        .and_then(|url| {
            checked_url(url_var, url, Some(default_url), warnings)
        })
        .unwrap_or_else(|| default_url.to_string());
    SourceConfig::new(base_url, api_key)
}

/// Returns `value` when it parses as a URL. Otherwise records a warning
/// and returns `fallback`.
fn checked_url(
    name: &'static str,
    value: String,
    fallback: Option<&str>,
    warnings: &mut ConfigWarnings,
) -> Option<String> {
    match Url::parse(&value) {
        Ok(_) => Some(value),
        Err(err) => {
            debug!(name, value = %value, error = %err, "rejected URL");
            let hint = match fallback {
                Some(default) => format!("falling back to {default}"),
                None => format!("{name} is ignored"),
            };
            warnings.push_with_hint(
                format!("invalid URL for {name}: '{value}' ({err})"),
                hint,
            );
            fallback.map(str::to_string)
        }
    }
}

fn checked_duration(
    name: &'static str,
    raw: &str,
    fallback: Duration,
    warnings: &mut ConfigWarnings,
) -> Duration {
    humantime::parse_duration(raw.trim()).unwrap_or_else(|err| {
        warnings.push_with_hint(
            format!("invalid duration for {name}: '{raw}' ({err})"),
            format!(
                "falling back to {}",
                humantime::format_duration(fallback)
            ),
        );
        fallback
    })
}

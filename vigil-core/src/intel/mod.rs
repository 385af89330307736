//! Intelligence source adapters.
//!
//! Every adapter answers `query(entity)` with normalized data or a typed
//! [`UnavailableReason`]; nothing raises past the adapter boundary. Checks
//! that need no network (credential, entity kind, entity syntax) run
//! before any request is built.

mod greynoise;
mod nvd;
mod shodan;
mod vulners;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::info;
use vigil_config::IntelConfig;
use vigil_model::{
    Entity, SoftwareId, SourceData, SourceKind, UnavailableReason,
};

pub use self::greynoise::GreyNoiseSource;
pub use self::nvd::NvdSource;
pub use self::shodan::ShodanSource;
pub use self::vulners::VulnersSource;

/// Fixed per-request timeout for every upstream call.
pub const ADAPTER_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait IntelSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn query(
        &self,
        entity: &Entity,
    ) -> Result<SourceData, UnavailableReason>;
}

/// Shared HTTP client for adapters.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(ADAPTER_TIMEOUT)
        .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// One adapter per configured source. Sources without a credential are
/// still registered so that their lookups report `missing_credential`
/// rather than `not_configured`.
pub fn sources_from_config(
    config: &IntelConfig,
    http: &reqwest::Client,
) -> Vec<Arc<dyn IntelSource>> {
    let sources: Vec<Arc<dyn IntelSource>> = vec![
        Arc::new(GreyNoiseSource::new(&config.greynoise, http.clone())),
        Arc::new(ShodanSource::new(&config.shodan, http.clone())),
        Arc::new(VulnersSource::new(&config.vulners, http.clone())),
        Arc::new(NvdSource::new(&config.nvd, http.clone())),
    ];
    for (source, credential) in sources.iter().zip([
        config.greynoise.has_credential(),
        config.shodan.has_credential(),
        config.vulners.has_credential(),
        config.nvd.has_credential(),
    ]) {
        info!(source = %source.kind(), credential, "intel source registered");
    }
    sources
}

pub(crate) fn credential(
    api_key: &Option<String>,
) -> Result<&str, UnavailableReason> {
    api_key
        .as_deref()
        .ok_or(UnavailableReason::MissingCredential)
}

pub(crate) fn require_ipv4(
    entity: &Entity,
) -> Result<Ipv4Addr, UnavailableReason> {
    match entity {
        Entity::Ip { address } => entity.as_ipv4().ok_or_else(|| {
            UnavailableReason::invalid_input(format!(
                "'{address}' is not a dotted-quad IPv4 address"
            ))
        }),
        Entity::Software(_) => Err(UnavailableReason::UnsupportedEntity),
    }
}

pub(crate) fn require_software(
    entity: &Entity,
) -> Result<&SoftwareId, UnavailableReason> {
    match entity.as_software() {
        Some(software) if software.name.trim().is_empty() => Err(
            UnavailableReason::invalid_input("software name is empty"),
        ),
        Some(software) => Ok(software),
        None => Err(UnavailableReason::UnsupportedEntity),
    }
}

/// Sends the request and decodes a 2xx JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, UnavailableReason> {
    let response = request.send().await.map_err(classify)?;
    let status = response.status();
    if !status.is_success() {
        return Err(UnavailableReason::HttpStatus {
            status: status.as_u16(),
        });
    }
    response.json::<T>().await.map_err(classify)
}

fn classify(err: reqwest::Error) -> UnavailableReason {
    if err.is_timeout() {
        UnavailableReason::Timeout
    } else if err.is_decode() {
        UnavailableReason::Decode {
            message: err.to_string(),
        }
    } else {
        UnavailableReason::Transport {
            message: err.without_url().to_string(),
        }
    }
}

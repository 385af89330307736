use async_trait::async_trait;
use serde::Deserialize;
use vigil_config::SourceConfig;
use vigil_model::{
    Entity, ReputationRecord, SourceData, SourceKind, UnavailableReason,
};

use super::{IntelSource, credential, fetch_json, require_ipv4};

/// GreyNoise community API: reputation and scanning behaviour of an IP.
#[derive(Debug, Clone)]
pub struct GreyNoiseSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommunityResponse {
    noise: bool,
    riot: bool,
    classification: Option<String>,
    name: Option<String>,
    last_seen: Option<String>,
}

impl GreyNoiseSource {
    pub fn new(config: &SourceConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl IntelSource for GreyNoiseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Reputation
    }

    async fn query(
        &self,
        entity: &Entity,
    ) -> Result<SourceData, UnavailableReason> {
        let key = credential(&self.api_key)?;
        let ip = require_ipv4(entity)?;

        let url = format!("{}/v3/community/{ip}", self.base_url);
        let body: CommunityResponse = fetch_json(
            self.http
                .get(url)
                .header("Accept", "application/json")
                .header("key", key),
        )
        .await?;

        Ok(SourceData::Reputation(ReputationRecord {
            ip: ip.to_string(),
            classification: body
                .classification
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "unknown".to_string()),
            noise: body.noise,
            riot: body.riot,
            name: body.name.unwrap_or_default(),
            last_seen: body.last_seen.unwrap_or_default(),
        }))
    }
}

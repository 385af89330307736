use async_trait::async_trait;
use serde::Deserialize;
use vigil_config::SourceConfig;
use vigil_model::intel::UNKNOWN_SEVERITY;
use vigil_model::{
    Entity, SourceData, SourceKind, UnavailableReason, VulnSearchHit,
};

use super::{IntelSource, credential, fetch_json, require_software};

/// Vulners lucene search over a software phrase.
#[derive(Debug, Clone)]
pub struct VulnersSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    result: String,
    data: SearchData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchData {
    search: Vec<SearchItem>,
    error: Option<String>,
}

/// Hits arrive either flat or wrapped in an `_source` document.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    #[serde(rename = "_source")]
    source: Option<Document>,
    #[serde(flatten)]
    inline: Document,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    id: Option<String>,
    title: Option<String>,
    href: Option<String>,
    cvss: Option<Cvss>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Cvss {
    score: Option<f64>,
}

impl VulnersSource {
    pub fn new(config: &SourceConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

fn normalize(
    body: SearchResponse,
) -> Result<Vec<VulnSearchHit>, UnavailableReason> {
    if body.result != "OK" {
        let message = body.data.error.unwrap_or_else(|| {
            format!("search returned result '{}'", body.result)
        });
        return Err(UnavailableReason::Upstream { message });
    }

    Ok(body
        .data
        .search
        .into_iter()
        .map(|item| {
            let doc = item.source.unwrap_or(item.inline);
            VulnSearchHit {
                id: doc.id.unwrap_or_default(),
                severity: doc
                    .cvss
                    .and_then(|cvss| cvss.score)
                    .map(|score| format!("{score:.1}"))
                    .unwrap_or_else(|| UNKNOWN_SEVERITY.to_string()),
                title: doc.title.unwrap_or_default(),
                link: doc.href.unwrap_or_default(),
            }
        })
        .collect())
}

#[async_trait]
impl IntelSource for VulnersSource {
    fn kind(&self) -> SourceKind {
        SourceKind::VulnSearch
    }

    async fn query(
        &self,
        entity: &Entity,
    ) -> Result<SourceData, UnavailableReason> {
        let key = credential(&self.api_key)?;
        let software = require_software(entity)?;

        let url = format!("{}/api/v3/search/lucene/", self.base_url);
        let phrase = software.search_phrase();
        let body: SearchResponse = fetch_json(
            self.http
                .get(url)
                .query(&[("query", phrase.as_str()), ("apiKey", key)]),
        )
        .await?;

        normalize(body).map(SourceData::VulnSearch)
    }
}

use async_trait::async_trait;
use serde::Deserialize;
use vigil_config::SourceConfig;
use vigil_model::intel::UNKNOWN_SEVERITY;
use vigil_model::{
    CveRecord, Entity, SourceData, SourceKind, UnavailableReason,
};

use super::{IntelSource, credential, fetch_json, require_software};

/// NVD CVE API 2.0 keyword search.
#[derive(Debug, Clone)]
pub struct NvdSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CveResponse {
    vulnerabilities: Vec<VulnerabilityItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VulnerabilityItem {
    cve: Cve,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Cve {
    id: String,
    descriptions: Vec<Description>,
    metrics: Metrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Description {
    lang: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Metrics {
    cvss_metric_v40: Vec<Metric>,
    cvss_metric_v31: Vec<Metric>,
    cvss_metric_v30: Vec<Metric>,
    cvss_metric_v2: Vec<Metric>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Metric {
    cvss_data: CvssData,
    /// v2 metrics carry the severity next to, not inside, `cvssData`.
    base_severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CvssData {
    base_severity: Option<String>,
}

impl Metrics {
    /// Severity of the newest CVSS version present.
    fn severity(&self) -> Option<String> {
        [
            &self.cvss_metric_v40,
            &self.cvss_metric_v31,
            &self.cvss_metric_v30,
            &self.cvss_metric_v2,
        ]
        .into_iter()
        .find_map(|metrics| {
            metrics.first().and_then(|metric| {
                metric
                    .cvss_data
                    .base_severity
                    .clone()
                    .or_else(|| metric.base_severity.clone())
            })
        })
    }
}

impl Cve {
    fn description(&self) -> String {
        self.descriptions
            .iter()
            .find(|d| d.lang == "en")
            .or_else(|| self.descriptions.first())
            .map(|d| d.value.clone())
            .unwrap_or_default()
    }
}

impl NvdSource {
    pub fn new(config: &SourceConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

fn normalize(body: CveResponse) -> Vec<CveRecord> {
    body.vulnerabilities
        .into_iter()
        .map(|item| CveRecord {
            severity: item
                .cve
                .metrics
                .severity()
                .unwrap_or_else(|| UNKNOWN_SEVERITY.to_string()),
            description: item.cve.description(),
            cve_id: item.cve.id,
        })
        .collect()
}

#[async_trait]
impl IntelSource for NvdSource {
    fn kind(&self) -> SourceKind {
        SourceKind::VulnDb
    }

    async fn query(
        &self,
        entity: &Entity,
    ) -> Result<SourceData, UnavailableReason> {
        let key = credential(&self.api_key)?;
        let software = require_software(entity)?;

        let url = format!("{}/rest/json/cves/2.0", self.base_url);
        let phrase = software.search_phrase();
        let body: CveResponse = fetch_json(
            self.http
                .get(url)
                .header("apiKey", key)
                .query(&[("keywordSearch", phrase.as_str())]),
        )
        .await?;

        Ok(SourceData::VulnDb(normalize(body)))
    }
}

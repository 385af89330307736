use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use vigil_config::SourceConfig;
use vigil_model::{
    Entity, Fingerprint, FingerprintRecord, SourceData, SourceKind,
    UnavailableReason,
};

use super::{IntelSource, credential, fetch_json, require_ipv4};

/// Shodan host lookup: passive fingerprint of an IP.
#[derive(Debug, Clone)]
pub struct ShodanSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostResponse {
    ports: Vec<u16>,
    cpes: Vec<String>,
    vulns: Vec<String>,
    tags: Vec<String>,
    os: Option<String>,
    hostnames: Vec<String>,
    org: Option<String>,
    data: Vec<Banner>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Banner {
    port: u16,
    transport: String,
    product: String,
    version: String,
    cpe: Vec<String>,
}

impl ShodanSource {
    pub fn new(config: &SourceConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

fn normalize(ip: String, body: HostResponse) -> FingerprintRecord {
    let mut cpes: Vec<String> = Vec::new();
    let mut seen = BTreeSet::new();
    let banner_cpes = body.data.iter().flat_map(|b| b.cpe.iter().cloned());
    for cpe in body.cpes.into_iter().chain(banner_cpes) {
        if seen.insert(cpe.clone()) {
            cpes.push(cpe);
        }
    }

    let fingerprints = body
        .data
        .into_iter()
        .filter(|banner| !banner.product.is_empty())
        .map(|banner| Fingerprint {
            port: banner.port,
            transport: banner.transport,
            product: banner.product,
            version: banner.version,
        })
        .collect();

    FingerprintRecord {
        ip,
        ports: body.ports,
        fingerprints,
        cpes,
        vulns: body.vulns,
        tags: body.tags,
        os: body.os.unwrap_or_default(),
        hostnames: body.hostnames,
        org: body.org.unwrap_or_default(),
    }
}

#[async_trait]
impl IntelSource for ShodanSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fingerprint
    }

    async fn query(
        &self,
        entity: &Entity,
    ) -> Result<SourceData, UnavailableReason> {
        let key = credential(&self.api_key)?;
        let ip = require_ipv4(entity)?;

        let url = format!("{}/shodan/host/{ip}", self.base_url);
        let body: HostResponse =
            fetch_json(self.http.get(url).query(&[("key", key)])).await?;

        Ok(SourceData::Fingerprint(normalize(ip.to_string(), body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nulls_and_missing_fields_become_empty() {
        let body: HostResponse = serde_json::from_str(
            r#"{"ports":[22,443],"os":null,"org":null,"vulns":["CVE-2021-1"]}"#,
        )
        .unwrap();
        let record = normalize("1.2.3.4".into(), body);
        assert_eq!(record.ports, vec![22, 443]);
        assert_eq!(record.os, "");
        assert_eq!(record.org, "");
        assert!(record.tags.is_empty());
        assert_eq!(record.vulns, vec!["CVE-2021-1".to_string()]);
    }

    #[test]
    fn banner_products_and_cpes_are_collected() {
        let body: HostResponse = serde_json::from_str(
            r#"{
                "cpes": ["cpe:/a:openbsd:openssh"],
                "data": [
                    {"port": 22, "transport": "tcp", "product": "OpenSSH",
                     "version": "8.9p1", "cpe": ["cpe:/a:openbsd:openssh"]},
                    {"port": 443, "transport": "tcp",
                     "cpe": ["cpe:/a:nginx:nginx"]}
                ]
            }"#,
        )
        .unwrap();
        let record = normalize("1.2.3.4".into(), body);
        assert_eq!(record.fingerprints.len(), 1);
        assert_eq!(record.fingerprints[0].product, "OpenSSH");
        assert_eq!(
            record.cpes,
            vec![
                "cpe:/a:openbsd:openssh".to_string(),
                "cpe:/a:nginx:nginx".to_string()
            ]
        );
    }
}

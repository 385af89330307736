use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enrichment::EnrichmentResult;
use crate::entity::SoftwareId;
use crate::intel::{CveRecord, VulnSearchHit};
use crate::scan::HostState;
use crate::source::{SourceKind, SourceOutcome};

/// Point-in-time state of the machine running the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub name: String,
    pub os: String,
    pub ip_address: String,
    pub cpu_usage: f32,
    pub memory_usage: f32,
    pub timestamp: DateTime<Utc>,
}

/// Body sent to the backend's device registration endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    #[serde(flatten)]
    pub info: DeviceInfo,
    pub software: Vec<SoftwareId>,
    pub cves: Vec<CveRecord>,
    pub shodan_data: SourceOutcome,
    pub grey_noise_data: SourceOutcome,
}

impl DeviceRecord {
    /// Assembles the record from the device IP's enrichment and the
    /// flattened CVE list of the software inventory.
    pub fn new(
        info: DeviceInfo,
        software: Vec<SoftwareId>,
        cves: Vec<CveRecord>,
        ip_enrichment: &EnrichmentResult,
    ) -> Self {
        Self {
            info,
            software,
            cves,
            shodan_data: ip_enrichment
                .outcome_or_missing(SourceKind::Fingerprint),
            grey_noise_data: ip_enrichment
                .outcome_or_missing(SourceKind::Reputation),
        }
    }
}

/// Report file layout, written once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceReport {
    pub timestamp: DateTime<Utc>,
    pub device_info: DeviceInfoSection,
    pub security_data: SecurityData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfoSection {
    pub name: String,
    pub os: String,
    pub ip: String,
    pub cpu_usage: f32,
    pub memory_usage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityData {
    pub software: Vec<SoftwareId>,
    pub cves: Vec<CveRecord>,
    pub shodan: SourceOutcome,
    pub grey_noise: SourceOutcome,
}

impl From<&DeviceRecord> for DeviceReport {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            timestamp: record.info.timestamp,
            device_info: DeviceInfoSection {
                name: record.info.name.clone(),
                os: record.info.os.clone(),
                ip: record.info.ip_address.clone(),
                cpu_usage: record.info.cpu_usage,
                memory_usage: record.info.memory_usage,
            },
            security_data: SecurityData {
                software: record.software.clone(),
                cves: record.cves.clone(),
                shodan: record.shodan_data.clone(),
                grey_noise: record.grey_noise_data.clone(),
            },
        }
    }
}

/// Body sent to the backend for each discovered network entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub ip_address: String,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub hostnames: Vec<String>,
    pub state: HostState,
    pub ports: Vec<u16>,
    pub last_scanned: DateTime<Utc>,
    pub shodan_data: SourceOutcome,
    pub grey_noise_data: SourceOutcome,
    pub vulnerabilities: Vec<VulnSearchHit>,
    pub enrichment: Vec<EnrichmentResult>,
}

//! Normalized per-source records.
//!
//! Every field defaults to an empty value when the upstream payload omits
//! it, so consumers never see `null`.

use serde::{Deserialize, Serialize};

/// Reputation / behaviour classification for an IP.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationRecord {
    pub ip: String,
    pub classification: String,
    pub noise: bool,
    pub riot: bool,
    pub name: String,
    pub last_seen: String,
}

/// One service banner seen by the passive fingerprinting source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fingerprint {
    pub port: u16,
    pub transport: String,
    pub product: String,
    pub version: String,
}

/// Passive fingerprint of an IP: exposed ports, banners, known CVEs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintRecord {
    pub ip: String,
    pub ports: Vec<u16>,
    pub fingerprints: Vec<Fingerprint>,
    pub cpes: Vec<String>,
    pub vulns: Vec<String>,
    pub tags: Vec<String>,
    pub os: String,
    pub hostnames: Vec<String>,
    pub org: String,
}

/// A hit from the vulnerability search source, in upstream rank order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VulnSearchHit {
    pub id: String,
    pub severity: String,
    pub title: String,
    pub link: String,
}

/// A CVE entry from the vulnerability database source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CveRecord {
    pub cve_id: String,
    pub severity: String,
    pub description: String,
}

/// Severity label used when the upstream carries no usable metric.
pub const UNKNOWN_SEVERITY: &str = "UNKNOWN";

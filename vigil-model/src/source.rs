use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::ModelError;
use crate::intel::{
    CveRecord, FingerprintRecord, ReputationRecord, VulnSearchHit,
};

/// The external intelligence sources an entity can be enriched from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Reputation / behaviour service (GreyNoise).
    Reputation,
    /// Passive fingerprinting service (Shodan).
    Fingerprint,
    /// Vulnerability search service (Vulners).
    VulnSearch,
    /// Vulnerability database service (NVD).
    VulnDb,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Reputation,
        SourceKind::Fingerprint,
        SourceKind::VulnSearch,
        SourceKind::VulnDb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Reputation => "reputation",
            SourceKind::Fingerprint => "fingerprint",
            SourceKind::VulnSearch => "vuln_search",
            SourceKind::VulnDb => "vuln_db",
        }
    }

    /// Upstream service backing this source.
    pub fn provider(&self) -> &'static str {
        match self {
            SourceKind::Reputation => "greynoise",
            SourceKind::Fingerprint => "shodan",
            SourceKind::VulnSearch => "vulners",
            SourceKind::VulnDb => "nvd",
        }
    }

    /// Whether this source can be asked about `entity` at all.
    pub fn accepts(&self, entity: &Entity) -> bool {
        match self {
            SourceKind::Reputation | SourceKind::Fingerprint => entity.is_ip(),
            SourceKind::VulnSearch | SourceKind::VulnDb => !entity.is_ip(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lowered = raw.trim().to_ascii_lowercase();
        SourceKind::ALL
            .into_iter()
            .find(|kind| {
                kind.as_str() == lowered
                    || kind.provider() == lowered
                    || kind.as_str().replace('_', "-") == lowered
            })
            .ok_or_else(|| ModelError::UnknownSource(raw.to_string()))
    }
}

/// Broad class of a source failure; drives logging and retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Missing credential or unregistered source. Never retried in a run.
    Configuration,
    /// The entity itself was unusable. No network call was made.
    Validation,
    /// Timeout, non-2xx, transport or decode failure. Retried on the next
    /// independent call because failures are never cached.
    Transient,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Configuration => "configuration",
            FailureClass::Validation => "validation",
            FailureClass::Transient => "transient",
        }
    }
}

/// Why a source produced no data for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnavailableReason {
    /// The source was requested but no adapter is registered for it.
    NotConfigured,
    /// The adapter has no API credential.
    MissingCredential,
    /// The entity failed validation (e.g. not a dotted-quad IPv4).
    InvalidInput { detail: String },
    /// The entity kind is not served by this source.
    UnsupportedEntity,
    /// The upstream did not answer within the adapter timeout.
    Timeout,
    /// The upstream answered with a non-2xx status.
    HttpStatus { status: u16 },
    /// Connection-level failure.
    Transport { message: String },
    /// The upstream body could not be decoded.
    Decode { message: String },
    /// The upstream answered 2xx but reported a failure in its payload.
    Upstream { message: String },
    /// The caller's deadline elapsed before the source answered.
    DeadlineExceeded,
}

impl UnavailableReason {
    pub fn invalid_input(detail: impl Into<String>) -> Self {
        UnavailableReason::InvalidInput {
            detail: detail.into(),
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            UnavailableReason::NotConfigured
            | UnavailableReason::MissingCredential => {
                FailureClass::Configuration
            }
            UnavailableReason::InvalidInput { .. }
            | UnavailableReason::UnsupportedEntity => FailureClass::Validation,
            UnavailableReason::Timeout
            | UnavailableReason::HttpStatus { .. }
            | UnavailableReason::Transport { .. }
            | UnavailableReason::Decode { .. }
            | UnavailableReason::Upstream { .. }
            | UnavailableReason::DeadlineExceeded => FailureClass::Transient,
        }
    }

    /// Stable short code, identical to the serialized `reason` tag.
    pub fn code(&self) -> &'static str {
        match self {
            UnavailableReason::NotConfigured => "not_configured",
            UnavailableReason::MissingCredential => "missing_credential",
            UnavailableReason::InvalidInput { .. } => "invalid_input",
            UnavailableReason::UnsupportedEntity => "unsupported_entity",
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::HttpStatus { .. } => "http_status",
            UnavailableReason::Transport { .. } => "transport",
            UnavailableReason::Decode { .. } => "decode",
            UnavailableReason::Upstream { .. } => "upstream",
            UnavailableReason::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableReason::InvalidInput { detail } => {
                write!(f, "invalid_input: {detail}")
            }
            UnavailableReason::HttpStatus { status } => {
                write!(f, "http_status: {status}")
            }
            UnavailableReason::Transport { message }
            | UnavailableReason::Decode { message }
            | UnavailableReason::Upstream { message } => {
                write!(f, "{}: {message}", self.code())
            }
            other => f.write_str(other.code()),
        }
    }
}

/// A source's normalized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum SourceData {
    Reputation(ReputationRecord),
    Fingerprint(FingerprintRecord),
    VulnSearch(Vec<VulnSearchHit>),
    VulnDb(Vec<CveRecord>),
}

impl SourceData {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceData::Reputation(_) => SourceKind::Reputation,
            SourceData::Fingerprint(_) => SourceKind::Fingerprint,
            SourceData::VulnSearch(_) => SourceKind::VulnSearch,
            SourceData::VulnDb(_) => SourceKind::VulnDb,
        }
    }
}

/// Per-source outcome: data or an explicit, typed unavailability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum SourceOutcome {
    Success(SourceData),
    Unavailable(UnavailableReason),
}

impl SourceOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SourceOutcome::Success(_))
    }

    pub fn data(&self) -> Option<&SourceData> {
        match self {
            SourceOutcome::Success(data) => Some(data),
            SourceOutcome::Unavailable(_) => None,
        }
    }

    pub fn reason(&self) -> Option<&UnavailableReason> {
        match self {
            SourceOutcome::Success(_) => None,
            SourceOutcome::Unavailable(reason) => Some(reason),
        }
    }
}

impl From<Result<SourceData, UnavailableReason>> for SourceOutcome {
    fn from(result: Result<SourceData, UnavailableReason>) -> Self {
        match result {
            Ok(data) => SourceOutcome::Success(data),
            Err(reason) => SourceOutcome::Unavailable(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_names_round_trip_through_aliases() {
        assert_eq!(
            "reputation".parse::<SourceKind>().unwrap(),
            SourceKind::Reputation
        );
        assert_eq!(
            "GreyNoise".parse::<SourceKind>().unwrap(),
            SourceKind::Reputation
        );
        assert_eq!("nvd".parse::<SourceKind>().unwrap(), SourceKind::VulnDb);
        assert_eq!(
            "vuln-search".parse::<SourceKind>().unwrap(),
            SourceKind::VulnSearch
        );
        assert!("virustotal".parse::<SourceKind>().is_err());
    }

    #[test]
    fn sources_accept_matching_entity_kinds() {
        let ip = Entity::ip("1.1.1.1");
        let sw = Entity::software("nginx", "1.18.0");
        assert!(SourceKind::Reputation.accepts(&ip));
        assert!(SourceKind::Fingerprint.accepts(&ip));
        assert!(!SourceKind::VulnDb.accepts(&ip));
        assert!(SourceKind::VulnSearch.accepts(&sw));
        assert!(!SourceKind::Reputation.accepts(&sw));
    }

    #[test]
    fn reasons_classify_configuration_apart_from_transient() {
        assert_eq!(
            UnavailableReason::MissingCredential.class(),
            FailureClass::Configuration
        );
        assert_eq!(
            UnavailableReason::invalid_input("x").class(),
            FailureClass::Validation
        );
        assert_eq!(UnavailableReason::Timeout.class(), FailureClass::Transient);
        assert_eq!(
            UnavailableReason::HttpStatus { status: 503 }.class(),
            FailureClass::Transient
        );
    }

    #[test]
    fn outcome_serializes_tagged() {
        let outcome =
            SourceOutcome::Unavailable(UnavailableReason::MissingCredential);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["value"]["reason"], "missing_credential");

        let outcome = SourceOutcome::Success(SourceData::VulnDb(vec![]));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["value"]["kind"], "vuln_db");

        let back: SourceOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, outcome);
    }

    #[test]
    fn reason_code_matches_serialized_tag() {
        let reasons = [
            UnavailableReason::NotConfigured,
            UnavailableReason::MissingCredential,
            UnavailableReason::invalid_input("bad"),
            UnavailableReason::UnsupportedEntity,
            UnavailableReason::Timeout,
            UnavailableReason::HttpStatus { status: 404 },
            UnavailableReason::Transport {
                message: "refused".into(),
            },
            UnavailableReason::Decode {
                message: "eof".into(),
            },
            UnavailableReason::Upstream {
                message: "error".into(),
            },
            UnavailableReason::DeadlineExceeded,
        ];
        for reason in reasons {
            let json = serde_json::to_value(&reason).unwrap();
            assert_eq!(json["reason"], reason.code());
        }
    }
}

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::intel::{
    CveRecord, FingerprintRecord, ReputationRecord, VulnSearchHit,
};
use crate::source::{
    SourceData, SourceKind, SourceOutcome, UnavailableReason,
};

/// Aggregated enrichment of one entity.
///
/// Holds exactly one outcome per requested source. It is built fresh for
/// every enrichment call and handed to the reporting side; it is never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub entity: Entity,
    pub sources: BTreeMap<SourceKind, SourceOutcome>,
}

impl EnrichmentResult {
    pub fn new(entity: Entity) -> Self {
        Self {
            entity,
            sources: BTreeMap::new(),
        }
    }

    pub fn record(&mut self, kind: SourceKind, outcome: SourceOutcome) {
        self.sources.insert(kind, outcome);
    }

    pub fn get(&self, kind: SourceKind) -> Option<&SourceOutcome> {
        self.sources.get(&kind)
    }

    /// The recorded outcome for `kind`, or `not_configured` when the source
    /// was never requested.
    pub fn outcome_or_missing(&self, kind: SourceKind) -> SourceOutcome {
        self.sources.get(&kind).cloned().unwrap_or(
            SourceOutcome::Unavailable(UnavailableReason::NotConfigured),
        )
    }

    /// True when every requested source has an entry.
    pub fn covers(&self, requested: &BTreeSet<SourceKind>) -> bool {
        requested.iter().all(|kind| self.sources.contains_key(kind))
    }

    pub fn successes(&self) -> usize {
        self.sources.values().filter(|o| o.is_success()).count()
    }

    pub fn reputation(&self) -> Option<&ReputationRecord> {
        match self.data(SourceKind::Reputation)? {
            SourceData::Reputation(record) => Some(record),
            _ => None,
        }
    }

    pub fn fingerprint(&self) -> Option<&FingerprintRecord> {
        match self.data(SourceKind::Fingerprint)? {
            SourceData::Fingerprint(record) => Some(record),
            _ => None,
        }
    }

    pub fn vuln_hits(&self) -> &[VulnSearchHit] {
        match self.data(SourceKind::VulnSearch) {
            Some(SourceData::VulnSearch(hits)) => hits,
            _ => &[],
        }
    }

    pub fn cves(&self) -> &[CveRecord] {
        match self.data(SourceKind::VulnDb) {
            Some(SourceData::VulnDb(cves)) => cves,
            _ => &[],
        }
    }

    fn data(&self, kind: SourceKind) -> Option<&SourceData> {
        self.sources.get(&kind).and_then(SourceOutcome::data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_requires_every_requested_source() {
        let mut result = EnrichmentResult::new(Entity::ip("8.8.8.8"));
        result.record(
            SourceKind::Reputation,
            SourceOutcome::Success(SourceData::Reputation(
                ReputationRecord::default(),
            )),
        );

        let requested: BTreeSet<_> =
            [SourceKind::Reputation, SourceKind::Fingerprint].into();
        assert!(!result.covers(&requested));

        result.record(
            SourceKind::Fingerprint,
            SourceOutcome::Unavailable(UnavailableReason::Timeout),
        );
        assert!(result.covers(&requested));
        assert_eq!(result.successes(), 1);
        assert!(result.fingerprint().is_none());
        assert!(result.reputation().is_some());
    }

    #[test]
    fn serializes_source_names_as_keys() {
        let mut result = EnrichmentResult::new(Entity::ip("8.8.8.8"));
        result.record(
            SourceKind::VulnDb,
            SourceOutcome::Unavailable(UnavailableReason::UnsupportedEntity),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["sources"]["vuln_db"]["value"]["reason"],
            "unsupported_entity"
        );
        let back: EnrichmentResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}

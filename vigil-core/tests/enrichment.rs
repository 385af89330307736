use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use mockall::mock;
use vigil_core::cache::{CacheStore, MemoryCache};
use vigil_core::{Enricher, IntelSource};
use vigil_model::{
    Entity, ReputationRecord, SourceData, SourceKind, SourceOutcome,
    UnavailableReason,
};

mock! {
    Source {}

    #[async_trait]
    impl IntelSource for Source {
        fn kind(&self) -> SourceKind;
        async fn query(
            &self,
            entity: &Entity,
        ) -> Result<SourceData, UnavailableReason>;
    }
}

fn benign() -> SourceData {
    SourceData::Reputation(ReputationRecord {
        ip: "8.8.8.8".into(),
        classification: "benign".into(),
        noise: false,
        riot: true,
        name: "Google Public DNS".into(),
        last_seen: "2025-01-01".into(),
    })
}

fn sources(kinds: &[SourceKind]) -> BTreeSet<SourceKind> {
    kinds.iter().copied().collect()
}

#[tokio::test]
async fn reputation_hit_is_served_from_cache_on_second_call() {
    let mut mock = MockSource::new();
    mock.expect_kind().return_const(SourceKind::Reputation);
    mock.expect_query().times(1).returning(|_| Ok(benign()));

    let cache = Arc::new(MemoryCache::new());
    let enricher = Enricher::new(cache.clone()).with_source(Arc::new(mock));
    let entity = Entity::ip("8.8.8.8");
    let wanted = sources(&[SourceKind::Reputation]);

    let first = enricher.enrich(&entity, &wanted).await;
    let record = first.reputation().expect("reputation present");
    assert_eq!(record.classification, "benign");
    assert!(!record.noise);

    let second = enricher.enrich(&entity, &wanted).await;
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(
        cache
            .get("greynoise:8.8.8.8")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn failures_are_retried_on_next_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut mock = MockSource::new();
    mock.expect_kind().return_const(SourceKind::Reputation);
    mock.expect_query().times(2).returning(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(UnavailableReason::HttpStatus { status: 503 })
        } else {
            Ok(benign())
        }
    });

    let enricher =
        Enricher::new(Arc::new(MemoryCache::new())).with_source(Arc::new(mock));
    let entity = Entity::ip("8.8.8.8");
    let wanted = sources(&[SourceKind::Reputation]);

    let first = enricher.enrich(&entity, &wanted).await;
    assert_eq!(
        first.get(SourceKind::Reputation),
        Some(&SourceOutcome::Unavailable(UnavailableReason::HttpStatus {
            status: 503
        }))
    );

    let second = enricher.enrich(&entity, &wanted).await;
    assert!(second.get(SourceKind::Reputation).unwrap().is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn every_requested_source_gets_an_entry() {
    let mut failing = MockSource::new();
    failing.expect_kind().return_const(SourceKind::Fingerprint);
    failing
        .expect_query()
        .returning(|_| Err(UnavailableReason::Timeout));
    let mut working = MockSource::new();
    working.expect_kind().return_const(SourceKind::Reputation);
    working.expect_query().returning(|_| Ok(benign()));

    let enricher = Enricher::new(Arc::new(MemoryCache::new()))
        .with_sources([
            Arc::new(failing) as Arc<dyn IntelSource>,
            Arc::new(working) as Arc<dyn IntelSource>,
        ]);
    let wanted = sources(&SourceKind::ALL);
    let result = enricher.enrich(&Entity::ip("8.8.8.8"), &wanted).await;

    assert!(result.covers(&wanted));
    assert_eq!(result.sources.len(), 4);
    assert!(result.get(SourceKind::Reputation).unwrap().is_success());
    assert_eq!(
        result.get(SourceKind::Fingerprint).unwrap().reason(),
        Some(&UnavailableReason::Timeout)
    );
    assert_eq!(
        result.get(SourceKind::VulnDb).unwrap().reason(),
        Some(&UnavailableReason::NotConfigured)
    );
}

#[tokio::test]
async fn sources_only_see_their_own_cache_entries() {
    let mut reputation = MockSource::new();
    reputation.expect_kind().return_const(SourceKind::Reputation);
    reputation.expect_query().times(1).returning(|_| Ok(benign()));
    let mut fingerprint = MockSource::new();
    fingerprint.expect_kind().return_const(SourceKind::Fingerprint);
    fingerprint
        .expect_query()
        .times(1)
        .returning(|_| Err(UnavailableReason::MissingCredential));

    let enricher = Enricher::new(Arc::new(MemoryCache::new()))
        .with_source(Arc::new(reputation))
        .with_source(Arc::new(fingerprint));
    let entity = Entity::ip("8.8.8.8");

    enricher
        .enrich(&entity, &sources(&[SourceKind::Reputation]))
        .await;
    let result = enricher
        .enrich(&entity, &sources(&[SourceKind::Fingerprint]))
        .await;
    assert_eq!(
        result.get(SourceKind::Fingerprint).unwrap().reason(),
        Some(&UnavailableReason::MissingCredential)
    );
    assert!(result.get(SourceKind::Reputation).is_none());
}

struct SlowSource {
    delay: Duration,
}

#[async_trait]
impl IntelSource for SlowSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fingerprint
    }

    async fn query(
        &self,
        _entity: &Entity,
    ) -> Result<SourceData, UnavailableReason> {
        tokio::time::sleep(self.delay).await;
        Ok(SourceData::Fingerprint(Default::default()))
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_drops_slow_lookups_without_caching() {
    let cache = Arc::new(MemoryCache::new());
    let enricher =
        Enricher::new(cache.clone()).with_source(Arc::new(SlowSource {
            delay: Duration::from_secs(60),
        }));
    let wanted = sources(&[SourceKind::Fingerprint]);

    let result = enricher
        .enrich_within(&Entity::ip("1.2.3.4"), &wanted, Duration::from_secs(5))
        .await;
    assert_eq!(
        result.get(SourceKind::Fingerprint).unwrap().reason(),
        Some(&UnavailableReason::DeadlineExceeded)
    );
    assert!(cache.is_empty());

    let result = enricher
        .enrich_within(
            &Entity::ip("1.2.3.4"),
            &wanted,
            Duration::from_secs(120),
        )
        .await;
    assert!(result.get(SourceKind::Fingerprint).unwrap().is_success());
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn cached_results_expire_after_ttl() {
    let mut mock = MockSource::new();
    mock.expect_kind().return_const(SourceKind::Reputation);
    mock.expect_query().times(2).returning(|_| Ok(benign()));

    let enricher =
        Enricher::new(Arc::new(MemoryCache::new())).with_source(Arc::new(mock));
    let entity = Entity::ip("8.8.8.8");
    let wanted = sources(&[SourceKind::Reputation]);

    enricher.enrich(&entity, &wanted).await;
    tokio::time::advance(Duration::from_secs(1800)).await;
    enricher.enrich(&entity, &wanted).await;
    tokio::time::advance(Duration::from_secs(1801)).await;
    enricher.enrich(&entity, &wanted).await;
}

#[tokio::test]
async fn many_entities_are_each_enriched_once() {
    let mut mock = MockSource::new();
    mock.expect_kind().return_const(SourceKind::Reputation);
    mock.expect_query().times(3).returning(|entity| {
        Ok(SourceData::Reputation(ReputationRecord {
            ip: entity.canonical_key(),
            ..Default::default()
        }))
    });

    let enricher =
        Enricher::new(Arc::new(MemoryCache::new())).with_source(Arc::new(mock));
    let wanted = sources(&[SourceKind::Reputation]);
    let entities = futures::stream::iter(vec![
        Entity::ip("1.1.1.1"),
        Entity::ip("2.2.2.2"),
        Entity::ip("3.3.3.3"),
    ]);

    let mut seen: Vec<String> = enricher
        .enrich_many(entities, &wanted, 2, None)
        .map(|result| result.reputation().unwrap().ip.clone())
        .collect()
        .await;
    seen.sort();
    assert_eq!(seen, vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
}

//! Enrichment orchestrator.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use tracing::{debug, info, warn};
use vigil_model::{
    EnrichmentResult, Entity, FailureClass, SourceKind, SourceOutcome,
    UnavailableReason,
};

use crate::cache::{CacheKey, CacheStore, ENTRY_TTL, cache_aside};
use crate::intel::IntelSource;

/// Fans an entity out to the requested sources through the cache. Source
/// successes are cached for [`ENTRY_TTL`].
///
/// Every requested source gets exactly one entry in the result. A source
/// with no registered adapter is reported as `not_configured`.
#[derive(Clone)]
pub struct Enricher {
    cache: Arc<dyn CacheStore>,
    sources: HashMap<SourceKind, Arc<dyn IntelSource>>,
}

impl fmt::Debug for Enricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.sources.keys().collect();
        kinds.sort();
        f.debug_struct("Enricher")
            .field("cache", &self.cache)
            .field("sources", &kinds)
            .finish()
    }
}

impl Enricher {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            sources: HashMap::new(),
        }
    }

    /// Registers `source`, replacing any adapter of the same kind.
    pub fn with_source(mut self, source: Arc<dyn IntelSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    pub fn with_sources<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn IntelSource>>,
    {
        for source in sources {
            self.sources.insert(source.kind(), source);
        }
        self
    }

    /// Queries every requested source concurrently.
    pub async fn enrich(
        &self,
        entity: &Entity,
        sources: &BTreeSet<SourceKind>,
    ) -> EnrichmentResult {
        self.enrich_inner(entity, sources, None).await
    }

    /// Like [`Enricher::enrich`], but each source lookup is abandoned once
    /// `deadline` elapses. An abandoned lookup writes nothing to the cache
    /// and is recorded as `deadline_exceeded`.
    pub async fn enrich_within(
        &self,
        entity: &Entity,
        sources: &BTreeSet<SourceKind>,
        deadline: Duration,
    ) -> EnrichmentResult {
        self.enrich_inner(entity, sources, Some(deadline)).await
    }

    /// Enriches a stream of entities with at most `concurrency` entities in
    /// flight. Results arrive in completion order.
    pub fn enrich_many<'a, S>(
        &'a self,
        entities: S,
        sources: &'a BTreeSet<SourceKind>,
        concurrency: usize,
        deadline: Option<Duration>,
    ) -> impl Stream<Item = EnrichmentResult> + 'a
    where
        S: Stream<Item = Entity> + 'a,
    {
        entities
            .map(move |entity| async move {
                self.enrich_inner(&entity, sources, deadline).await
            })
            .buffer_unordered(concurrency.max(1))
    }

    async fn enrich_inner(
        &self,
        entity: &Entity,
        sources: &BTreeSet<SourceKind>,
        deadline: Option<Duration>,
    ) -> EnrichmentResult {
        let lookups = sources.iter().map(|&kind| async move {
            let outcome = match deadline {
                Some(limit) => {
                    match tokio::time::timeout(limit, self.lookup(entity, kind))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => SourceOutcome::Unavailable(
                            UnavailableReason::DeadlineExceeded,
                        ),
                    }
                }
                None => self.lookup(entity, kind).await,
            };
            (kind, outcome)
        });

        let mut result = EnrichmentResult::new(entity.clone());
        for (kind, outcome) in join_all(lookups).await {
            if let SourceOutcome::Unavailable(reason) = &outcome {
                log_unavailable(entity, kind, reason);
            }
            result.record(kind, outcome);
        }

        debug!(
            entity = %entity,
            requested = sources.len(),
            succeeded = result.successes(),
            "enrichment complete"
        );
        result
    }

    async fn lookup(&self, entity: &Entity, kind: SourceKind) -> SourceOutcome {
        let Some(source) = self.sources.get(&kind) else {
            return SourceOutcome::Unavailable(UnavailableReason::NotConfigured);
        };
        let key = CacheKey::new(kind, entity);
        cache_aside(self.cache.as_ref(), &key, ENTRY_TTL, source.query(entity))
            .await
            .into()
    }
}

fn log_unavailable(
    entity: &Entity,
    kind: SourceKind,
    reason: &UnavailableReason,
) {
    match reason.class() {
        FailureClass::Configuration => debug!(
            source = %kind,
            entity = %entity,
            reason = reason.code(),
            class = "configuration",
            "source unavailable"
        ),
        FailureClass::Validation => info!(
            source = %kind,
            entity = %entity,
            reason = %reason,
            class = "validation",
            "entity rejected by source"
        ),
        FailureClass::Transient => warn!(
            source = %kind,
            entity = %entity,
            reason = %reason,
            class = "transient",
            "source lookup failed"
        ),
    }
}

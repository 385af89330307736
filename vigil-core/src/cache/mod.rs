//! Cache layer.
//!
//! Entries are opaque JSON strings with a per-entry TTL. Expired entries
//! read as absent; there is no eviction sweep. The read-check-fetch-write
//! sequence in [`cache_aside`] is not atomic, so two concurrent misses on
//! the same key may both reach the upstream.

mod memory;
mod redis_cache;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, info, warn};
use vigil_model::{Entity, SourceKind};

pub use self::memory::{CacheEntry, MemoryCache};
pub use self::redis_cache::RedisCache;

/// Lifetime of every cached source success.
pub const ENTRY_TTL: Duration = Duration::from_secs(3600);

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("redis connection timed out")]
    ConnectTimeout,
    #[error("cache value codec failed: {0}")]
    Codec(#[from] serde_json::Error),
}

#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

/// Namespaced key of one source's result for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(source: SourceKind, entity: &Entity) -> Self {
        Self(format!("{}:{}", source.provider(), entity.canonical_key()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the cached value for `key`, or runs `fetch` and caches its
/// success for `ttl`.
///
/// Failures of `fetch` are returned as-is and never written. Cache
/// backend and codec errors degrade to a miss or a dropped write.
pub async fn cache_aside<T, E, F>(
    store: &dyn CacheStore,
    key: &CacheKey,
    ttl: Duration,
    fetch: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: Future<Output = Result<T, E>>,
{
    match store.get(key.as_str()).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "cache hit");
                return Ok(value);
            }
            Err(err) => {
                warn!(
                    key = %key,
                    error = %err,
                    "discarding undecodable cache entry"
                );
            }
        },
        Ok(None) => debug!(key = %key, "cache miss"),
        Err(err) => {
            warn!(
                key = %key,
                error = %err,
                "cache read failed; treating as miss"
            );
        }
    }

    let value = fetch.await?;

    match serde_json::to_string(&value) {
        Ok(raw) => {
            if let Err(err) = store.set(key.as_str(), raw, ttl).await {
                warn!(key = %key, error = %err, "cache write failed");
            }
        }
        Err(err) => warn!(key = %key, error = %err, "cache encode failed"),
    }

    Ok(value)
}

/// Connects to Redis when a URL is configured, otherwise (or when Redis is
/// unreachable) returns an in-process cache.
pub async fn connect(redis_url: Option<&str>) -> Arc<dyn CacheStore> {
    let Some(url) = redis_url else {
        info!("no REDIS_URL configured; using in-process cache");
        return Arc::new(MemoryCache::new());
    };

    match tokio::time::timeout(REDIS_CONNECT_TIMEOUT, RedisCache::new(url))
        .await
    {
        Ok(Ok(cache)) => Arc::new(cache),
        Ok(Err(err)) => {
            warn!(
                error = %err,
                "redis unavailable; falling back to in-process cache"
            );
            Arc::new(MemoryCache::new())
        }
        Err(_) => {
            warn!(
                error = %CacheError::ConnectTimeout,
                "redis unavailable; falling back to in-process cache"
            );
            Arc::new(MemoryCache::new())
        }
    }
}

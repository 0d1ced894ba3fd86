//! Cache provider implementations (spec §4.4): `LOCAL`, `DISTRIBUTED`,
//! `TIERED`, `NOOP`, all behind one object-safe trait so `CacheEngine` can
//! hot-swap between them at runtime.

use crate::error::CacheError;
use crate::single_flight::SingleFlight;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Local,
    Distributed,
    Tiered,
    Noop,
}

/// A cached value plus whether it was served stale (spec §4.3's "cached
/// value tagged `stale=true`" fallback contract).
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub bytes: Vec<u8>,
    pub stale: bool,
}

/// Object-safe cache provider; every tier (and the tiered composite)
/// implements this so `CacheEngine` can hold one behind an `ArcSwap`.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;
    async fn get(&self, key: &str) -> Option<CachedValue>;
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration);
    async fn invalidate(&self, key: &str);
}

/// In-process bounded cache. `moka::future::Cache` gives the
/// bounded-LRU/W-TinyLFU-style eviction and per-entry TTL the spec requires
/// without hand-rolling an eviction policy.
pub struct LocalCache {
    inner: moka::future::Cache<String, Vec<u8>>,
}

impl LocalCache {
    pub fn new(capacity: u64, default_ttl: Duration) -> Self {
        let inner = moka::future::Cache::builder().max_capacity(capacity).time_to_live(default_ttl).build();
        Self { inner }
    }
}

#[async_trait]
impl CacheProvider for LocalCache {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn get(&self, key: &str) -> Option<CachedValue> {
        self.inner.get(key).await.map(|bytes| CachedValue { bytes, stale: false })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _ttl: Duration) {
        self.inner.insert(key.to_string(), bytes).await;
    }

    async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

/// The collaborator boundary for an L2 distributed cache (e.g. Redis); spec
/// §1 excludes a general-purpose cache library, so only the trait a
/// production backend implements lives here, plus an in-memory stand-in for
/// tests.
#[async_trait]
pub trait DistributedBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn invalidate(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct InMemoryDistributedBackend {
    store: AsyncMutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryDistributedBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedBackend for InMemoryDistributedBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.store.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _ttl: Duration) -> Result<(), CacheError> {
        self.store.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.store.lock().await.remove(key);
        Ok(())
    }
}

/// A provider that never stores anything — used when `cache.provider =
/// noop` to disable caching without special-casing call sites.
pub struct NoopCache;

#[async_trait]
impl CacheProvider for NoopCache {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Noop
    }

    async fn get(&self, _key: &str) -> Option<CachedValue> {
        None
    }

    async fn put(&self, _key: &str, _bytes: Vec<u8>, _ttl: Duration) {}

    async fn invalidate(&self, _key: &str) {}
}

/// L1 in-process + L2 distributed, single-flighting concurrent L2 misses
/// for the same key (spec §4.4 "Concurrency"). Read path: L1 lookup, then on
/// miss an L2 lookup, promoting a hit back into L1. Write path: writes both
/// tiers; L2 failure is logged and never propagates (graceful degradation).
pub struct TieredCache {
    l1: LocalCache,
    l2: Arc<dyn DistributedBackend>,
    default_ttl: Duration,
    inflight: SingleFlight,
}

impl TieredCache {
    pub fn new(l1: LocalCache, l2: Arc<dyn DistributedBackend>, default_ttl: Duration) -> Self {
        Self { l1, l2, default_ttl, inflight: SingleFlight::new() }
    }
}

#[async_trait]
impl CacheProvider for TieredCache {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tiered
    }

    async fn get(&self, key: &str) -> Option<CachedValue> {
        if let Some(hit) = self.l1.get(key).await {
            return Some(hit);
        }

        let l2 = self.l2.clone();
        let key_owned = key.to_string();
        let result = self
            .inflight
            .run(key, move || {
                let l2 = l2.clone();
                let key_owned = key_owned.clone();
                async move { l2.get(&key_owned).await.ok().flatten() }
            })
            .await;

        if let Some(bytes) = result {
            self.l1.put(key, bytes.clone(), self.default_ttl).await;
            return Some(CachedValue { bytes, stale: false });
        }
        None
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        self.l1.put(key, bytes.clone(), ttl).await;
        if let Err(err) = self.l2.put(key, bytes, ttl).await {
            tracing::warn!(key, error = %err, "l2 cache write failed, l1 write still applied");
        }
    }

    async fn invalidate(&self, key: &str) {
        self.l1.invalidate(key).await;
        if let Err(err) = self.l2.invalidate(key).await {
            tracing::warn!(key, error = %err, "l2 cache invalidate failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tiered_promotes_an_l2_hit_into_l1() {
        let l2 = Arc::new(InMemoryDistributedBackend::new());
        l2.put("k", b"value".to_vec(), Duration::from_secs(60)).await.unwrap();
        let cache = TieredCache::new(LocalCache::new(100, Duration::from_secs(60)), l2, Duration::from_secs(60));

        let first = cache.get("k").await.unwrap();
        assert_eq!(first.bytes, b"value");

        let second = cache.l1.get("k").await.unwrap();
        assert_eq!(second.bytes, b"value");
    }

    #[tokio::test]
    async fn noop_cache_never_retains_writes() {
        let cache = NoopCache;
        cache.put("k", b"v".to_vec(), Duration::from_secs(1)).await;
        assert!(cache.get("k").await.is_none());
    }
}

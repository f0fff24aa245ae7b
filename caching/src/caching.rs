use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache as MokaCache;

/// Read-through cache for derived views.
///
/// Values are stored as JSON so callers on both sides of a crate
/// boundary agree on the representation without sharing types.
#[derive(Clone)]
pub struct Cache {
    inner: MokaCache<String, serde_json::Value>,
}

impl Cache {
    pub fn new(capacity: u64) -> Self {
        Cache {
            inner: MokaCache::new(capacity),
        }
    }

    /// Like [`Cache::new`], but entries also expire `ttl` after the
    /// write that produced them.
    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        Cache {
            inner: MokaCache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: String, value: serde_json::Value) -> Result<()> {
        self.inner.insert(key, value).await;
        Ok(())
    }

    /// Returns the cached value for `key`, running `init` to fill the
    /// entry on a miss. Concurrent callers for the same key share one
    /// `init` run.
    pub async fn try_get_with<F, E>(
        &self,
        key: String,
        init: F,
    ) -> Result<serde_json::Value, Arc<E>>
    where
        F: Future<Output = Result<serde_json::Value, E>>,
        E: Send + Sync + 'static,
    {
        self.inner.try_get_with(key, init).await
    }

    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

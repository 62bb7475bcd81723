use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use moka::Expiry;
use moka::future::Cache;
use serde_json::Value;
use tracing::debug;

use crate::cache::{DEFAULT_TTL, QueryCache};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
struct CachedValue {
    value: Value,
    ttl: Duration,
}

/// Each entry expires after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &CachedValue, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by moka. Concurrent misses on one key share a
/// single computation.
///
/// Entries live under `key#epoch`, where the epoch is the generation of the
/// latest flush covering `key`. A flush moves the covered keys to a new epoch,
/// so a computation that started before it can neither be joined by later
/// readers nor be found once it finishes.
pub struct MokaQueryCache {
    inner: Cache<String, CachedValue>,
    default_ttl: Duration,
    generation: AtomicU64,
    /// prefix → generation of its latest flush; "" covers every key
    flushed: RwLock<HashMap<String, u64>>,
}

impl MokaQueryCache {
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self {
            inner,
            default_ttl,
            generation: AtomicU64::new(0),
            flushed: RwLock::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> AppResult<String> {
        let flushed = self
            .flushed
            .read()
            .map_err(|_| AppError::Store("cache epoch table lock poisoned".to_string()))?;
        let epoch = flushed
            .iter()
            .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
            .map(|(_, generation)| *generation)
            .max()
            .unwrap_or(0);
        Ok(format!("{}#{}", key, epoch))
    }

    fn advance_epoch(&self, prefix: &str) -> AppResult<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut flushed = self
            .flushed
            .write()
            .map_err(|_| AppError::Store("cache epoch table lock poisoned".to_string()))?;
        let entry = flushed.entry(prefix.to_string()).or_insert(generation);
        *entry = (*entry).max(generation);
        Ok(())
    }
}

impl Default for MokaQueryCache {
    fn default() -> Self {
        Self::new(10_000, DEFAULT_TTL)
    }
}

#[async_trait]
impl QueryCache for MokaQueryCache {
    async fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let slot = self.slot(key)?;
        Ok(self.inner.get(&slot).await.map(|cached| cached.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<()> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.inner
            .insert(self.slot(key)?, CachedValue { value, ttl })
            .await;
        Ok(())
    }

    async fn del(&self, key: &str) -> AppResult<()> {
        let slot = self.slot(key)?;
        self.inner.invalidate(&slot).await;
        Ok(())
    }

    async fn flush_all(&self) -> AppResult<()> {
        self.advance_epoch("")?;
        self.inner.invalidate_all();
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<()> {
        self.advance_epoch(prefix)?;
        let prefix = prefix.to_string();
        self.inner
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map_err(|e| AppError::Store(format!("cache invalidation failed: {}", e)))?;
        Ok(())
    }

    async fn entry_count(&self) -> AppResult<u64> {
        self.inner.run_pending_tasks().await;
        Ok(self.inner.entry_count())
    }

    async fn get_or_compute(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: BoxFuture<'_, AppResult<Value>>,
    ) -> AppResult<Value> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let slot = self.slot(key)?;
        let cached = self
            .inner
            .try_get_with(slot.clone(), async move {
                compute.await.map(|value| CachedValue { value, ttl })
            })
            .await?;

        // flushed while computing: the result answers this call only
        if self.slot(key)? != slot {
            debug!(key, "Dropping value computed before a flush");
            self.inner.invalidate(&slot).await;
        }
        Ok(cached.value)
    }
}

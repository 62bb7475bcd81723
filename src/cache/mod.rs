//! Query-result cache: a pluggable key → JSON store with per-entry TTL.
//!
//! The analytics layer only talks to [`QueryCache`]; the default adapter is the
//! process-local [`MokaQueryCache`]. A shared external cache can be dropped in
//! behind the same trait for multi-instance deployments.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::AppResult;

pub mod invalidation;
pub mod moka_cache;

pub use invalidation::{CacheInvalidationHook, WriteEvent};
pub use moka_cache::MokaQueryCache;

/// TTL applied by `set` when the caller gives none.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Stored value, or `None` when absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<Value>>;

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> AppResult<()>;

    async fn del(&self, key: &str) -> AppResult<()>;

    async fn flush_all(&self) -> AppResult<()>;

    /// Drop every entry whose key starts with `prefix`.
    async fn delete_prefix(&self, prefix: &str) -> AppResult<()>;

    async fn entry_count(&self) -> AppResult<u64>;

    /// Return the cached value or run `compute` and store its result.
    ///
    /// This default is not coalescing: concurrent misses each run `compute`.
    /// Adapters that can do better override it.
    async fn get_or_compute(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: BoxFuture<'_, AppResult<Value>>,
    ) -> AppResult<Value> {
        if let Some(hit) = self.get(key).await? {
            return Ok(hit);
        }
        let value = compute.await?;
        self.set(key, value.clone(), ttl).await?;
        Ok(value)
    }
}

/// Canonical cache key: `namespace:{sorted params}`.
///
/// Keys are sorted and `null` fields dropped, so equal filter sets produce the
/// same key regardless of construction order or which fields were left unset.
pub fn generate_key<P: Serialize>(namespace: &str, params: &P) -> AppResult<String> {
    let canonical = match serde_json::to_value(params)? {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().filter(|(_, v)| !v.is_null()).collect();
            serde_json::to_string(&sorted)?
        }
        Value::Null => "{}".to_string(),
        other => serde_json::to_string(&other)?,
    };
    Ok(format!("{}:{}", namespace, canonical))
}

pub async fn get_json<T: DeserializeOwned>(cache: &dyn QueryCache, key: &str) -> AppResult<Option<T>> {
    match cache.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize>(
    cache: &dyn QueryCache,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> AppResult<()> {
    cache.set(key, serde_json::to_value(value)?, ttl).await
}

// Cache client abstraction
//
// Every component that caches data receives a cache client by injection,
// never through a module-level singleton, so tests can substitute the
// in-memory implementation. The trait covers exactly the operations the
// platform needs: point reads/writes with TTL and eager prefix
// invalidation of a tenant+restaurant namespace.

pub mod etag;
pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use redis::RedisCache;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Backend-agnostic cache client.
///
/// Implementations must be safe for concurrent use; all methods take
/// `&self` and rely on interior mutability or external storage.
#[async_trait]
pub trait CacheClient: Send + Sync {
    /// Retrieve raw bytes by key, `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store raw bytes with an optional TTL.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove a single key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key matching a prefix pattern (e.g. `tenant:{t}:restaurant:{r}:*`).
    ///
    /// Returns the number of keys removed. Invalidation is coarse-grained
    /// and eager: callers pass a whole namespace, not individual keys.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
}

/// Shared handle used throughout the application.
pub type SharedCache = Arc<dyn CacheClient>;

/// Fetch and deserialize a JSON value, treating malformed cached bytes as a miss.
///
/// A cache entry that no longer deserializes (e.g. after a deploy changed
/// the shape) must never poison the caller; it is evicted and reported as
/// absent so the caller recomputes.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheClient,
    key: &str,
) -> Result<Option<T>, CacheError> {
    let Some(bytes) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::warn!("Evicting undeserializable cache entry {}: {}", key, err);
            cache.delete(key).await?;
            Ok(None)
        }
    }
}

/// Serialize and store a JSON value with an optional TTL.
pub async fn set_json<T: Serialize>(
    cache: &dyn CacheClient,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), CacheError> {
    let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
    cache.set(key, bytes, ttl).await
}

/// Build the cache namespace for a tenant+restaurant pair.
///
/// Every derived read model for the pair (menu listings, per-category
/// listings, pricing snapshots) lives under this prefix so a single
/// `invalidate_pattern(&format!("{}:*", ns))` clears all of them.
pub fn restaurant_namespace(tenant_id: Uuid, restaurant_id: Uuid) -> String {
    format!("tenant:{}:restaurant:{}", tenant_id, restaurant_id)
}

/// Build a composite cache key from parts.
pub fn composite_key(parts: &[&str]) -> String {
    parts.join(":")
}

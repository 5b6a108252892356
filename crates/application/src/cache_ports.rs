use async_trait::async_trait;
use cloudgate_core::AppResult;

/// Key/value cache with TTL and pattern invalidation.
///
/// Implementations own key namespacing; callers pass logical keys.
#[async_trait]
pub trait ResourceCache: Send + Sync {
    /// Returns the cached payload for a key, or `None` on miss.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores a payload for `ttl_seconds`. A zero ttl stores nothing.
    async fn set(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()>;

    /// Deletes every key matching a pattern whose only wildcard is a trailing `*`.
    ///
    /// Returns the number of deleted keys.
    async fn delete_matching(&self, pattern: &str) -> AppResult<u64>;
}

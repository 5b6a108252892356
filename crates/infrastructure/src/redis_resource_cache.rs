//! Redis-backed resource view cache.

use async_trait::async_trait;
use cloudgate_application::ResourceCache;
use cloudgate_core::{AppError, AppResult};
use redis::AsyncCommands;

use crate::in_memory_resource_cache::literal_prefix;

const SCAN_BATCH_SIZE: u32 = 500;

/// Redis implementation of the resource cache port.
#[derive(Clone)]
pub struct RedisResourceCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisResourceCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &str) -> String {
        format!("{}:{key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl ResourceCache for RedisResourceCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read resource cache entry '{key}': {error}"
            ))
        })
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let mut connection = self.connection().await?;

        connection
            .set_ex(self.key_for(key), value, u64::from(ttl_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write resource cache entry '{key}': {error}"
                ))
            })
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let prefix = literal_prefix(pattern)?;
        let match_pattern = format!("{}*", self.key_for(prefix));
        let mut connection = self.connection().await?;
        let mut cursor = 0_u64;
        let mut deleted = 0_u64;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(match_pattern.as_str())
                .arg("COUNT")
                .arg(SCAN_BATCH_SIZE)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to scan resource cache keys for '{pattern}': {error}"
                    ))
                })?;

            if !keys.is_empty() {
                let removed: u64 = connection.del(&keys).await.map_err(|error| {
                    AppError::Internal(format!(
                        "failed to delete resource cache keys for '{pattern}': {error}"
                    ))
                })?;
                deleted = deleted.saturating_add(removed);
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(deleted)
    }
}

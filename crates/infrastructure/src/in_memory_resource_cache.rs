use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cloudgate_application::ResourceCache;
use cloudgate_core::{AppError, AppResult};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct ResourceCacheEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory cache adapter for resource views.
#[derive(Default)]
pub struct InMemoryResourceCache {
    entries: RwLock<HashMap<String, ResourceCacheEntry>>,
}

impl InMemoryResourceCache {
    /// Creates an empty in-memory resource cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceCache for InMemoryResourceCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u32) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        let mut entries = self.entries.write().await;
        // Expired entries are dropped on every write.
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_owned(),
            ResourceCacheEntry {
                value: value.to_owned(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let prefix = literal_prefix(pattern)?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));

        Ok((before - entries.len()) as u64)
    }
}

pub(crate) fn literal_prefix(pattern: &str) -> AppResult<&str> {
    let prefix = pattern.strip_suffix('*').unwrap_or(pattern);
    if prefix.contains(['*', '?', '[']) {
        return Err(AppError::Validation(format!(
            "cache pattern '{pattern}' may only use a trailing '*'"
        )));
    }

    Ok(prefix)
}

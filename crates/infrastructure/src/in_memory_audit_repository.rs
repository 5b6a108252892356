use std::cmp::Reverse;

use async_trait::async_trait;
use cloudgate_application::{AuditEntry, AuditEntryFilter, AuditRepository};
use cloudgate_core::AppResult;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Process-local audit store for development and tests.
#[derive(Default)]
pub struct InMemoryAuditRepository {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, filter: &AuditEntryFilter) -> Vec<AuditEntry> {
        let mut matching: Vec<AuditEntry> = self
            .entries
            .read()
            .await
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect();
        matching.sort_by_key(|entry| Reverse((entry.created_at, entry.id)));
        matching
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append_entries(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn list_entries(
        &self,
        filter: &AuditEntryFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .matching(filter)
            .await
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count_entries(&self, filter: &AuditEntryFilter) -> AppResult<u64> {
        Ok(self.matching(filter).await.len() as u64)
    }

    async fn find_entry(&self, id: Uuid) -> AppResult<Option<AuditEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .find(|entry| entry.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use cloudgate_application::{AuditEntry, AuditEntryFilter, AuditRepository};
    use cloudgate_domain::{ActionStatus, ResourceType};
    use serde_json::json;
    use uuid::Uuid;

    use super::InMemoryAuditRepository;

    fn entry(action: &str, minutes_ago: i64) -> AuditEntry {
        AuditEntry {
            id: Uuid::new_v4(),
            actor: Some("alice".to_owned()),
            actor_email: None,
            action: action.to_owned(),
            resource_type: ResourceType::Database.into(),
            resource_id: "db-1".to_owned(),
            account_id: "123456789012".to_owned(),
            region: "us-east-1".to_owned(),
            request_snapshot: json!({}),
            response_snapshot: json!({}),
            status: ActionStatus::Success,
            client_ip: None,
            client_agent: None,
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn lists_newest_first_with_offset() {
        let repository = InMemoryAuditRepository::new();
        let first = entry("database:stop", 30);
        let second = entry("database:start", 20);
        let third = entry("database:stop", 10);
        assert!(
            repository
                .append_entries(vec![first.clone(), second.clone(), third.clone()])
                .await
                .is_ok()
        );

        let Ok(page) = repository
            .list_entries(&AuditEntryFilter::default(), 2, 1)
            .await
        else {
            panic!("listing should succeed");
        };
        let ids: Vec<Uuid> = page.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let stops = AuditEntryFilter {
            action: Some("STOP".to_owned()),
            ..AuditEntryFilter::default()
        };
        assert!(matches!(repository.count_entries(&stops).await, Ok(2)));
        assert!(matches!(
            repository.find_entry(third.id).await,
            Ok(Some(found)) if found.id == third.id
        ));
    }
}

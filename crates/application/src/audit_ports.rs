use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudgate_core::AppResult;
use cloudgate_domain::{ActionStatus, AuditResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Upper bound on rows returned by one audit export.
pub const MAX_AUDIT_EXPORT: usize = 10_000;

/// Immutable record of one action against one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Stable entry identifier.
    pub id: Uuid,
    /// Subject of the caller, when known.
    pub actor: Option<String>,
    /// Email of the caller, when known.
    pub actor_email: Option<String>,
    /// Action name in `"<resource_type>:<verb>"` form.
    pub action: String,
    /// Targeted resource family, or provider account.
    pub resource_type: AuditResourceType,
    /// Targeted resource identifier.
    pub resource_id: String,
    /// Provider account of the target.
    pub account_id: String,
    /// Provider region of the target.
    pub region: String,
    /// Request parameters as received, minus secrets.
    pub request_snapshot: Value,
    /// Provider response or error description.
    pub response_snapshot: Value,
    /// Terminal action status.
    pub status: ActionStatus,
    /// Resolved client address.
    pub client_ip: Option<String>,
    /// Client user agent.
    pub client_agent: Option<String>,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

/// Filter for audit reads. Unset fields do not constrain results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditEntryFilter {
    /// Case-insensitive substring of the action name.
    pub action: Option<String>,
    /// Exact resource family.
    pub resource_type: Option<AuditResourceType>,
    /// Exact resource identifier.
    pub resource_id: Option<String>,
    /// Case-insensitive substring of the actor subject or email.
    pub actor: Option<String>,
    /// Exact actor subject.
    pub actor_subject: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
    /// Exact status.
    pub status: Option<ActionStatus>,
}

impl AuditEntryFilter {
    /// Returns whether an entry satisfies every set constraint.
    #[must_use]
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        let contains = |haystack: &str, needle: &str| {
            haystack.to_lowercase().contains(needle.to_lowercase().as_str())
        };

        self.action
            .as_deref()
            .is_none_or(|action| contains(entry.action.as_str(), action))
            && self
                .resource_type
                .is_none_or(|resource_type| entry.resource_type == resource_type)
            && self
                .resource_id
                .as_deref()
                .is_none_or(|resource_id| entry.resource_id == resource_id)
            && self.actor.as_deref().is_none_or(|actor| {
                entry
                    .actor
                    .as_deref()
                    .is_some_and(|subject| contains(subject, actor))
                    || entry
                        .actor_email
                        .as_deref()
                        .is_some_and(|email| contains(email, actor))
            })
            && self
                .actor_subject
                .as_deref()
                .is_none_or(|subject| entry.actor.as_deref() == Some(subject))
            && self.from.is_none_or(|from| entry.created_at >= from)
            && self.to.is_none_or(|to| entry.created_at <= to)
            && self.status.is_none_or(|status| entry.status == status)
    }
}

/// One page of audit entries ordered newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntryPage {
    /// Entries on this page.
    pub items: Vec<AuditEntry>,
    /// Total entries matching the filter.
    pub total: u64,
    /// 1-based page index.
    pub page: u32,
    /// Page size used.
    pub page_size: u32,
    /// Whether another page follows.
    pub has_more: bool,
}

/// Append-only persistence port for audit entries.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Inserts a batch of entries atomically.
    async fn append_entries(&self, entries: Vec<AuditEntry>) -> AppResult<()>;

    /// Lists matching entries ordered by `created_at` descending.
    async fn list_entries(
        &self,
        filter: &AuditEntryFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<AuditEntry>>;

    /// Counts matching entries.
    async fn count_entries(&self, filter: &AuditEntryFilter) -> AppResult<u64>;

    /// Finds one entry by id.
    async fn find_entry(&self, id: Uuid) -> AppResult<Option<AuditEntry>>;
}

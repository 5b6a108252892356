use std::sync::Arc;

use chrono::Utc;
use cloudgate_core::{AppError, AppResult, UserIdentity, UserRole};
use cloudgate_domain::{ActionStatus, AuditResourceType};
use serde_json::Value;
use tracing::error;
use uuid::Uuid;

use crate::audit_ports::{
    AuditEntry, AuditEntryFilter, AuditEntryPage, AuditRepository, MAX_AUDIT_EXPORT,
};
use crate::pagination::PageWindow;

/// Largest accepted audit page size.
pub const MAX_AUDIT_PAGE_SIZE: u32 = 100;

/// Transport metadata captured with every audited request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Raw `x-forwarded-for` header.
    pub forwarded_for: Option<String>,
    /// Raw `x-real-ip` header.
    pub real_ip: Option<String>,
    /// Transport peer address.
    pub peer_addr: Option<String>,
    /// Raw `user-agent` header.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Resolves the client address.
    ///
    /// Order: first forwarded-for hop, then real-ip, then the transport peer.
    #[must_use]
    pub fn client_ip(&self) -> Option<String> {
        let forwarded = self
            .forwarded_for
            .as_deref()
            .and_then(|header| header.split(',').next());

        [forwarded, self.real_ip.as_deref(), self.peer_addr.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    }
}

/// One audit write covering one or more resources.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecordInput {
    /// Caller, when known.
    pub actor: Option<UserIdentity>,
    /// Action name in `"<resource_type>:<verb>"` form.
    pub action: String,
    /// Targeted resource family, or provider account.
    pub resource_type: AuditResourceType,
    /// Targets; one entry is written per id.
    pub resource_ids: Vec<String>,
    /// Provider account of the targets.
    pub account_id: String,
    /// Provider region of the targets.
    pub region: String,
    /// Terminal status shared by every entry.
    pub status: ActionStatus,
    /// Request snapshot shared by every entry.
    pub request_snapshot: Value,
    /// Response snapshot shared by every entry.
    pub response_snapshot: Value,
    /// Transport metadata.
    pub context: RequestContext,
}

/// Audit writer and admin audit reads.
#[derive(Clone)]
pub struct AuditService {
    repository: Arc<dyn AuditRepository>,
}

impl AuditService {
    /// Creates an audit service.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditRepository>) -> Self {
        Self { repository }
    }

    /// Writes one entry per resource id in a single atomic batch.
    ///
    /// Persistence failures are returned as `AppError::Persistence`, never dropped.
    pub async fn record(&self, input: AuditRecordInput) -> AppResult<Vec<AuditEntry>> {
        if input.resource_ids.is_empty() {
            return Err(AppError::Validation(
                "audit record requires at least one resource id".to_owned(),
            ));
        }

        let created_at = Utc::now();
        let client_ip = input.context.client_ip();
        let entries: Vec<AuditEntry> = input
            .resource_ids
            .iter()
            .map(|resource_id| AuditEntry {
                id: Uuid::new_v4(),
                actor: input.actor.as_ref().map(|actor| actor.subject().to_owned()),
                actor_email: input
                    .actor
                    .as_ref()
                    .and_then(|actor| actor.email().map(ToOwned::to_owned)),
                action: input.action.clone(),
                resource_type: input.resource_type,
                resource_id: resource_id.clone(),
                account_id: input.account_id.clone(),
                region: input.region.clone(),
                request_snapshot: input.request_snapshot.clone(),
                response_snapshot: input.response_snapshot.clone(),
                status: input.status,
                client_ip: client_ip.clone(),
                client_agent: input.context.user_agent.clone(),
                created_at,
            })
            .collect();

        if let Err(persistence_error) = self.repository.append_entries(entries.clone()).await {
            error!(
                action = input.action.as_str(),
                status = input.status.as_str(),
                entries = entries.len(),
                error = %persistence_error,
                "failed to persist audit entries"
            );
            return Err(match persistence_error {
                AppError::Persistence(message) => AppError::Persistence(message),
                other => AppError::Persistence(format!(
                    "failed to persist {} audit entries for '{}': {other}",
                    entries.len(),
                    input.action
                )),
            });
        }

        Ok(entries)
    }

    /// Lists one page of audit entries, newest first.
    pub async fn list_entries(
        &self,
        actor: &UserIdentity,
        filter: &AuditEntryFilter,
        page: u32,
        page_size: u32,
    ) -> AppResult<AuditEntryPage> {
        actor.require_role(UserRole::Admin)?;
        validate_audit_page(page, page_size)?;

        let total = self.repository.count_entries(filter).await?;
        let window = PageWindow::new(page, page_size, total);
        let items = self
            .repository
            .list_entries(filter, page_size as usize, window.offset_usize())
            .await?;

        Ok(AuditEntryPage {
            items,
            total,
            page,
            page_size,
            has_more: window.has_more,
        })
    }

    /// Finds one audit entry by id.
    pub async fn find_entry(&self, actor: &UserIdentity, id: Uuid) -> AppResult<AuditEntry> {
        actor.require_role(UserRole::Admin)?;
        self.repository
            .find_entry(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("audit entry '{id}' does not exist")))
    }

    /// Exports matching entries, newest first, capped at [`MAX_AUDIT_EXPORT`].
    pub async fn export_entries(
        &self,
        actor: &UserIdentity,
        filter: &AuditEntryFilter,
    ) -> AppResult<Vec<AuditEntry>> {
        actor.require_role(UserRole::Admin)?;
        self.repository
            .list_entries(filter, MAX_AUDIT_EXPORT, 0)
            .await
    }

    /// Returns the most recent entries for one resource.
    pub async fn recent_for_resource(
        &self,
        actor: &UserIdentity,
        resource_id: &str,
        limit: u32,
    ) -> AppResult<Vec<AuditEntry>> {
        actor.require_role(UserRole::Admin)?;
        validate_audit_page(1, limit)?;
        let filter = AuditEntryFilter {
            resource_id: Some(resource_id.to_owned()),
            ..AuditEntryFilter::default()
        };

        self.repository
            .list_entries(&filter, limit as usize, 0)
            .await
    }

    /// Returns the most recent entries written by one actor subject.
    ///
    /// Matches the subject exactly, unlike the list filter.
    pub async fn recent_for_actor(
        &self,
        actor: &UserIdentity,
        audited_actor: &str,
        limit: u32,
    ) -> AppResult<Vec<AuditEntry>> {
        actor.require_role(UserRole::Admin)?;
        validate_audit_page(1, limit)?;
        let filter = AuditEntryFilter {
            actor_subject: Some(audited_actor.to_owned()),
            ..AuditEntryFilter::default()
        };

        self.repository
            .list_entries(&filter, limit as usize, 0)
            .await
    }
}

fn validate_audit_page(page: u32, page_size: u32) -> AppResult<()> {
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_owned()));
    }

    if !(1..=MAX_AUDIT_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::Validation(format!(
            "page_size must be between 1 and {MAX_AUDIT_PAGE_SIZE}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cloudgate_application::{AuditEntry, AuditEntryFilter, AuditEntryPage};
use cloudgate_core::AppError;
use cloudgate_domain::{ActionStatus, AuditResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

const DEFAULT_AUDIT_PAGE_SIZE: u32 = 50;

/// Query string for audit reads.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub actor: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl AuditQuery {
    pub fn filter(&self) -> Result<AuditEntryFilter, AppError> {
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(AppError::Validation(
                "audit 'from' must not be after 'to'".to_owned(),
            ));
        }

        Ok(AuditEntryFilter {
            action: non_blank(self.action.as_deref()),
            resource_type: non_blank(self.resource_type.as_deref())
                .map(|value| AuditResourceType::from_str(value.as_str()))
                .transpose()?,
            resource_id: non_blank(self.resource_id.as_deref()),
            actor: non_blank(self.actor.as_deref()),
            actor_subject: None,
            from: self.from,
            to: self.to,
            status: non_blank(self.status.as_deref())
                .map(|value| ActionStatus::from_str(value.as_str()))
                .transpose()?,
        })
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_AUDIT_PAGE_SIZE)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// API representation of one audit entry.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-entry-response.ts"
)]
pub struct AuditEntryResponse {
    pub id: String,
    pub actor: Option<String>,
    pub actor_email: Option<String>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub account_id: String,
    pub region: String,
    #[ts(type = "unknown")]
    pub request_snapshot: Value,
    #[ts(type = "unknown")]
    pub response_snapshot: Value,
    pub status: String,
    pub client_ip: Option<String>,
    pub client_agent: Option<String>,
    pub created_at: String,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            actor: entry.actor,
            actor_email: entry.actor_email,
            action: entry.action,
            resource_type: entry.resource_type.as_str().to_owned(),
            resource_id: entry.resource_id,
            account_id: entry.account_id,
            region: entry.region,
            request_snapshot: entry.request_snapshot,
            response_snapshot: entry.response_snapshot,
            status: entry.status.as_str().to_owned(),
            client_ip: entry.client_ip,
            client_agent: entry.client_agent,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// One page of audit entries.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-entry-page-response.ts"
)]
pub struct AuditEntryPageResponse {
    pub items: Vec<AuditEntryResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
}

impl From<AuditEntryPage> for AuditEntryPageResponse {
    fn from(page: AuditEntryPage) -> Self {
        Self {
            items: page
                .items
                .into_iter()
                .map(AuditEntryResponse::from)
                .collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            has_more: page.has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use cloudgate_domain::{ActionStatus, AuditResourceType, ResourceType};

    use super::AuditQuery;

    #[test]
    fn filter_parses_type_alias_and_status() {
        let query = AuditQuery {
            resource_type: Some("rds".to_owned()),
            status: Some("dry_run".to_owned()),
            actor: Some("  ".to_owned()),
            ..AuditQuery::default()
        };

        let Ok(filter) = query.filter() else {
            panic!("filter should parse");
        };
        assert_eq!(
            filter.resource_type,
            Some(AuditResourceType::Resource(ResourceType::Database))
        );
        assert_eq!(filter.status, Some(ActionStatus::DryRun));
        assert_eq!(filter.actor, None);
    }

    #[test]
    fn inverted_time_range_is_rejected() {
        let now = Utc::now();
        let query = AuditQuery {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
            ..AuditQuery::default()
        };

        assert!(query.filter().is_err());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let query = AuditQuery {
            status: Some("pending".to_owned()),
            ..AuditQuery::default()
        };

        assert!(query.filter().is_err());
    }
}

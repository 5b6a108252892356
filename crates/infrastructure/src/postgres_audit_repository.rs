use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudgate_application::{AuditEntry, AuditEntryFilter, AuditRepository};
use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::{ActionStatus, AuditResourceType};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

const AUDIT_ENTRY_COLUMNS: &str = "id, actor, actor_email, action, resource_type, resource_id, \
     account_id, region, request_snapshot, response_snapshot, status, client_ip, client_agent, \
     created_at";

/// PostgreSQL-backed audit repository.
#[derive(Clone)]
pub struct PostgresAuditRepository {
    pool: PgPool,
}

impl PostgresAuditRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditEntryRow {
    id: Uuid,
    actor: Option<String>,
    actor_email: Option<String>,
    action: String,
    resource_type: String,
    resource_id: String,
    account_id: String,
    region: String,
    request_snapshot: Value,
    response_snapshot: Value,
    status: String,
    client_ip: Option<String>,
    client_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditEntryRow> for AuditEntry {
    type Error = AppError;

    fn try_from(row: AuditEntryRow) -> Result<Self, Self::Error> {
        let resource_type =
            AuditResourceType::from_str(row.resource_type.as_str()).map_err(|error| {
                AppError::Persistence(format!(
                    "audit entry '{}' has invalid resource type: {error}",
                    row.id
                ))
            })?;
        let status = ActionStatus::from_str(row.status.as_str()).map_err(|error| {
            AppError::Persistence(format!(
                "audit entry '{}' has invalid status: {error}",
                row.id
            ))
        })?;

        Ok(Self {
            id: row.id,
            actor: row.actor,
            actor_email: row.actor_email,
            action: row.action,
            resource_type,
            resource_id: row.resource_id,
            account_id: row.account_id,
            region: row.region,
            request_snapshot: row.request_snapshot,
            response_snapshot: row.response_snapshot,
            status,
            client_ip: row.client_ip,
            client_agent: row.client_agent,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl AuditRepository for PostgresAuditRepository {
    async fn append_entries(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin audit transaction: {error}"))
        })?;

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO audit_entries (
                    id, actor, actor_email, action, resource_type, resource_id,
                    account_id, region, request_snapshot, response_snapshot,
                    status, client_ip, client_agent, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(entry.id)
            .bind(entry.actor.as_deref())
            .bind(entry.actor_email.as_deref())
            .bind(entry.action.as_str())
            .bind(entry.resource_type.as_str())
            .bind(entry.resource_id.as_str())
            .bind(entry.account_id.as_str())
            .bind(entry.region.as_str())
            .bind(&entry.request_snapshot)
            .bind(&entry.response_snapshot)
            .bind(entry.status.as_str())
            .bind(entry.client_ip.as_deref())
            .bind(entry.client_agent.as_deref())
            .bind(entry.created_at)
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to append audit entry for resource '{}': {error}",
                    entry.resource_id
                ))
            })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!("failed to commit audit transaction: {error}"))
        })
    }

    async fn list_entries(
        &self,
        filter: &AuditEntryFilter,
        limit: usize,
        offset: usize,
    ) -> AppResult<Vec<AuditEntry>> {
        let limit = i64::try_from(limit)
            .map_err(|_| AppError::Validation(format!("audit limit {limit} is too large")))?;
        let offset = i64::try_from(offset)
            .map_err(|_| AppError::Validation(format!("audit offset {offset} is too large")))?;

        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {AUDIT_ENTRY_COLUMNS} FROM audit_entries WHERE TRUE"
        ));
        push_filter(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let rows = builder
            .build_query_as::<AuditEntryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to list audit entries: {error}"))
            })?;

        rows.into_iter().map(AuditEntry::try_from).collect()
    }

    async fn count_entries(&self, filter: &AuditEntryFilter) -> AppResult<u64> {
        let mut builder =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM audit_entries WHERE TRUE");
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to count audit entries: {error}"))
            })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn find_entry(&self, id: Uuid) -> AppResult<Option<AuditEntry>> {
        let row = sqlx::query_as::<_, AuditEntryRow>(
            format!("SELECT {AUDIT_ENTRY_COLUMNS} FROM audit_entries WHERE id = $1").as_str(),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Persistence(format!("failed to find audit entry: {error}")))?;

        row.map(AuditEntry::try_from).transpose()
    }
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AuditEntryFilter) {
    if let Some(action) = filter.action.as_deref() {
        builder.push(" AND action ILIKE ");
        builder.push_bind(like_pattern(action));
    }

    if let Some(resource_type) = filter.resource_type {
        builder.push(" AND resource_type = ");
        builder.push_bind(resource_type.as_str());
    }

    if let Some(resource_id) = filter.resource_id.as_deref() {
        builder.push(" AND resource_id = ");
        builder.push_bind(resource_id.to_owned());
    }

    if let Some(actor) = filter.actor.as_deref() {
        let pattern = like_pattern(actor);
        builder.push(" AND (actor ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR actor_email ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(subject) = filter.actor_subject.as_deref() {
        builder.push(" AND actor = ");
        builder.push_bind(subject.to_owned());
    }

    if let Some(from) = filter.from {
        builder.push(" AND created_at >= ");
        builder.push_bind(from);
    }

    if let Some(to) = filter.to {
        builder.push(" AND created_at <= ");
        builder.push_bind(to);
    }

    if let Some(status) = filter.status {
        builder.push(" AND status = ");
        builder.push_bind(status.as_str());
    }
}

/// Wraps a user substring for `ILIKE`, escaping its wildcard characters.
fn like_pattern(value: &str) -> String {
    let mut pattern = String::with_capacity(value.len() + 2);
    pattern.push('%');
    for character in value.chars() {
        if matches!(character, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(character);
    }
    pattern.push('%');
    pattern
}

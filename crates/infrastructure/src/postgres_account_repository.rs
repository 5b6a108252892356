use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudgate_application::{AccountRepository, ProviderAccount};
use cloudgate_core::{AppError, AppResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, account_id, account_name, role_arn, external_id, enabled, created_at";

/// PostgreSQL-backed provider account registry.
#[derive(Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ProviderAccountRow {
    id: Uuid,
    account_id: String,
    account_name: Option<String>,
    role_arn: String,
    external_id: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
}

impl From<ProviderAccountRow> for ProviderAccount {
    fn from(row: ProviderAccountRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            account_name: row.account_name,
            role_arn: row.role_arn,
            external_id: row.external_id,
            enabled: row.enabled,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn list_accounts(&self) -> AppResult<Vec<ProviderAccount>> {
        let rows = sqlx::query_as::<_, ProviderAccountRow>(
            format!(
                "SELECT {ACCOUNT_COLUMNS} FROM provider_accounts \
                 ORDER BY account_name ASC NULLS LAST, account_id ASC"
            )
            .as_str(),
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to list provider accounts: {error}"))
        })?;

        Ok(rows.into_iter().map(ProviderAccount::from).collect())
    }

    async fn find_account(&self, id: Uuid) -> AppResult<Option<ProviderAccount>> {
        let row = sqlx::query_as::<_, ProviderAccountRow>(
            format!("SELECT {ACCOUNT_COLUMNS} FROM provider_accounts WHERE id = $1").as_str(),
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!("failed to find provider account '{id}': {error}"))
        })?;

        Ok(row.map(ProviderAccount::from))
    }

    async fn insert_account(&self, account: &ProviderAccount) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO provider_accounts (
                id, account_id, account_name, role_arn, external_id, enabled, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(account.id)
        .bind(account.account_id.as_str())
        .bind(account.account_name.as_deref())
        .bind(account.role_arn.as_str())
        .bind(account.external_id.as_deref())
        .bind(account.enabled)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| map_account_conflict(error, account.account_id.as_str()))?;

        Ok(())
    }

    async fn update_account(&self, account: &ProviderAccount) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE provider_accounts
            SET account_id = $2,
                account_name = $3,
                role_arn = $4,
                external_id = $5,
                enabled = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.account_id.as_str())
        .bind(account.account_name.as_deref())
        .bind(account.role_arn.as_str())
        .bind(account.external_id.as_deref())
        .bind(account.enabled)
        .execute(&self.pool)
        .await
        .map_err(|error| map_account_conflict(error, account.account_id.as_str()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM provider_accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to delete provider account '{id}': {error}"
                ))
            })?;

        Ok(result.rows_affected() > 0)
    }
}

fn map_account_conflict(error: sqlx::Error, account_id: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "provider account '{account_id}' is already registered"
        ));
    }

    AppError::Persistence(format!(
        "failed to save provider account '{account_id}': {error}"
    ))
}

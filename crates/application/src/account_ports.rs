use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudgate_core::AppResult;
use cloudgate_domain::{ProviderAccountDraft, account_audit_snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::provider_ports::ProviderError;

/// Provider account registered for cross-account access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAccount {
    /// Registry identifier.
    pub id: Uuid,
    /// Twelve digit provider account id, unique across the registry.
    pub account_id: String,
    /// Display name.
    pub account_name: Option<String>,
    /// Role assumed to reach the account.
    pub role_arn: String,
    /// External id presented when assuming the role.
    pub external_id: Option<String>,
    /// Whether the account is enabled.
    pub enabled: bool,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl ProviderAccount {
    /// Builds a new registry record from a validated draft.
    #[must_use]
    pub fn from_draft(draft: &ProviderAccountDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id: draft.account_id().to_owned(),
            account_name: draft.account_name().map(ToOwned::to_owned),
            role_arn: draft.role_arn().to_owned(),
            external_id: draft.external_id().map(ToOwned::to_owned),
            enabled: draft.enabled(),
            created_at: Utc::now(),
        }
    }

    /// Returns a copy with every editable field replaced by the draft.
    #[must_use]
    pub fn with_draft(&self, draft: &ProviderAccountDraft) -> Self {
        Self {
            id: self.id,
            created_at: self.created_at,
            ..Self::from_draft(draft)
        }
    }

    /// Returns the audit snapshot of this account.
    #[must_use]
    pub fn audit_snapshot(&self) -> Value {
        account_audit_snapshot(
            self.account_id.as_str(),
            self.account_name.as_deref(),
            self.role_arn.as_str(),
        )
    }
}

/// Persistence port for the provider account registry.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Lists accounts ordered by name, unnamed accounts last, then by account id.
    async fn list_accounts(&self) -> AppResult<Vec<ProviderAccount>>;

    /// Finds one account by registry id.
    async fn find_account(&self, id: Uuid) -> AppResult<Option<ProviderAccount>>;

    /// Inserts an account. A duplicate provider account id is a `Conflict`.
    async fn insert_account(&self, account: &ProviderAccount) -> AppResult<()>;

    /// Replaces an existing account, returning whether it existed.
    ///
    /// Moving onto another account's provider id is a `Conflict`.
    async fn update_account(&self, account: &ProviderAccount) -> AppResult<bool>;

    /// Deletes an account, returning whether it existed.
    async fn delete_account(&self, id: Uuid) -> AppResult<bool>;
}

/// Checks that the control plane can assume an account's role.
#[async_trait]
pub trait AccountAccessVerifier: Send + Sync {
    /// Attempts to assume the role once.
    async fn verify_access(&self, account: &ProviderAccount) -> Result<(), ProviderError>;
}

/// Orders accounts the way every repository lists them.
pub fn sort_accounts(accounts: &mut [ProviderAccount]) {
    accounts.sort_by(|left, right| {
        match (left.account_name.as_deref(), right.account_name.as_deref()) {
            (Some(left_name), Some(right_name)) => left_name.cmp(right_name),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
        .then_with(|| left.account_id.cmp(&right.account_id))
    });
}

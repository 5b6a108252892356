use std::sync::Arc;
use std::time::Duration;

use cloudgate_core::{AppError, AppResult, UserIdentity, UserRole};
use cloudgate_domain::{ActionStatus, AuditResourceType, ProviderAccountDraft};
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use crate::account_ports::{AccountAccessVerifier, AccountRepository, ProviderAccount};
use crate::audit_service::{AuditRecordInput, AuditService, RequestContext};
use crate::provider_ports::{ProviderError, ProviderErrorKind};

/// Result of a successful role assumption check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountVerification {
    /// Always `verified`.
    pub status: String,
    /// Human readable detail.
    pub message: String,
}

/// Admin-only provider account registry. Every change is audited.
#[derive(Clone)]
pub struct AccountService {
    repository: Arc<dyn AccountRepository>,
    verifier: Arc<dyn AccountAccessVerifier>,
    audit: AuditService,
    audit_region: String,
    call_timeout: Duration,
}

impl AccountService {
    /// Creates the registry service.
    ///
    /// `audit_region` is recorded on account audit entries, which have no region of their own.
    #[must_use]
    pub fn new(
        repository: Arc<dyn AccountRepository>,
        verifier: Arc<dyn AccountAccessVerifier>,
        audit: AuditService,
        audit_region: String,
        call_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            verifier,
            audit,
            audit_region,
            call_timeout,
        }
    }

    /// Lists registered accounts.
    pub async fn list_accounts(&self, actor: &UserIdentity) -> AppResult<Vec<ProviderAccount>> {
        actor.require_role(UserRole::Admin)?;
        self.repository.list_accounts().await
    }

    /// Returns one registered account.
    pub async fn get_account(&self, actor: &UserIdentity, id: Uuid) -> AppResult<ProviderAccount> {
        actor.require_role(UserRole::Admin)?;
        self.require_account(id).await
    }

    /// Registers an account.
    pub async fn create_account(
        &self,
        actor: &UserIdentity,
        draft: ProviderAccountDraft,
        context: &RequestContext,
    ) -> AppResult<ProviderAccount> {
        actor.require_role(UserRole::Admin)?;

        let account = ProviderAccount::from_draft(&draft);
        self.repository.insert_account(&account).await?;
        info!(
            subject = actor.subject(),
            account_id = account.account_id.as_str(),
            "provider account registered"
        );

        self.record(
            actor,
            "account:create",
            &account,
            ActionStatus::Success,
            account.audit_snapshot(),
            json!({}),
            context,
        )
        .await?;

        Ok(account)
    }

    /// Replaces the editable fields of an account.
    ///
    /// The audit entry carries the account before and after the change.
    pub async fn update_account(
        &self,
        actor: &UserIdentity,
        id: Uuid,
        draft: ProviderAccountDraft,
        context: &RequestContext,
    ) -> AppResult<ProviderAccount> {
        actor.require_role(UserRole::Admin)?;

        let before = self.require_account(id).await?;
        let after = before.with_draft(&draft);
        if !self.repository.update_account(&after).await? {
            return Err(account_not_found(id));
        }

        self.record(
            actor,
            "account:update",
            &after,
            ActionStatus::Success,
            json!({
                "before": before.audit_snapshot(),
                "after": after.audit_snapshot(),
            }),
            json!({}),
            context,
        )
        .await?;

        Ok(after)
    }

    /// Removes an account from the registry.
    pub async fn delete_account(
        &self,
        actor: &UserIdentity,
        id: Uuid,
        context: &RequestContext,
    ) -> AppResult<()> {
        actor.require_role(UserRole::Admin)?;

        let account = self.require_account(id).await?;
        if !self.repository.delete_account(id).await? {
            return Err(account_not_found(id));
        }
        info!(
            subject = actor.subject(),
            account_id = account.account_id.as_str(),
            "provider account removed"
        );

        self.record(
            actor,
            "account:delete",
            &account,
            ActionStatus::Success,
            account.audit_snapshot(),
            json!({}),
            context,
        )
        .await
    }

    /// Checks that the account's role can be assumed.
    ///
    /// Both outcomes are audited. A failed check is returned as a `Validation`
    /// error after its audit entry has been written.
    pub async fn verify_account(
        &self,
        actor: &UserIdentity,
        id: Uuid,
        context: &RequestContext,
    ) -> AppResult<AccountVerification> {
        actor.require_role(UserRole::Admin)?;

        let account = self.require_account(id).await?;
        let verified = match timeout(self.call_timeout, self.verifier.verify_access(&account)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(
                ProviderErrorKind::Timeout,
                "role assumption check exceeded its deadline",
            )),
        };
        let request_snapshot = json!({
            "account_id": account.account_id,
            "role_arn": account.role_arn,
        });

        match verified {
            Ok(()) => {
                self.record(
                    actor,
                    "account:verify",
                    &account,
                    ActionStatus::Success,
                    request_snapshot,
                    json!({}),
                    context,
                )
                .await?;

                Ok(AccountVerification {
                    status: "verified".to_owned(),
                    message: "Successfully assumed role".to_owned(),
                })
            }
            Err(error) => {
                warn!(
                    account_id = account.account_id.as_str(),
                    kind = error.kind.as_str(),
                    "provider account verification failed"
                );
                self.record(
                    actor,
                    "account:verify",
                    &account,
                    ActionStatus::Failed,
                    request_snapshot,
                    json!({
                        "error": error.message,
                        "error_type": error.kind.as_str(),
                    }),
                    context,
                )
                .await?;

                Err(AppError::Validation(format!(
                    "failed to assume role: {}",
                    error.message
                )))
            }
        }
    }

    async fn require_account(&self, id: Uuid) -> AppResult<ProviderAccount> {
        self.repository
            .find_account(id)
            .await?
            .ok_or_else(|| account_not_found(id))
    }

    #[allow(clippy::too_many_arguments)]
    async fn record(
        &self,
        actor: &UserIdentity,
        action: &str,
        account: &ProviderAccount,
        status: ActionStatus,
        request_snapshot: Value,
        response_snapshot: Value,
        context: &RequestContext,
    ) -> AppResult<()> {
        self.audit
            .record(AuditRecordInput {
                actor: Some(actor.clone()),
                action: action.to_owned(),
                resource_type: AuditResourceType::ProviderAccount,
                resource_ids: vec![account.account_id.clone()],
                account_id: account.account_id.clone(),
                region: self.audit_region.clone(),
                status,
                request_snapshot,
                response_snapshot,
                context: context.clone(),
            })
            .await
            .map(|_| ())
    }
}

fn account_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("provider account '{id}' does not exist"))
}

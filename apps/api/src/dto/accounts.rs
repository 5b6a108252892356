use cloudgate_application::{AccountVerification, ProviderAccount};
use cloudgate_core::AppResult;
use cloudgate_domain::ProviderAccountDraft;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

fn default_enabled() -> bool {
    true
}

/// Incoming payload for registering or replacing a provider account.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-provider-account-request.ts"
)]
pub struct SaveProviderAccountRequest {
    pub account_id: String,
    #[serde(default)]
    pub account_name: Option<String>,
    pub role_arn: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SaveProviderAccountRequest {
    pub fn into_draft(self) -> AppResult<ProviderAccountDraft> {
        ProviderAccountDraft::new(
            self.account_id,
            self.account_name,
            self.role_arn,
            self.external_id,
            self.enabled,
        )
    }
}

/// API representation of a registered provider account.
///
/// The external id is write-only; responses only say whether one is set.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/provider-account-response.ts"
)]
pub struct ProviderAccountResponse {
    pub id: String,
    pub account_id: String,
    pub account_name: Option<String>,
    pub role_arn: String,
    pub has_external_id: bool,
    pub enabled: bool,
    pub created_at: String,
}

impl From<ProviderAccount> for ProviderAccountResponse {
    fn from(account: ProviderAccount) -> Self {
        Self {
            id: account.id.to_string(),
            account_id: account.account_id,
            account_name: account.account_name,
            role_arn: account.role_arn,
            has_external_id: account.external_id.is_some(),
            enabled: account.enabled,
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Result of a successful role assumption check.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/account-verification-response.ts"
)]
pub struct AccountVerificationResponse {
    pub status: String,
    pub message: String,
}

impl From<AccountVerification> for AccountVerificationResponse {
    fn from(verification: AccountVerification) -> Self {
        Self {
            status: verification.status,
            message: verification.message,
        }
    }
}

use cloudgate_core::{AppError, AppResult, NonEmptyString};
use serde_json::{Value, json};

const ACCOUNT_ID_LENGTH: usize = 12;

/// Validated input for registering or replacing a provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAccountDraft {
    account_id: String,
    account_name: Option<NonEmptyString>,
    role_arn: NonEmptyString,
    external_id: Option<NonEmptyString>,
    enabled: bool,
}

impl ProviderAccountDraft {
    /// Validates and creates a draft.
    ///
    /// The account id must be twelve ASCII digits and the role must be an ARN.
    /// Blank optional fields are treated as absent.
    pub fn new(
        account_id: impl Into<String>,
        account_name: Option<String>,
        role_arn: impl Into<String>,
        external_id: Option<String>,
        enabled: bool,
    ) -> AppResult<Self> {
        let account_id = account_id.into().trim().to_owned();
        if account_id.len() != ACCOUNT_ID_LENGTH
            || !account_id.chars().all(|character| character.is_ascii_digit())
        {
            return Err(AppError::Validation(format!(
                "account_id must be exactly {ACCOUNT_ID_LENGTH} digits"
            )));
        }

        let role_arn = NonEmptyString::new(role_arn.into().trim())
            .map_err(|_| AppError::Validation("role_arn is required".to_owned()))?;
        if !role_arn.as_str().starts_with("arn:") {
            return Err(AppError::Validation(format!(
                "role_arn '{}' is not an ARN",
                role_arn.as_str()
            )));
        }

        Ok(Self {
            account_id,
            account_name: optional(account_name),
            role_arn,
            external_id: optional(external_id),
            enabled,
        })
    }

    /// Returns the twelve digit provider account id.
    #[must_use]
    pub fn account_id(&self) -> &str {
        self.account_id.as_str()
    }

    /// Returns the display name.
    #[must_use]
    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_ref().map(NonEmptyString::as_str)
    }

    /// Returns the role assumed to reach the account.
    #[must_use]
    pub fn role_arn(&self) -> &str {
        self.role_arn.as_str()
    }

    /// Returns the external id presented when assuming the role.
    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_ref().map(NonEmptyString::as_str)
    }

    /// Returns whether the account is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Audit snapshot of an account. The external id is never included.
#[must_use]
pub fn account_audit_snapshot(
    account_id: &str,
    account_name: Option<&str>,
    role_arn: &str,
) -> Value {
    json!({
        "account_id": account_id,
        "account_name": account_name,
        "role_arn": role_arn,
    })
}

fn optional(value: Option<String>) -> Option<NonEmptyString> {
    value.and_then(|value| NonEmptyString::new(value.trim()).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ProviderAccountDraft, account_audit_snapshot};

    const ROLE: &str = "arn:aws:iam::123456789012:role/Cloudgate";

    #[test]
    fn account_id_must_be_twelve_digits() {
        assert!(ProviderAccountDraft::new("12345678901", None, ROLE, None, true).is_err());
        assert!(ProviderAccountDraft::new("12345678901x", None, ROLE, None, true).is_err());
        assert!(ProviderAccountDraft::new(" 123456789012 ", None, ROLE, None, true).is_ok());
    }

    #[test]
    fn role_must_be_an_arn() {
        assert!(ProviderAccountDraft::new("123456789012", None, "  ", None, true).is_err());
        assert!(ProviderAccountDraft::new("123456789012", None, "Cloudgate", None, true).is_err());
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let Ok(draft) = ProviderAccountDraft::new(
            "123456789012",
            Some("  ".to_owned()),
            ROLE,
            Some(String::new()),
            false,
        ) else {
            panic!("draft should validate");
        };

        assert_eq!(draft.account_name(), None);
        assert_eq!(draft.external_id(), None);
        assert!(!draft.enabled());
    }

    #[test]
    fn audit_snapshot_omits_external_id() {
        let snapshot = account_audit_snapshot("123456789012", Some("prod"), ROLE);
        assert_eq!(
            snapshot,
            json!({"account_id": "123456789012", "account_name": "prod", "role_arn": ROLE})
        );
    }
}

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::AppError;

/// Coarse caller role used for action-level checks.
///
/// Roles are ordered: `Admin` satisfies everything `Operator` does, which in
/// turn satisfies everything `Readonly` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// May only read inventory.
    Readonly,
    /// May run non-destructive lifecycle actions.
    Operator,
    /// May run every action and read the audit log.
    Admin,
}

impl UserRole {
    /// Returns a stable storage value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Operator => "operator",
            Self::Admin => "admin",
        }
    }

    /// Returns whether this role satisfies the required role.
    #[must_use]
    pub fn satisfies(self, required: UserRole) -> bool {
        self >= required
    }
}

impl Display for UserRole {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "readonly" => Ok(Self::Readonly),
            "operator" => Ok(Self::Operator),
            "admin" => Ok(Self::Admin),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

/// Caller identity established by the upstream authentication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    email: Option<String>,
    role: UserRole,
}

impl UserIdentity {
    /// Creates a caller identity.
    #[must_use]
    pub fn new(subject: impl Into<String>, email: Option<String>, role: UserRole) -> Self {
        Self {
            subject: subject.into(),
            email,
            role,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the caller role.
    #[must_use]
    pub fn role(&self) -> UserRole {
        self.role
    }

    /// Fails with `Forbidden` unless the caller role satisfies `required`.
    pub fn require_role(&self, required: UserRole) -> Result<(), AppError> {
        if self.role.satisfies(required) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "subject '{}' with role '{}' requires role '{}'",
            self.subject, self.role, required
        )))
    }
}

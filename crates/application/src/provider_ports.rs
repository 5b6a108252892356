use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use cloudgate_core::AppError;
use cloudgate_domain::{ActionVerb, Resource, ResourceType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::resource_aggregator::ResourceFilters;

/// Failure categories reported by provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The provider API could not be reached or returned a server error.
    Unavailable,
    /// The addressed resource does not exist.
    NotFound,
    /// The provider refused the request, for example because of resource state.
    Rejected,
    /// The call did not finish before its deadline.
    Timeout,
}

impl ProviderErrorKind {
    /// Returns a stable storage value for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::NotFound => "not_found",
            Self::Rejected => "rejected",
            Self::Timeout => "timeout",
        }
    }
}

impl Display for ProviderErrorKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error raised by one provider adapter call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider {kind}: {message}")]
pub struct ProviderError {
    /// Failure category.
    pub kind: ProviderErrorKind,
    /// Provider supplied detail.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error.
    #[must_use]
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message)
    }

    /// Creates a `Timeout` error for a call that exceeded its deadline.
    #[must_use]
    pub fn timeout(operation: &str, resource_type: ResourceType) -> Self {
        Self::new(
            ProviderErrorKind::Timeout,
            format!(
                "{operation} call to the {} provider exceeded its deadline",
                resource_type.as_str()
            ),
        )
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        match error.kind {
            ProviderErrorKind::NotFound => AppError::NotFound(error.message),
            ProviderErrorKind::Rejected => AppError::Conflict(error.message),
            ProviderErrorKind::Unavailable | ProviderErrorKind::Timeout => {
                AppError::ProviderUnavailable(error.message)
            }
        }
    }
}

/// Account and region served by one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterScope {
    /// Provider account identifier.
    pub account_id: String,
    /// Provider region.
    pub region: String,
}

/// One mutation forwarded to a provider adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    /// Verb to apply.
    pub verb: ActionVerb,
    /// Targets, already gated by protection.
    pub resource_ids: Vec<String>,
    /// When set the adapter must validate without changing provider state.
    pub dry_run: bool,
    /// Verb specific parameters, already validated.
    pub params: Value,
}

/// Explicit result branch returned by an adapter mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationResult {
    /// The provider changed state.
    Applied {
        /// Provider response payload.
        details: Value,
    },
    /// The provider validated the request without changing state.
    DryRun {
        /// Provider response payload.
        details: Value,
    },
}

impl MutationResult {
    /// Returns the provider payload.
    #[must_use]
    pub fn details(&self) -> &Value {
        match self {
            Self::Applied { details } | Self::DryRun { details } => details,
        }
    }

    /// Returns whether the adapter reported the dry-run branch.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun { .. })
    }
}

/// Integration boundary to one resource family of one provider account.
///
/// Retries and backoff are the adapter's concern.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the resource family this adapter serves.
    fn resource_type(&self) -> ResourceType;

    /// Returns the account and region this adapter targets.
    fn scope(&self) -> AdapterScope;

    /// Lists resources. Filters are a hint; the caller re-applies them.
    async fn list(&self, filters: &ResourceFilters) -> Result<Vec<Resource>, ProviderError>;

    /// Fetches one resource, returning `None` when it does not exist.
    async fn get(&self, resource_id: &str) -> Result<Option<Resource>, ProviderError>;

    /// Fetches current tags for one resource.
    async fn tags(&self, resource_id: &str) -> Result<BTreeMap<String, String>, ProviderError>;

    /// Applies or simulates one mutation.
    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResult, ProviderError>;
}

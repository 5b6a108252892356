use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::resource::ResourceType;

/// Tag naming the deployment environment of a resource.
pub const ENVIRONMENT_TAG: &str = "Environment";

/// Tag explicitly marking a resource as protected.
pub const PROTECTED_TAG: &str = "Protected";

const PROTECTED_FLAG_VALUES: [&str; 3] = ["true", "yes", "1"];

/// Outcome of evaluating the protection rules for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtectionDecision {
    /// The mutation may proceed.
    Allow,
    /// The mutation must not reach the provider.
    Deny {
        /// Human readable explanation naming the matching rule.
        reason: String,
    },
}

impl ProtectionDecision {
    /// Returns whether the decision allows the mutation.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Tag based protection rules plus the optional admin override secret.
#[derive(Clone)]
pub struct ProtectionPolicy {
    protected_tag_values: BTreeSet<String>,
    override_secret: Option<String>,
}

impl ProtectionPolicy {
    /// Creates a policy from protected environment values and an override secret.
    ///
    /// Values are compared case-insensitively. A blank secret disables overrides.
    #[must_use]
    pub fn new<I, S>(protected_tag_values: I, override_secret: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            protected_tag_values: protected_tag_values
                .into_iter()
                .map(|value| value.as_ref().trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
            override_secret: override_secret.filter(|secret| !secret.trim().is_empty()),
        }
    }

    /// Parses a comma separated list of protected environment values.
    #[must_use]
    pub fn from_csv(protected_tag_values: &str, override_secret: Option<String>) -> Self {
        Self::new(protected_tag_values.split(','), override_secret)
    }

    /// Returns the normalized protected environment values.
    #[must_use]
    pub fn protected_tag_values(&self) -> &BTreeSet<String> {
        &self.protected_tag_values
    }

    /// Returns whether an override secret is configured.
    #[must_use]
    pub fn override_enabled(&self) -> bool {
        self.override_secret.is_some()
    }

    /// Returns whether the supplied code equals the configured secret exactly.
    #[must_use]
    pub fn override_matches(&self, override_code: Option<&str>) -> bool {
        match (self.override_secret.as_deref(), override_code) {
            (Some(secret), Some(code)) => constant_time_eq(secret.as_bytes(), code.as_bytes()),
            _ => false,
        }
    }

    /// Evaluates the protection rules against a resource's tags.
    #[must_use]
    pub fn evaluate(
        &self,
        tags: &BTreeMap<String, String>,
        override_code: Option<&str>,
    ) -> ProtectionDecision {
        let Some(reason) = self.protection_reason(tags) else {
            return ProtectionDecision::Allow;
        };

        if self.override_matches(override_code) {
            return ProtectionDecision::Allow;
        }

        ProtectionDecision::Deny { reason }
    }

    /// Returns why a resource is protected, ignoring any override.
    #[must_use]
    pub fn protection_reason(&self, tags: &BTreeMap<String, String>) -> Option<String> {
        if let Some(environment) = tags.get(ENVIRONMENT_TAG)
            && self
                .protected_tag_values
                .contains(environment.trim().to_lowercase().as_str())
        {
            return Some(format!(
                "resource is tagged {ENVIRONMENT_TAG}='{environment}' which is protected; supply an admin override code to proceed"
            ));
        }

        if let Some(flag) = tags.get(PROTECTED_TAG)
            && PROTECTED_FLAG_VALUES.contains(&flag.trim().to_lowercase().as_str())
        {
            return Some(format!(
                "resource is tagged {PROTECTED_TAG}='{flag}'; supply an admin override code to proceed"
            ));
        }

        None
    }
}

impl Debug for ProtectionPolicy {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ProtectionPolicy")
            .field("protected_tag_values", &self.protected_tag_values)
            .field(
                "override_secret",
                &self.override_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right)
        .fold(0_u8, |difference, (left, right)| difference | (left ^ right))
        == 0
}

/// How a dependent resource relates to the resource being inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelationship {
    /// A block volume attached to the inspected instance.
    AttachedVolume,
    /// The instance the inspected volume is attached to.
    AttachedInstance,
    /// A read replica sourced from the inspected database.
    ReadReplica,
}

impl DependencyRelationship {
    /// Returns a stable storage value for this relationship.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AttachedVolume => "attached_volume",
            Self::AttachedInstance => "attached_instance",
            Self::ReadReplica => "read_replica",
        }
    }
}

/// Informational link to a resource that a mutation may affect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDependency {
    /// Type of the dependent resource.
    pub resource_type: ResourceType,
    /// Identifier of the dependent resource.
    pub resource_id: String,
    /// Relationship to the inspected resource.
    pub relationship: DependencyRelationship,
    /// Human readable explanation.
    pub message: String,
}

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cloudgate_core::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Resource families served by provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Virtual machine instances.
    Compute,
    /// Block storage volumes.
    BlockVolume,
    /// Managed database instances and clusters.
    Database,
    /// Container services running inside a cluster.
    ContainerService,
    /// Object storage buckets.
    ObjectStore,
    /// Serverless functions.
    Function,
}

impl ResourceType {
    /// Returns a stable storage value for this resource type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::BlockVolume => "block_volume",
            Self::Database => "database",
            Self::ContainerService => "container_service",
            Self::ObjectStore => "object_store",
            Self::Function => "function",
        }
    }

    /// Returns every resource type in registration order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[ResourceType] = &[
            ResourceType::Compute,
            ResourceType::BlockVolume,
            ResourceType::Database,
            ResourceType::ObjectStore,
            ResourceType::ContainerService,
            ResourceType::Function,
        ];

        ALL
    }

    /// Parses a transport value, accepting provider family aliases.
    pub fn from_transport(value: &str) -> Result<Self, AppError> {
        Self::from_str(value)
    }
}

impl Display for ResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compute" | "ec2" => Ok(Self::Compute),
            "block_volume" | "ebs" => Ok(Self::BlockVolume),
            "database" | "rds" => Ok(Self::Database),
            "container_service" | "ecs" => Ok(Self::ContainerService),
            "object_store" | "s3" => Ok(Self::ObjectStore),
            "function" | "lambda" => Ok(Self::Function),
            _ => Err(AppError::Validation(format!(
                "unknown resource type value '{value}'"
            ))),
        }
    }
}

/// Storage value for audit entries about registered provider accounts.
const PROVIDER_ACCOUNT_AUDIT_TYPE: &str = "provider_account";

/// Kind of object an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AuditResourceType {
    /// A provider resource.
    Resource(ResourceType),
    /// A registered provider account.
    ProviderAccount,
}

impl AuditResourceType {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resource(resource_type) => resource_type.as_str(),
            Self::ProviderAccount => PROVIDER_ACCOUNT_AUDIT_TYPE,
        }
    }
}

impl From<ResourceType> for AuditResourceType {
    fn from(resource_type: ResourceType) -> Self {
        Self::Resource(resource_type)
    }
}

impl From<AuditResourceType> for String {
    fn from(value: AuditResourceType) -> Self {
        value.as_str().to_owned()
    }
}

impl TryFrom<String> for AuditResourceType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(value.as_str())
    }
}

impl Display for AuditResourceType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AuditResourceType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            PROVIDER_ACCOUNT_AUDIT_TYPE | "account" => Ok(Self::ProviderAccount),
            _ => ResourceType::from_str(value).map(Self::Resource),
        }
    }
}

/// Normalized read projection of one provider resource.
///
/// Resources are never persisted by Cloudgate; every instance is a fresh
/// projection of provider state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Provider identifier, unique per type within an account.
    pub resource_id: String,
    /// Resource family.
    pub resource_type: ResourceType,
    /// Display name, usually taken from the `Name` tag.
    #[serde(default)]
    pub name: Option<String>,
    /// Provider region.
    pub region: String,
    /// Owning provider account.
    pub account_id: String,
    /// Provider lifecycle state such as `running` or `stopped`.
    #[serde(default)]
    pub state: Option<String>,
    /// Resource tags keyed by tag name.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Provider specific attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Estimated monthly cost, when known.
    #[serde(default)]
    pub monthly_cost: Option<f64>,
}

impl Resource {
    /// Returns the value used for deterministic listing order.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        self.name.as_deref().unwrap_or(self.resource_id.as_str())
    }

    /// Returns one tag value.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns one string attribute.
    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Returns whether the free-text needle occurs in the id or name.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.resource_id.to_lowercase().contains(needle.as_str())
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(needle.as_str()))
    }
}

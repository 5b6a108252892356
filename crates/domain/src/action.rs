use std::fmt::{Display, Formatter};
use std::str::FromStr;

use cloudgate_core::{AppError, AppResult, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::ResourceType;
use crate::resource_id::{IdShape, classify_resource_id};

/// Lifecycle verb applied to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionVerb {
    /// Start a stopped resource.
    Start,
    /// Stop a running resource.
    Stop,
    /// Permanently terminate a compute instance.
    Terminate,
    /// Permanently delete a resource.
    Delete,
    /// Change the desired task count of a container service.
    Scale,
}

impl ActionVerb {
    /// Returns a stable storage value for this verb.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Terminate => "terminate",
            Self::Delete => "delete",
            Self::Scale => "scale",
        }
    }
}

impl FromStr for ActionVerb {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "terminate" => Ok(Self::Terminate),
            "delete" => Ok(Self::Delete),
            "scale" => Ok(Self::Scale),
            _ => Err(AppError::Validation(format!(
                "unknown action verb '{value}'"
            ))),
        }
    }
}

/// Terminal status of one action invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// The provider applied the mutation.
    Success,
    /// The provider validated the mutation without applying it.
    DryRun,
    /// The provider call raised or timed out.
    Failed,
}

impl ActionStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::DryRun => "dry_run",
            Self::Failed => "failed",
        }
    }
}

impl Display for ActionStatus {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ActionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "dry_run" => Ok(Self::DryRun),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown action status '{value}'"
            ))),
        }
    }
}

#[derive(Clone, Copy)]
enum ParamKind {
    Bool,
    NonNegativeInteger,
}

#[derive(Clone, Copy)]
struct ParamSpec {
    name: &'static str,
    kind: ParamKind,
    required: bool,
}

struct CatalogEntry {
    resource_type: ResourceType,
    verb: ActionVerb,
    required_role: UserRole,
    params: &'static [ParamSpec],
}

const SKIP_FINAL_SNAPSHOT: ParamSpec = ParamSpec {
    name: "skip_final_snapshot",
    kind: ParamKind::Bool,
    required: false,
};

const FORCE_DELETE: ParamSpec = ParamSpec {
    name: "force_delete",
    kind: ParamKind::Bool,
    required: false,
};

const DESIRED_COUNT: ParamSpec = ParamSpec {
    name: "desired_count",
    kind: ParamKind::NonNegativeInteger,
    required: true,
};

const ACTION_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        resource_type: ResourceType::Compute,
        verb: ActionVerb::Start,
        required_role: UserRole::Operator,
        params: &[],
    },
    CatalogEntry {
        resource_type: ResourceType::Compute,
        verb: ActionVerb::Stop,
        required_role: UserRole::Operator,
        params: &[],
    },
    CatalogEntry {
        resource_type: ResourceType::Compute,
        verb: ActionVerb::Terminate,
        required_role: UserRole::Admin,
        params: &[],
    },
    CatalogEntry {
        resource_type: ResourceType::Database,
        verb: ActionVerb::Start,
        required_role: UserRole::Operator,
        params: &[],
    },
    CatalogEntry {
        resource_type: ResourceType::Database,
        verb: ActionVerb::Stop,
        required_role: UserRole::Operator,
        params: &[],
    },
    CatalogEntry {
        resource_type: ResourceType::Database,
        verb: ActionVerb::Delete,
        required_role: UserRole::Admin,
        params: &[SKIP_FINAL_SNAPSHOT],
    },
    CatalogEntry {
        resource_type: ResourceType::ContainerService,
        verb: ActionVerb::Scale,
        required_role: UserRole::Operator,
        params: &[DESIRED_COUNT],
    },
    CatalogEntry {
        resource_type: ResourceType::ObjectStore,
        verb: ActionVerb::Delete,
        required_role: UserRole::Admin,
        params: &[FORCE_DELETE],
    },
    CatalogEntry {
        resource_type: ResourceType::BlockVolume,
        verb: ActionVerb::Delete,
        required_role: UserRole::Admin,
        params: &[],
    },
];

/// A verb offered by one resource type, named `"<resource_type>:<verb>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionKind {
    resource_type: ResourceType,
    verb: ActionVerb,
}

impl ActionKind {
    /// Creates an action kind, rejecting verbs the resource type does not offer.
    pub fn new(resource_type: ResourceType, verb: ActionVerb) -> AppResult<Self> {
        let kind = Self {
            resource_type,
            verb,
        };
        kind.catalog_entry()?;
        Ok(kind)
    }

    /// Parses an action name such as `compute:stop` or `ec2:stop`.
    pub fn parse(action_name: &str) -> AppResult<Self> {
        let Some((resource_type, verb)) = action_name.trim().split_once(':') else {
            return Err(AppError::Validation(format!(
                "action name '{action_name}' must have the form '<resource_type>:<verb>'"
            )));
        };

        Self::new(ResourceType::from_str(resource_type)?, ActionVerb::from_str(verb)?)
    }

    /// Returns every action kind in the catalog.
    #[must_use]
    pub fn all() -> Vec<Self> {
        ACTION_CATALOG
            .iter()
            .map(|entry| Self {
                resource_type: entry.resource_type,
                verb: entry.verb,
            })
            .collect()
    }

    /// Returns the targeted resource type.
    #[must_use]
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Returns the verb.
    #[must_use]
    pub fn verb(&self) -> ActionVerb {
        self.verb
    }

    /// Returns the canonical action name.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}:{}", self.resource_type.as_str(), self.verb.as_str())
    }

    /// Returns the minimum caller role allowed to run this action.
    #[must_use]
    pub fn required_role(&self) -> UserRole {
        self.catalog_entry()
            .map(|entry| entry.required_role)
            .unwrap_or(UserRole::Admin)
    }

    /// Returns whether the action permanently removes the resource.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self.verb, ActionVerb::Terminate | ActionVerb::Delete)
    }

    /// Validates verb specific parameters.
    ///
    /// `params` must be `null` or an object holding only known keys.
    pub fn validate_params(&self, params: &Value) -> AppResult<()> {
        let entry = self.catalog_entry()?;
        let empty = serde_json::Map::new();
        let object = match params {
            Value::Null => &empty,
            Value::Object(object) => object,
            _ => {
                return Err(AppError::Validation(format!(
                    "parameters for '{}' must be an object",
                    self.name()
                )));
            }
        };

        if let Some(unknown) = object
            .keys()
            .find(|key| !entry.params.iter().any(|spec| spec.name == key.as_str()))
        {
            return Err(AppError::Validation(format!(
                "unknown parameter '{unknown}' for action '{}'",
                self.name()
            )));
        }

        for spec in entry.params {
            match object.get(spec.name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(AppError::Validation(format!(
                        "parameter '{}' is required for action '{}'",
                        spec.name,
                        self.name()
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) => validate_param_value(spec, value)?,
            }
        }

        Ok(())
    }

    /// Validates the shape of one target identifier for this action.
    pub fn validate_target(&self, resource_id: &str) -> AppResult<()> {
        if resource_id.trim().is_empty() {
            return Err(AppError::Validation(
                "target resource ids must not be empty".to_owned(),
            ));
        }

        if self.resource_type == ResourceType::ContainerService
            && classify_resource_id(resource_id) != IdShape::ClusterService
        {
            return Err(AppError::Validation(format!(
                "container service target '{resource_id}' must have the form 'cluster/service'"
            )));
        }

        Ok(())
    }

    fn catalog_entry(&self) -> AppResult<&'static CatalogEntry> {
        ACTION_CATALOG
            .iter()
            .find(|entry| entry.resource_type == self.resource_type && entry.verb == self.verb)
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "resource type '{}' does not support verb '{}'",
                    self.resource_type.as_str(),
                    self.verb.as_str()
                ))
            })
    }
}

impl Display for ActionKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}:{}",
            self.resource_type.as_str(),
            self.verb.as_str()
        )
    }
}

fn validate_param_value(spec: &ParamSpec, value: &Value) -> AppResult<()> {
    let valid = match spec.kind {
        ParamKind::Bool => value.is_boolean(),
        ParamKind::NonNegativeInteger => value.is_u64(),
    };

    if valid {
        return Ok(());
    }

    let expected = match spec.kind {
        ParamKind::Bool => "a boolean",
        ParamKind::NonNegativeInteger => "a non-negative integer",
    };

    Err(AppError::Validation(format!(
        "parameter '{}' must be {expected}",
        spec.name
    )))
}

//! Fixture-backed provider adapters for local development and demos.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use cloudgate_application::{
    AccountAccessVerifier, AdapterScope, MutationRequest, MutationResult, ProviderAccount,
    ProviderAdapter, ProviderError, ProviderErrorKind, ResourceFilters,
};
use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::{ActionVerb, Resource, ResourceType};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

const TERMINATED_STATE: &str = "terminated";
const DESIRED_COUNT_ATTRIBUTE: &str = "desired_count";

/// Provider adapter over an in-process resource set.
///
/// Mutations change the stored resources so later reads observe them.
pub struct InMemoryProviderAdapter {
    resource_type: ResourceType,
    scope: AdapterScope,
    resources: RwLock<Vec<Resource>>,
}

impl InMemoryProviderAdapter {
    /// Creates an adapter serving the given resources of one type.
    ///
    /// Resources of any other type are ignored.
    #[must_use]
    pub fn new(resource_type: ResourceType, scope: AdapterScope, resources: Vec<Resource>) -> Self {
        Self {
            resource_type,
            scope,
            resources: RwLock::new(
                resources
                    .into_iter()
                    .filter(|resource| resource.resource_type == resource_type)
                    .collect(),
            ),
        }
    }

    /// Builds one adapter per resource type from a mixed resource set.
    #[must_use]
    pub fn for_all_types(scope: &AdapterScope, resources: &[Resource]) -> Vec<Self> {
        ResourceType::all()
            .iter()
            .map(|resource_type| Self::new(*resource_type, scope.clone(), resources.to_vec()))
            .collect()
    }

    /// Parses a JSON array of resources.
    pub fn parse_fixtures(raw: &str) -> AppResult<Vec<Resource>> {
        serde_json::from_str(raw).map_err(|error| {
            AppError::Validation(format!("provider fixtures are not a resource array: {error}"))
        })
    }

    /// Reads a JSON array of resources from disk.
    pub async fn load_fixtures(path: &Path) -> AppResult<Vec<Resource>> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read provider fixtures '{}': {error}",
                path.display()
            ))
        })?;

        Self::parse_fixtures(raw.as_str())
    }

    fn not_found(&self, resource_id: &str) -> ProviderError {
        ProviderError::new(
            ProviderErrorKind::NotFound,
            format!("{} resource '{resource_id}' does not exist", self.resource_type),
        )
    }
}

#[async_trait]
impl ProviderAdapter for InMemoryProviderAdapter {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn scope(&self) -> AdapterScope {
        self.scope.clone()
    }

    async fn list(&self, _filters: &ResourceFilters) -> Result<Vec<Resource>, ProviderError> {
        Ok(self.resources.read().await.clone())
    }

    async fn get(&self, resource_id: &str) -> Result<Option<Resource>, ProviderError> {
        Ok(self
            .resources
            .read()
            .await
            .iter()
            .find(|resource| resource.resource_id == resource_id)
            .cloned())
    }

    async fn tags(&self, resource_id: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        self.get(resource_id)
            .await?
            .map(|resource| resource.tags)
            .ok_or_else(|| self.not_found(resource_id))
    }

    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResult, ProviderError> {
        let mut resources = self.resources.write().await;
        let mut targets = Map::new();

        for resource_id in &request.resource_ids {
            let resource = resources
                .iter()
                .find(|resource| &resource.resource_id == resource_id)
                .ok_or_else(|| self.not_found(resource_id))?;
            let transition = plan_transition(resource, request)?;
            targets.insert(resource_id.clone(), transition.describe());
        }

        if request.dry_run {
            return Ok(MutationResult::DryRun {
                details: json!({ "verb": request.verb.as_str(), "targets": targets }),
            });
        }

        for resource_id in &request.resource_ids {
            let Some(index) = resources
                .iter()
                .position(|resource| &resource.resource_id == resource_id)
            else {
                continue;
            };
            let transition = plan_transition(&resources[index], request)?;
            match transition.next_state {
                None => {
                    resources.remove(index);
                }
                Some(state) => {
                    let resource = &mut resources[index];
                    resource.state = Some(state);
                    if let Some(count) = transition.desired_count {
                        resource
                            .attributes
                            .insert(DESIRED_COUNT_ATTRIBUTE.to_owned(), Value::from(count));
                    }
                }
            }
        }

        Ok(MutationResult::Applied {
            details: json!({ "verb": request.verb.as_str(), "targets": targets }),
        })
    }
}

/// Account verifier for the fixture-backed provider.
///
/// A role can be assumed when the account is enabled and the role ARN names the same account.
#[derive(Debug, Default, Clone, Copy)]
pub struct InMemoryAccountVerifier;

#[async_trait]
impl AccountAccessVerifier for InMemoryAccountVerifier {
    async fn verify_access(&self, account: &ProviderAccount) -> Result<(), ProviderError> {
        if !account.enabled {
            return Err(ProviderError::new(
                ProviderErrorKind::Rejected,
                format!("provider account '{}' is disabled", account.account_id),
            ));
        }

        // arn:partition:iam::<account>:role/<name>
        let role_account = account.role_arn.split(':').nth(4).unwrap_or_default();
        if role_account != account.account_id {
            return Err(ProviderError::new(
                ProviderErrorKind::Rejected,
                format!(
                    "role '{}' cannot be assumed in account '{}'",
                    account.role_arn, account.account_id
                ),
            ));
        }

        Ok(())
    }
}

struct Transition {
    previous_state: Option<String>,
    /// `None` means the resource is removed.
    next_state: Option<String>,
    desired_count: Option<u64>,
}

impl Transition {
    fn describe(&self) -> Value {
        let mut description = json!({
            "previous_state": self.previous_state,
            "next_state": self.next_state.as_deref().unwrap_or("deleted"),
        });
        if let (Some(count), Some(object)) = (self.desired_count, description.as_object_mut()) {
            object.insert(DESIRED_COUNT_ATTRIBUTE.to_owned(), Value::from(count));
        }
        description
    }
}

fn plan_transition(
    resource: &Resource,
    request: &MutationRequest,
) -> Result<Transition, ProviderError> {
    let previous_state = resource.state.clone();
    if previous_state.as_deref() == Some(TERMINATED_STATE) {
        return Err(ProviderError::new(
            ProviderErrorKind::Rejected,
            format!(
                "resource '{}' is terminated and cannot be {}",
                resource.resource_id,
                past_tense(request.verb)
            ),
        ));
    }

    let unchanged = previous_state.clone().unwrap_or_default();
    let (next_state, desired_count) = match request.verb {
        ActionVerb::Start => (Some(started_state(resource.resource_type).to_owned()), None),
        ActionVerb::Stop => (Some("stopped".to_owned()), None),
        ActionVerb::Terminate => (Some(TERMINATED_STATE.to_owned()), None),
        ActionVerb::Delete => (None, None),
        ActionVerb::Scale => {
            let count = request
                .params
                .get(DESIRED_COUNT_ATTRIBUTE)
                .and_then(Value::as_u64)
                .ok_or_else(|| {
                    ProviderError::new(
                        ProviderErrorKind::Rejected,
                        "scale requires a non-negative integer desired_count",
                    )
                })?;
            (Some(unchanged), Some(count))
        }
    };

    Ok(Transition {
        previous_state,
        next_state,
        desired_count,
    })
}

fn started_state(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Database => "available",
        _ => "running",
    }
}

fn past_tense(verb: ActionVerb) -> &'static str {
    match verb {
        ActionVerb::Start => "started",
        ActionVerb::Stop => "stopped",
        ActionVerb::Terminate => "terminated",
        ActionVerb::Delete => "deleted",
        ActionVerb::Scale => "scaled",
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use cloudgate_core::AppResult;
use cloudgate_domain::{
    DependencyRelationship, ProtectionDecision, ProtectionPolicy, Resource, ResourceDependency,
    ResourceType,
};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::provider_ports::ProviderError;
use crate::provider_registry::ProviderRegistry;
use crate::resource_aggregator::ResourceFilters;

/// Attribute naming the instance a block volume is attached to.
pub const ATTACHED_TO_ATTRIBUTE: &str = "attached_to";

/// Attribute naming the source database of a read replica.
pub const READ_REPLICA_SOURCE_ATTRIBUTE: &str = "read_replica_source";

/// Evaluates protection rules against live provider tags.
#[derive(Clone)]
pub struct ProtectionService {
    registry: ProviderRegistry,
    policy: Arc<ProtectionPolicy>,
    call_timeout: Duration,
}

impl ProtectionService {
    /// Creates a protection service.
    #[must_use]
    pub fn new(
        registry: ProviderRegistry,
        policy: Arc<ProtectionPolicy>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            policy,
            call_timeout,
        }
    }

    /// Returns the configured policy.
    #[must_use]
    pub fn policy(&self) -> &ProtectionPolicy {
        &self.policy
    }

    /// Decides whether a resource may be mutated.
    ///
    /// Tag lookup failures count as "no tags". The override secret itself never
    /// appears in logs or reasons.
    pub async fn check(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
        override_code: Option<&str>,
    ) -> ProtectionDecision {
        let tags = self.current_tags(resource_type, resource_id).await;
        let decision = self.policy.evaluate(&tags, override_code);

        if decision.is_allowed() && self.policy.protection_reason(&tags).is_some() {
            info!(
                resource_type = resource_type.as_str(),
                resource_id, "protection overridden with admin override code"
            );
        }

        decision
    }

    /// Lists resources that depend on, or are depended on by, one resource.
    ///
    /// Advisory only; mutations are never blocked on dependents.
    pub async fn dependents(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> AppResult<Vec<ResourceDependency>> {
        match resource_type {
            ResourceType::Compute => {
                let volumes = self.list_type(ResourceType::BlockVolume).await?;
                Ok(volumes
                    .into_iter()
                    .filter(|volume| volume.attribute_str(ATTACHED_TO_ATTRIBUTE) == Some(resource_id))
                    .map(|volume| ResourceDependency {
                        resource_type: ResourceType::BlockVolume,
                        message: format!(
                            "block volume {} is attached to this instance",
                            volume.resource_id
                        ),
                        resource_id: volume.resource_id,
                        relationship: DependencyRelationship::AttachedVolume,
                    })
                    .collect())
            }
            ResourceType::BlockVolume => {
                let volumes = self.list_type(ResourceType::BlockVolume).await?;
                Ok(volumes
                    .iter()
                    .find(|volume| volume.resource_id == resource_id)
                    .and_then(|volume| volume.attribute_str(ATTACHED_TO_ATTRIBUTE))
                    .map(|instance_id| ResourceDependency {
                        resource_type: ResourceType::Compute,
                        resource_id: instance_id.to_owned(),
                        relationship: DependencyRelationship::AttachedInstance,
                        message: format!("volume is attached to instance {instance_id}"),
                    })
                    .into_iter()
                    .collect())
            }
            ResourceType::Database => {
                let databases = self.list_type(ResourceType::Database).await?;
                Ok(databases
                    .into_iter()
                    .filter(|database| {
                        database.attribute_str(READ_REPLICA_SOURCE_ATTRIBUTE) == Some(resource_id)
                    })
                    .map(|replica| ResourceDependency {
                        resource_type: ResourceType::Database,
                        message: format!(
                            "database {} is a read replica of this database",
                            replica.resource_id
                        ),
                        resource_id: replica.resource_id,
                        relationship: DependencyRelationship::ReadReplica,
                    })
                    .collect())
            }
            ResourceType::ContainerService | ResourceType::ObjectStore | ResourceType::Function => {
                Ok(Vec::new())
            }
        }
    }

    async fn current_tags(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> BTreeMap<String, String> {
        let Some(adapter) = self.registry.get(resource_type) else {
            warn!(
                resource_type = resource_type.as_str(),
                resource_id, "no provider adapter for tag lookup; evaluating without tags"
            );
            return BTreeMap::new();
        };

        let result = match timeout(self.call_timeout, adapter.tags(resource_id)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout("tags", resource_type)),
        };

        result.unwrap_or_else(|error| {
            warn!(
                resource_type = resource_type.as_str(),
                resource_id,
                error_kind = error.kind.as_str(),
                error = %error.message,
                "tag lookup failed; evaluating without tags"
            );
            BTreeMap::new()
        })
    }

    async fn list_type(&self, resource_type: ResourceType) -> AppResult<Vec<Resource>> {
        let adapter = self.registry.require(resource_type)?;
        let filters = ResourceFilters {
            resource_type: Some(resource_type.as_str().to_owned()),
            ..ResourceFilters::default()
        };

        match timeout(self.call_timeout, adapter.list(&filters)).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(ProviderError::timeout("list", resource_type).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use cloudgate_domain::{
        DependencyRelationship, ProtectionDecision, ProtectionPolicy, ResourceType,
    };
    use serde_json::json;

    use crate::provider_ports::ProviderError;
    use crate::provider_registry::ProviderRegistry;
    use crate::test_support::{FakeProviderAdapter, resource};

    use super::ProtectionService;

    fn policy() -> Arc<ProtectionPolicy> {
        Arc::new(ProtectionPolicy::from_csv(
            "production,prod,critical",
            Some("open-sesame".to_owned()),
        ))
    }

    fn service(registry: ProviderRegistry) -> ProtectionService {
        ProtectionService::new(registry, policy(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn production_database_requires_exact_override() {
        let registry = ProviderRegistry::new().with_adapter(
            FakeProviderAdapter::new(
                ResourceType::Database,
                vec![resource(
                    ResourceType::Database,
                    "orders-db",
                    None,
                    &[("Environment", "production")],
                )],
            )
            .shared(),
        );
        let service = service(registry);

        let denied = service.check(ResourceType::Database, "orders-db", None).await;
        let near_miss = service
            .check(ResourceType::Database, "orders-db", Some("open-sesamE"))
            .await;
        let allowed = service
            .check(ResourceType::Database, "orders-db", Some("open-sesame"))
            .await;

        assert!(matches!(denied, ProtectionDecision::Deny { .. }));
        assert!(matches!(near_miss, ProtectionDecision::Deny { .. }));
        assert_eq!(allowed, ProtectionDecision::Allow);
    }

    #[tokio::test]
    async fn tag_lookup_failure_fails_open() {
        let registry = ProviderRegistry::new().with_adapter(
            FakeProviderAdapter::new(ResourceType::Compute, Vec::new())
                .failing_reads(ProviderError::unavailable("ec2 throttled"))
                .shared(),
        );

        let decision = service(registry)
            .check(ResourceType::Compute, "i-1", None)
            .await;

        assert_eq!(decision, ProtectionDecision::Allow);
    }

    #[tokio::test]
    async fn dependents_report_attached_volumes_and_replicas() {
        let mut attached = resource(ResourceType::BlockVolume, "vol-1", None, &[]);
        attached
            .attributes
            .insert("attached_to".to_owned(), json!("i-1"));
        let detached = resource(ResourceType::BlockVolume, "vol-2", None, &[]);
        let mut replica = resource(ResourceType::Database, "orders-replica", None, &[]);
        replica
            .attributes
            .insert("read_replica_source".to_owned(), json!("orders-db"));

        let registry = ProviderRegistry::new()
            .with_adapter(
                FakeProviderAdapter::new(ResourceType::BlockVolume, vec![attached, detached])
                    .shared(),
            )
            .with_adapter(
                FakeProviderAdapter::new(
                    ResourceType::Database,
                    vec![
                        resource(ResourceType::Database, "orders-db", None, &[]),
                        replica,
                    ],
                )
                .shared(),
            );
        let service = service(registry);

        let instance = service.dependents(ResourceType::Compute, "i-1").await;
        let volume = service.dependents(ResourceType::BlockVolume, "vol-1").await;
        let database = service.dependents(ResourceType::Database, "orders-db").await;

        let (Ok(instance), Ok(volume), Ok(database)) = (instance, volume, database) else {
            panic!("dependency lookups should succeed");
        };
        assert_eq!(instance.len(), 1);
        assert_eq!(instance[0].resource_id, "vol-1");
        assert_eq!(volume[0].relationship, DependencyRelationship::AttachedInstance);
        assert_eq!(volume[0].resource_id, "i-1");
        assert_eq!(database[0].relationship, DependencyRelationship::ReadReplica);
        assert_eq!(database[0].resource_id, "orders-replica");
    }
}

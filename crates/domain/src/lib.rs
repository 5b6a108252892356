//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod account;
mod action;
mod protection;
mod resource;
mod resource_id;

pub use account::{ProviderAccountDraft, account_audit_snapshot};
pub use action::{ActionKind, ActionStatus, ActionVerb};
pub use protection::{
    DependencyRelationship, ENVIRONMENT_TAG, PROTECTED_TAG, ProtectionDecision, ProtectionPolicy,
    ResourceDependency,
};
pub use resource::{AuditResourceType, Resource, ResourceType};
pub use resource_id::{IdShape, candidate_resource_types, classify_resource_id};

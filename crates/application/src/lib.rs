//! Application services and ports.

#![forbid(unsafe_code)]

mod account_ports;
mod account_service;
mod action_pipeline;
mod audit_ports;
mod audit_service;
mod cache_ports;
mod pagination;
mod protection_service;
mod provider_ports;
mod provider_registry;
mod resource_aggregator;
mod resource_query_service;

#[cfg(test)]
mod test_support;

pub use account_ports::{
    AccountAccessVerifier, AccountRepository, ProviderAccount, sort_accounts,
};
pub use account_service::{AccountService, AccountVerification};
pub use action_pipeline::{
    ActionOutcome, ActionPipeline, ActionPipelineOptions, ActionRequest, PartialBatchMode,
    TargetResult, TargetStatus,
};
pub use audit_ports::{
    AuditEntry, AuditEntryFilter, AuditEntryPage, AuditRepository, MAX_AUDIT_EXPORT,
};
pub use audit_service::{AuditRecordInput, AuditService, MAX_AUDIT_PAGE_SIZE, RequestContext};
pub use cache_ports::ResourceCache;
pub use protection_service::{
    ATTACHED_TO_ATTRIBUTE, ProtectionService, READ_REPLICA_SOURCE_ATTRIBUTE,
};
pub use provider_ports::{
    AdapterScope, MutationRequest, MutationResult, ProviderAdapter, ProviderError,
    ProviderErrorKind,
};
pub use provider_registry::ProviderRegistry;
pub use resource_aggregator::{
    AggregatedResources, MAX_RESOURCE_PAGE_SIZE, ProviderFailure, ResourceAggregator,
    ResourceFilters, ResourcePage, validate_page,
};
pub use resource_query_service::{
    MAX_RESOURCE_EXPORT, ResourceQueryService, detail_cache_key, list_cache_key,
    render_resources_csv,
};

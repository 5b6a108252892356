use cloudgate_application::{
    AccountService, ActionPipeline, AuditService, ProtectionService, ResourceQueryService,
};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub resource_query_service: ResourceQueryService,
    pub protection_service: ProtectionService,
    pub audit_service: AuditService,
    pub action_pipeline: ActionPipeline,
    pub account_service: AccountService,
    pub postgres_pool: Option<PgPool>,
    pub redis_client: Option<redis::Client>,
    pub redis_required: bool,
}

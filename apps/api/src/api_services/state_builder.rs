use std::sync::Arc;

use cloudgate_application::{
    AccountAccessVerifier, AccountRepository, AccountService, ActionPipeline, AuditRepository,
    AuditService, ProtectionService, ProviderRegistry, ResourceAggregator, ResourceCache,
    ResourceQueryService,
};
use cloudgate_core::{AppError, AppResult};
use cloudgate_infrastructure::{
    InMemoryAccountRepository, InMemoryAuditRepository, InMemoryResourceCache,
    PostgresAccountRepository, PostgresAuditRepository, RedisResourceCache,
};
use sqlx::PgPool;

use crate::api_config::{ApiConfig, CacheBackend};
use crate::state::AppState;

use super::providers::{build_account_verifier, build_provider_registry};
use super::redis::build_redis_client;

/// Adapters wired into the application services.
pub struct AppStateParts {
    pub registry: ProviderRegistry,
    pub cache: Arc<dyn ResourceCache>,
    pub audit_repository: Arc<dyn AuditRepository>,
    pub account_repository: Arc<dyn AccountRepository>,
    pub account_verifier: Arc<dyn AccountAccessVerifier>,
    pub postgres_pool: Option<PgPool>,
    pub redis_client: Option<redis::Client>,
}

pub async fn build_app_state(pool: Option<PgPool>, config: &ApiConfig) -> AppResult<AppState> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let cache = build_resource_cache(config, redis_client.clone())?;
    let audit_repository: Arc<dyn AuditRepository> = match &pool {
        Some(pool) => Arc::new(PostgresAuditRepository::new(pool.clone())),
        None => Arc::new(InMemoryAuditRepository::new()),
    };
    let account_repository: Arc<dyn AccountRepository> = match &pool {
        Some(pool) => Arc::new(PostgresAccountRepository::new(pool.clone())),
        None => Arc::new(InMemoryAccountRepository::new()),
    };
    let registry = build_provider_registry(config).await?;
    let account_verifier = build_account_verifier(config)?;

    Ok(assemble_app_state(
        AppStateParts {
            registry,
            cache,
            audit_repository,
            account_repository,
            account_verifier,
            postgres_pool: pool,
            redis_client,
        },
        config,
    ))
}

pub fn assemble_app_state(parts: AppStateParts, config: &ApiConfig) -> AppState {
    let aggregator = ResourceAggregator::new(parts.registry.clone(), config.provider_call_timeout);
    let resource_query_service =
        ResourceQueryService::new(aggregator, parts.cache, config.cache_ttl_seconds);
    let protection_service = ProtectionService::new(
        parts.registry.clone(),
        Arc::new(config.protection_policy.clone()),
        config.provider_call_timeout,
    );
    let audit_service = AuditService::new(parts.audit_repository);
    let account_service = AccountService::new(
        parts.account_repository,
        parts.account_verifier,
        audit_service.clone(),
        config.provider_region.clone(),
        config.provider_call_timeout,
    );
    let action_pipeline = ActionPipeline::new(
        parts.registry,
        protection_service.clone(),
        audit_service.clone(),
        resource_query_service.clone(),
        config.pipeline_options,
    );

    AppState {
        resource_query_service,
        protection_service,
        audit_service,
        action_pipeline,
        account_service,
        postgres_pool: parts.postgres_pool,
        redis_client: parts.redis_client,
        redis_required: config.cache_backend == CacheBackend::Redis,
    }
}

fn build_resource_cache(
    config: &ApiConfig,
    redis_client: Option<redis::Client>,
) -> AppResult<Arc<dyn ResourceCache>> {
    match config.cache_backend {
        CacheBackend::InMemory => Ok(Arc::new(InMemoryResourceCache::new())),
        CacheBackend::Redis => {
            let redis_client = redis_client.ok_or_else(|| {
                AppError::Validation("REDIS_URL is required when CACHE_BACKEND=redis".to_owned())
            })?;
            Ok(Arc::new(RedisResourceCache::new(
                redis_client,
                config.cache_key_prefix.clone(),
            )))
        }
    }
}

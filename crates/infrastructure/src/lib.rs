//! Infrastructure adapters for providers, caching, accounts and audit persistence.

#![forbid(unsafe_code)]

mod http_provider_adapter;
mod in_memory_account_repository;
mod in_memory_audit_repository;
mod in_memory_provider_adapter;
mod in_memory_resource_cache;
mod postgres_account_repository;
mod postgres_audit_repository;
mod redis_resource_cache;

pub use http_provider_adapter::{
    HttpAccountVerifier, HttpProviderAdapter, HttpProviderGatewayConfig,
};
pub use in_memory_account_repository::InMemoryAccountRepository;
pub use in_memory_audit_repository::InMemoryAuditRepository;
pub use in_memory_provider_adapter::{InMemoryAccountVerifier, InMemoryProviderAdapter};
pub use in_memory_resource_cache::InMemoryResourceCache;
pub use postgres_account_repository::PostgresAccountRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use redis_resource_cache::RedisResourceCache;

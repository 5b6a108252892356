use std::sync::Arc;

use cloudgate_application::{AccountAccessVerifier, AdapterScope, ProviderRegistry};
use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::ResourceType;
use cloudgate_infrastructure::{
    HttpAccountVerifier, HttpProviderAdapter, HttpProviderGatewayConfig, InMemoryAccountVerifier,
    InMemoryProviderAdapter,
};
use tracing::info;
use url::Url;

use crate::api_config::{ApiConfig, ProviderBackendConfig};

const GATEWAY_READ_ATTEMPTS: u8 = 3;
const GATEWAY_RETRY_BACKOFF_MS: u64 = 200;

pub(super) async fn build_provider_registry(config: &ApiConfig) -> AppResult<ProviderRegistry> {
    let scope = adapter_scope(config);

    match &config.provider_backend {
        ProviderBackendConfig::InMemory { fixtures_path } => {
            let resources = match fixtures_path {
                Some(path) => InMemoryProviderAdapter::load_fixtures(path).await?,
                None => Vec::new(),
            };
            info!(
                resources = resources.len(),
                "using in-memory provider adapters"
            );

            Ok(InMemoryProviderAdapter::for_all_types(&scope, &resources)
                .into_iter()
                .fold(ProviderRegistry::new(), |registry, adapter| {
                    registry.with_adapter(Arc::new(adapter))
                }))
        }
        ProviderBackendConfig::Http {
            gateway_url,
            bearer_token,
        } => {
            let http_client = gateway_http_client(config)?;
            info!(gateway = %gateway_url, "using provider gateway adapters");

            Ok(ResourceType::all()
                .iter()
                .fold(ProviderRegistry::new(), |registry, resource_type| {
                    registry.with_adapter(Arc::new(HttpProviderAdapter::new(
                        http_client.clone(),
                        *resource_type,
                        gateway_config(gateway_url, bearer_token.as_deref(), &scope),
                    )))
                }))
        }
    }
}

pub(super) fn build_account_verifier(
    config: &ApiConfig,
) -> AppResult<Arc<dyn AccountAccessVerifier>> {
    match &config.provider_backend {
        ProviderBackendConfig::InMemory { .. } => Ok(Arc::new(InMemoryAccountVerifier)),
        ProviderBackendConfig::Http {
            gateway_url,
            bearer_token,
        } => Ok(Arc::new(HttpAccountVerifier::new(
            gateway_http_client(config)?,
            gateway_config(gateway_url, bearer_token.as_deref(), &adapter_scope(config)),
        ))),
    }
}

fn adapter_scope(config: &ApiConfig) -> AdapterScope {
    AdapterScope {
        account_id: config.provider_account_id.clone(),
        region: config.provider_region.clone(),
    }
}

fn gateway_http_client(config: &ApiConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.provider_call_timeout)
        .build()
        .map_err(|error| {
            AppError::Internal(format!("failed to build provider http client: {error}"))
        })
}

fn gateway_config(
    gateway_url: &Url,
    bearer_token: Option<&str>,
    scope: &AdapterScope,
) -> HttpProviderGatewayConfig {
    HttpProviderGatewayConfig {
        base_url: gateway_url.clone(),
        scope: scope.clone(),
        bearer_token: bearer_token.map(ToOwned::to_owned),
        max_attempts: GATEWAY_READ_ATTEMPTS,
        retry_backoff_ms: GATEWAY_RETRY_BACKOFF_MS,
    }
}

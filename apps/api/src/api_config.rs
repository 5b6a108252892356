use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cloudgate_application::{ActionPipelineOptions, PartialBatchMode};
use cloudgate_core::AppError;
use cloudgate_domain::ProtectionPolicy;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEFAULT_PROTECTED_TAGS: &str = "production,prod,critical";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStoreConfig {
    Postgres { database_url: String },
    InMemory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    InMemory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderBackendConfig {
    InMemory {
        fixtures_path: Option<PathBuf>,
    },
    Http {
        gateway_url: Url,
        bearer_token: Option<String>,
    },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub audit_store: AuditStoreConfig,
    pub redis_url: Option<String>,
    pub cache_backend: CacheBackend,
    pub cache_ttl_seconds: u32,
    pub cache_key_prefix: String,
    pub api_host: String,
    pub api_port: u16,
    pub provider_backend: ProviderBackendConfig,
    pub provider_account_id: String,
    pub provider_region: String,
    pub provider_call_timeout: Duration,
    pub protection_policy: ProtectionPolicy,
    pub pipeline_options: ActionPipelineOptions,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup<F>(migrate_only: bool, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let audit_store = match optional("AUDIT_STORE")
            .unwrap_or_else(|| "postgres".to_owned())
            .as_str()
        {
            "postgres" => AuditStoreConfig::Postgres {
                database_url: optional("DATABASE_URL").ok_or_else(|| {
                    AppError::Validation(
                        "DATABASE_URL is required when AUDIT_STORE=postgres".to_owned(),
                    )
                })?,
            },
            "in_memory" => AuditStoreConfig::InMemory,
            other => {
                return Err(AppError::Validation(format!(
                    "AUDIT_STORE must be either 'postgres' or 'in_memory', got '{other}'"
                )));
            }
        };

        let redis_url = optional("REDIS_URL");
        let cache_backend = match optional("CACHE_BACKEND")
            .unwrap_or_else(|| "in_memory".to_owned())
            .as_str()
        {
            "in_memory" => CacheBackend::InMemory,
            "redis" => {
                if redis_url.is_none() {
                    return Err(AppError::Validation(
                        "REDIS_URL is required when CACHE_BACKEND=redis".to_owned(),
                    ));
                }
                CacheBackend::Redis
            }
            other => {
                return Err(AppError::Validation(format!(
                    "CACHE_BACKEND must be either 'in_memory' or 'redis', got '{other}'"
                )));
            }
        };

        let cache_ttl_seconds = parse_or("CACHE_TTL_SECONDS", optional("CACHE_TTL_SECONDS"), 300)?;
        let cache_key_prefix =
            optional("CACHE_KEY_PREFIX").unwrap_or_else(|| "cloudgate".to_owned());

        let api_host = optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned());
        let api_port = parse_or("API_PORT", optional("API_PORT"), 8000)?;

        let provider_backend = match optional("PROVIDER_BACKEND")
            .unwrap_or_else(|| "in_memory".to_owned())
            .as_str()
        {
            "in_memory" => ProviderBackendConfig::InMemory {
                fixtures_path: optional("PROVIDER_FIXTURES_PATH").map(PathBuf::from),
            },
            "http" => {
                let raw_url = optional("PROVIDER_GATEWAY_URL").ok_or_else(|| {
                    AppError::Validation(
                        "PROVIDER_GATEWAY_URL is required when PROVIDER_BACKEND=http".to_owned(),
                    )
                })?;
                let gateway_url = Url::parse(raw_url.as_str()).map_err(|error| {
                    AppError::Validation(format!("invalid PROVIDER_GATEWAY_URL: {error}"))
                })?;
                ProviderBackendConfig::Http {
                    gateway_url,
                    bearer_token: optional("PROVIDER_GATEWAY_TOKEN"),
                }
            }
            other => {
                return Err(AppError::Validation(format!(
                    "PROVIDER_BACKEND must be either 'in_memory' or 'http', got '{other}'"
                )));
            }
        };

        let provider_account_id =
            optional("PROVIDER_ACCOUNT_ID").unwrap_or_else(|| "000000000000".to_owned());
        let provider_region = optional("PROVIDER_REGION").unwrap_or_else(|| "us-east-1".to_owned());
        let timeout_seconds: u64 = parse_or(
            "PROVIDER_CALL_TIMEOUT_SECONDS",
            optional("PROVIDER_CALL_TIMEOUT_SECONDS"),
            30,
        )?;
        if timeout_seconds == 0 {
            return Err(AppError::Validation(
                "PROVIDER_CALL_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }
        let provider_call_timeout = Duration::from_secs(timeout_seconds);

        let protection_policy = ProtectionPolicy::from_csv(
            optional("PROTECTED_TAGS")
                .as_deref()
                .unwrap_or(DEFAULT_PROTECTED_TAGS),
            optional("ADMIN_OVERRIDE_CODE"),
        );

        let audit_protection_denials = optional("AUDIT_PROTECTION_DENIALS")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        let partial_batch_mode = optional("PARTIAL_BATCH_MODE")
            .map(|value| PartialBatchMode::from_str(value.as_str()))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            migrate_only,
            audit_store,
            redis_url,
            cache_backend,
            cache_ttl_seconds,
            cache_key_prefix,
            api_host,
            api_port,
            provider_backend,
            provider_account_id,
            provider_region,
            provider_call_timeout,
            protection_policy,
            pipeline_options: ActionPipelineOptions {
                partial_batch_mode,
                audit_protection_denials,
                call_timeout: provider_call_timeout,
            },
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_or<T>(name: &str, value: Option<String>, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name} '{value}': {error}"))),
    }
}

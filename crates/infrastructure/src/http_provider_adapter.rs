use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use cloudgate_application::{
    AccountAccessVerifier, AdapterScope, MutationRequest, MutationResult, ProviderAccount,
    ProviderAdapter, ProviderError, ProviderErrorKind, ResourceFilters,
};
use cloudgate_domain::{Resource, ResourceType};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use url::Url;

/// Connection settings shared by every HTTP provider adapter.
#[derive(Debug, Clone)]
pub struct HttpProviderGatewayConfig {
    /// Gateway root, for example `https://gateway.internal/`.
    pub base_url: Url,
    /// Account and region the gateway operates on.
    pub scope: AdapterScope,
    /// Optional bearer token sent on every call.
    pub bearer_token: Option<String>,
    /// Attempts for idempotent reads.
    pub max_attempts: u8,
    /// Linear backoff step between read attempts.
    pub retry_backoff_ms: u64,
}

/// Provider adapter that forwards calls to a provider gateway over HTTP.
///
/// Routes are rooted at `v1/<resource_type>/`:
/// `GET resources`, `GET resources/<id>`, `GET resources/<id>/tags` and
/// `POST actions/<verb>`.
pub struct HttpProviderAdapter {
    http_client: reqwest::Client,
    resource_type: ResourceType,
    config: HttpProviderGatewayConfig,
}

#[derive(Debug, Deserialize)]
struct GatewayMutationResponse {
    dry_run: bool,
    #[serde(default)]
    details: Value,
}

impl HttpProviderAdapter {
    /// Creates an adapter for one resource family.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        resource_type: ResourceType,
        mut config: HttpProviderGatewayConfig,
    ) -> Self {
        config.max_attempts = config.max_attempts.max(1);
        config.retry_backoff_ms = config.retry_backoff_ms.max(50);

        Self {
            http_client,
            resource_type,
            config,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        gateway_endpoint(&self.config, self.resource_type.as_str(), segments)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        authorize(&self.config, builder)
    }

    async fn get_with_retry(
        &self,
        operation: &str,
        url: Url,
    ) -> Result<reqwest::Response, ProviderError> {
        let mut attempt = 0_u8;
        let mut last_error = ProviderError::unavailable(format!(
            "{operation} call to the {} provider was not attempted",
            self.resource_type
        ));

        while attempt < self.config.max_attempts {
            attempt = attempt.saturating_add(1);
            let response = self
                .authorize(self.http_client.get(url.clone()))
                .send()
                .await;

            match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if is_transient(response.status()) => {
                    last_error = status_error(operation, response.status(), String::new());
                }
                Ok(response) => return Err(read_status_error(operation, response).await),
                Err(error) => {
                    last_error = transport_error(operation, &error);
                }
            }

            if attempt < self.config.max_attempts {
                let delay = self
                    .config
                    .retry_backoff_ms
                    .saturating_mul(u64::from(attempt));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl ProviderAdapter for HttpProviderAdapter {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    fn scope(&self) -> AdapterScope {
        self.config.scope.clone()
    }

    async fn list(&self, filters: &ResourceFilters) -> Result<Vec<Resource>, ProviderError> {
        let mut url = self.endpoint(&["resources"])?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(region) = filters.region.as_deref() {
                query.append_pair("region", region);
            }
            if let Some(state) = filters.state.as_deref() {
                query.append_pair("state", state);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.get_with_retry("list", url).await?;
        let resources: Vec<Resource> = decode(response, "list").await?;

        let (matching, foreign): (Vec<Resource>, Vec<Resource>) = resources
            .into_iter()
            .partition(|resource| resource.resource_type == self.resource_type);
        if !foreign.is_empty() {
            warn!(
                resource_type = self.resource_type.as_str(),
                dropped = foreign.len(),
                "provider gateway returned resources of another type"
            );
        }

        Ok(matching)
    }

    async fn get(&self, resource_id: &str) -> Result<Option<Resource>, ProviderError> {
        let url = self.endpoint(&["resources", resource_id])?;

        match self.get_with_retry("get", url).await {
            Ok(response) => decode(response, "get").await.map(Some),
            Err(error) if error.kind == ProviderErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn tags(&self, resource_id: &str) -> Result<BTreeMap<String, String>, ProviderError> {
        let url = self.endpoint(&["resources", resource_id, "tags"])?;
        let response = self.get_with_retry("tags", url).await?;

        decode(response, "tags").await
    }

    async fn mutate(&self, request: &MutationRequest) -> Result<MutationResult, ProviderError> {
        let url = self.endpoint(&["actions", request.verb.as_str()])?;
        let body = serde_json::json!({
            "resource_ids": request.resource_ids,
            "dry_run": request.dry_run,
            "params": request.params,
        });

        // Mutations are sent once; a repeated stop or delete is not safe to assume.
        let response = self
            .authorize(self.http_client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error("mutate", &error))?;

        if !response.status().is_success() {
            return Err(read_status_error("mutate", response).await);
        }

        let payload: GatewayMutationResponse = decode(response, "mutate").await?;
        if payload.dry_run {
            Ok(MutationResult::DryRun {
                details: payload.details,
            })
        } else {
            Ok(MutationResult::Applied {
                details: payload.details,
            })
        }
    }
}

/// Checks account access through the gateway's `POST v1/accounts/verify` route.
///
/// The call is sent once. Any non-success status means the role could not be assumed.
pub struct HttpAccountVerifier {
    http_client: reqwest::Client,
    config: HttpProviderGatewayConfig,
}

impl HttpAccountVerifier {
    /// Creates a verifier sharing the provider adapters' gateway settings.
    #[must_use]
    pub fn new(http_client: reqwest::Client, config: HttpProviderGatewayConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl AccountAccessVerifier for HttpAccountVerifier {
    async fn verify_access(&self, account: &ProviderAccount) -> Result<(), ProviderError> {
        let url = gateway_endpoint(&self.config, "accounts", &["verify"])?;
        let body = serde_json::json!({
            "account_id": account.account_id,
            "role_arn": account.role_arn,
            "external_id": account.external_id,
        });

        let response = authorize(&self.config, self.http_client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|error| transport_error("verify", &error))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(read_status_error("verify", response).await)
        }
    }
}

fn gateway_endpoint(
    config: &HttpProviderGatewayConfig,
    family: &str,
    segments: &[&str],
) -> Result<Url, ProviderError> {
    let mut url = config.base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| {
            ProviderError::unavailable(format!(
                "provider gateway url '{}' cannot carry a path",
                config.base_url
            ))
        })?;
        path.pop_if_empty().push("v1").push(family).extend(segments);
    }

    Ok(url)
}

fn authorize(
    config: &HttpProviderGatewayConfig,
    builder: reqwest::RequestBuilder,
) -> reqwest::RequestBuilder {
    match config.bearer_token.as_deref() {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

fn is_transient(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn status_error(operation: &str, status: StatusCode, body: String) -> ProviderError {
    let kind = match status {
        StatusCode::NOT_FOUND => ProviderErrorKind::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderErrorKind::Timeout,
        status if is_transient(status) => ProviderErrorKind::Unavailable,
        _ => ProviderErrorKind::Rejected,
    };

    let message = if body.trim().is_empty() {
        format!("provider gateway {operation} call returned status {status}")
    } else {
        format!(
            "provider gateway {operation} call returned status {status}: {}",
            body.trim()
        )
    };

    ProviderError::new(kind, message)
}

async fn read_status_error(operation: &str, response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());

    status_error(operation, status, body)
}

fn transport_error(operation: &str, error: &reqwest::Error) -> ProviderError {
    let kind = if error.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Unavailable
    };

    ProviderError::new(
        kind,
        format!("provider gateway {operation} transport error: {error}"),
    )
}

async fn decode<T>(response: reqwest::Response, operation: &str) -> Result<T, ProviderError>
where
    T: serde::de::DeserializeOwned,
{
    response.json::<T>().await.map_err(|error| {
        ProviderError::unavailable(format!(
            "provider gateway {operation} response could not be decoded: {error}"
        ))
    })
}

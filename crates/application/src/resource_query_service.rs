use std::sync::Arc;

use cloudgate_core::AppResult;
use cloudgate_domain::{Resource, ResourceType};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::cache_ports::ResourceCache;
use crate::resource_aggregator::{ResourceAggregator, ResourceFilters, ResourcePage};

/// Upper bound on resources returned by one export.
pub const MAX_RESOURCE_EXPORT: usize = 10_000;

const CSV_HEADER: [&str; 7] = [
    "Resource ID",
    "Type",
    "Name",
    "Region",
    "State",
    "Tags",
    "Monthly Cost",
];

/// Read path over the aggregator with write-through caching.
#[derive(Clone)]
pub struct ResourceQueryService {
    aggregator: ResourceAggregator,
    cache: Arc<dyn ResourceCache>,
    ttl_seconds: u32,
}

impl ResourceQueryService {
    /// Creates a query service.
    #[must_use]
    pub fn new(
        aggregator: ResourceAggregator,
        cache: Arc<dyn ResourceCache>,
        ttl_seconds: u32,
    ) -> Self {
        Self {
            aggregator,
            cache,
            ttl_seconds,
        }
    }

    /// Returns the underlying aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &ResourceAggregator {
        &self.aggregator
    }

    /// Lists one page of resources, serving from cache when possible.
    ///
    /// Pages assembled while a provider was failing are not cached.
    pub async fn list_resources(
        &self,
        filters: &ResourceFilters,
        page: u32,
        page_size: u32,
    ) -> AppResult<ResourcePage> {
        let key = list_cache_key(filters, page, page_size);
        if let Some(cached) = self.cached::<ResourcePage>(key.as_str()).await {
            return Ok(cached);
        }

        let listed = self.aggregator.list(filters, page, page_size).await?;
        if listed.failed_providers.is_empty() {
            self.store(key.as_str(), &listed).await;
        }

        Ok(listed)
    }

    /// Returns one resource by id, serving from cache when possible.
    pub async fn get_resource(&self, resource_id: &str) -> AppResult<Resource> {
        let key = detail_cache_key(resource_id);
        if let Some(cached) = self.cached::<Resource>(key.as_str()).await {
            return Ok(cached);
        }

        let resource = self.aggregator.get(resource_id).await?;
        self.store(key.as_str(), &resource).await;
        Ok(resource)
    }

    /// Returns every matching resource up to the export cap.
    pub async fn export_resources(&self, filters: &ResourceFilters) -> Vec<Resource> {
        let mut aggregated = self.aggregator.collect(filters).await;
        aggregated.resources.truncate(MAX_RESOURCE_EXPORT);
        aggregated.resources
    }

    /// Drops cached views that may include resources of one type.
    ///
    /// Cache failures are logged; the caller's mutation already happened.
    pub async fn invalidate_type(&self, resource_type: ResourceType) {
        for pattern in [
            format!("resources:{}:*", resource_type.as_str()),
            "resources:any:*".to_owned(),
        ] {
            match self.cache.delete_matching(pattern.as_str()).await {
                Ok(deleted) => debug!(
                    pattern = pattern.as_str(),
                    deleted,
                    "invalidated cached resource views"
                ),
                Err(error) => warn!(
                    pattern = pattern.as_str(),
                    %error,
                    "failed to invalidate cached resource views"
                ),
            }
        }
    }

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = match self.cache.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(key, "resource cache miss");
                return None;
            }
            Err(error) => {
                warn!(key, %error, "resource cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str(payload.as_str()) {
            Ok(value) => {
                debug!(key, "resource cache hit");
                Some(value)
            }
            Err(error) => {
                warn!(key, %error, "discarding undecodable cached resource view");
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(key, %error, "failed to serialize resource view for cache");
                return;
            }
        };

        if let Err(error) = self.cache.set(key, payload.as_str(), self.ttl_seconds).await {
            warn!(key, %error, "resource cache write failed");
        }
    }
}

/// Returns the cache key for one listing page.
#[must_use]
pub fn list_cache_key(filters: &ResourceFilters, page: u32, page_size: u32) -> String {
    let canonical = serde_json::to_string(filters).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();

    format!(
        "resources:{}:list:{hex}:{page}:{page_size}",
        filters.type_segment()
    )
}

/// Returns the cache key for one resource detail view.
#[must_use]
pub fn detail_cache_key(resource_id: &str) -> String {
    format!("resources:any:detail:{}", resource_id.trim())
}

/// Renders resources as CSV with a header row.
#[must_use]
pub fn render_resources_csv(resources: &[Resource]) -> String {
    let mut output = String::new();
    push_csv_row(&mut output, CSV_HEADER.iter().map(|value| (*value).to_owned()));

    for resource in resources {
        let tags = resource
            .tags
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        push_csv_row(
            &mut output,
            [
                resource.resource_id.clone(),
                resource.resource_type.as_str().to_owned(),
                resource.name.clone().unwrap_or_default(),
                resource.region.clone(),
                resource.state.clone().unwrap_or_default(),
                tags,
                resource
                    .monthly_cost
                    .map(|cost| format!("{cost:.2}"))
                    .unwrap_or_default(),
            ],
        );
    }

    output
}

fn push_csv_row(output: &mut String, fields: impl IntoIterator<Item = String>) {
    let row = fields
        .into_iter()
        .map(|field| escape_csv_field(field.as_str()))
        .collect::<Vec<_>>()
        .join(",");
    output.push_str(row.as_str());
    output.push_str("\r\n");
}

// Quote when the field holds a delimiter, quote, or line break; double inner quotes.
fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        return format!("\"{}\"", field.replace('"', "\"\""));
    }

    field.to_owned()
}

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::{Resource, ResourceType, candidate_resource_types};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::pagination::PageWindow;
use crate::provider_ports::{ProviderAdapter, ProviderError, ProviderErrorKind};
use crate::provider_registry::ProviderRegistry;

/// Largest accepted resource page size.
pub const MAX_RESOURCE_PAGE_SIZE: u32 = 1_000;

/// Resource listing filters, applied in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceFilters {
    /// Resource type name or alias. An unknown value yields an empty result.
    pub resource_type: Option<String>,
    /// Exact region.
    pub region: Option<String>,
    /// Lifecycle state, compared case-insensitively.
    pub state: Option<String>,
    /// Tag key that must be present.
    pub tag_key: Option<String>,
    /// Tag value required under `tag_key`.
    pub tag_value: Option<String>,
    /// Case-insensitive substring over id and name.
    pub search: Option<String>,
}

impl ResourceFilters {
    /// Returns the parsed resource type filter.
    ///
    /// `Ok(None)` means no type filter; `Err(())` means the filter names an unknown type.
    fn parsed_resource_type(&self) -> Result<Option<ResourceType>, ()> {
        match self.resource_type.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => ResourceType::from_str(value).map(Some).map_err(|_| ()),
        }
    }

    /// Returns the canonical type segment used in cache keys.
    #[must_use]
    pub fn type_segment(&self) -> &'static str {
        match self.parsed_resource_type() {
            Ok(Some(resource_type)) => resource_type.as_str(),
            _ => "any",
        }
    }

    fn matches(&self, resource: &Resource, resource_type: Option<ResourceType>) -> bool {
        if resource_type.is_some_and(|expected| resource.resource_type != expected) {
            return false;
        }

        if let Some(region) = non_blank(self.region.as_deref())
            && resource.region != region
        {
            return false;
        }

        if let Some(state) = non_blank(self.state.as_deref())
            && !resource
                .state
                .as_deref()
                .is_some_and(|current| current.eq_ignore_ascii_case(state))
        {
            return false;
        }

        if let Some(tag_key) = non_blank(self.tag_key.as_deref()) {
            let Some(current) = resource.tag(tag_key) else {
                return false;
            };

            if let Some(tag_value) = self.tag_value.as_deref()
                && current != tag_value
            {
                return false;
            }
        }

        if let Some(search) = non_blank(self.search.as_deref())
            && !resource.matches_search(search)
        {
            return false;
        }

        true
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A provider that failed during one aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Resource type served by the failed provider.
    pub resource_type: ResourceType,
    /// Failure category.
    pub kind: ProviderErrorKind,
}

/// One page of aggregated resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePage {
    /// Resources on this page.
    pub items: Vec<Resource>,
    /// Total resources matching the filters.
    pub total: u64,
    /// 1-based page index.
    pub page: u32,
    /// Page size used.
    pub page_size: u32,
    /// Whether another page follows.
    pub has_more: bool,
    /// Providers whose results are missing from this page.
    #[serde(default)]
    pub failed_providers: Vec<ProviderFailure>,
}

/// Filtered and sorted resources from every queried provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResources {
    /// Matching resources in listing order.
    pub resources: Vec<Resource>,
    /// Providers that failed and contributed nothing.
    pub failed_providers: Vec<ProviderFailure>,
}

/// Fans out reads across provider adapters and merges their results.
#[derive(Clone)]
pub struct ResourceAggregator {
    registry: ProviderRegistry,
    call_timeout: Duration,
}

impl ResourceAggregator {
    /// Creates an aggregator over a registry with a per-call deadline.
    #[must_use]
    pub fn new(registry: ProviderRegistry, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    /// Returns the adapter registry.
    #[must_use]
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Lists one page of resources across providers.
    ///
    /// A failing provider contributes zero resources and never fails the call.
    pub async fn list(
        &self,
        filters: &ResourceFilters,
        page: u32,
        page_size: u32,
    ) -> AppResult<ResourcePage> {
        validate_page(page, page_size)?;

        let aggregated = self.collect(filters).await;
        let total = aggregated.resources.len() as u64;
        let window = PageWindow::new(page, page_size, total);
        let items = window.slice(aggregated.resources, page_size);

        Ok(ResourcePage {
            items,
            total,
            page,
            page_size,
            has_more: window.has_more,
            failed_providers: aggregated.failed_providers,
        })
    }

    /// Collects every matching resource in listing order.
    pub async fn collect(&self, filters: &ResourceFilters) -> AggregatedResources {
        let resource_type = match filters.parsed_resource_type() {
            Ok(resource_type) => resource_type,
            Err(()) => {
                debug!(
                    resource_type = filters.resource_type.as_deref().unwrap_or_default(),
                    "resource type filter names no known type"
                );
                return AggregatedResources {
                    resources: Vec::new(),
                    failed_providers: Vec::new(),
                };
            }
        };

        let adapters: Vec<Arc<dyn ProviderAdapter>> = match resource_type {
            Some(resource_type) => self.registry.get(resource_type).into_iter().collect(),
            None => self.registry.adapters().to_vec(),
        };

        let results = join_all(adapters.iter().map(|adapter| async move {
            let resource_type = adapter.resource_type();
            let result = match timeout(self.call_timeout, adapter.list(filters)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::timeout("list", resource_type)),
            };
            (resource_type, result)
        }))
        .await;

        let mut resources = Vec::new();
        let mut failed_providers = Vec::new();
        for (resource_type, result) in results {
            match result {
                Ok(mut listed) => resources.append(&mut listed),
                Err(error) => {
                    warn!(
                        resource_type = resource_type.as_str(),
                        error_kind = error.kind.as_str(),
                        error = %error.message,
                        "provider list failed; continuing without its resources"
                    );
                    failed_providers.push(ProviderFailure {
                        resource_type,
                        kind: error.kind,
                    });
                }
            }
        }

        resources.retain(|resource| filters.matches(resource, resource_type));
        resources.sort_by(|left, right| {
            left.sort_key()
                .cmp(right.sort_key())
                .then_with(|| left.resource_id.cmp(&right.resource_id))
                .then_with(|| left.resource_type.cmp(&right.resource_type))
        });

        AggregatedResources {
            resources,
            failed_providers,
        }
    }

    /// Finds one resource by id, dispatching on the id shape.
    ///
    /// Candidate adapters are tried in order and the first hit wins.
    pub async fn get(&self, resource_id: &str) -> AppResult<Resource> {
        let resource_id = resource_id.trim();
        let mut failures = Vec::new();
        let mut attempted = 0_usize;

        for resource_type in candidate_resource_types(resource_id) {
            let Some(adapter) = self.registry.get(resource_type) else {
                continue;
            };

            attempted += 1;
            match self.get_from(adapter.as_ref(), resource_id).await {
                Ok(Some(resource)) => return Ok(resource),
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        resource_type = resource_type.as_str(),
                        resource_id,
                        error_kind = error.kind.as_str(),
                        error = %error.message,
                        "provider get failed during id resolution"
                    );
                    failures.push(error);
                }
            }
        }

        if attempted > 0 && failures.len() == attempted {
            return Err(AppError::ProviderUnavailable(format!(
                "no provider could be reached to resolve resource '{resource_id}'"
            )));
        }

        Err(AppError::NotFound(format!(
            "resource '{resource_id}' does not exist"
        )))
    }

    /// Finds one resource of a known type.
    pub async fn get_typed(
        &self,
        resource_type: ResourceType,
        resource_id: &str,
    ) -> AppResult<Resource> {
        let adapter = self.registry.require(resource_type)?;
        self.get_from(adapter.as_ref(), resource_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "{} resource '{resource_id}' does not exist",
                    resource_type.as_str()
                ))
            })
    }

    async fn get_from(
        &self,
        adapter: &dyn ProviderAdapter,
        resource_id: &str,
    ) -> Result<Option<Resource>, ProviderError> {
        match timeout(self.call_timeout, adapter.get(resource_id)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::timeout("get", adapter.resource_type())),
        }
    }
}

/// Validates 1-based page index and page size bounds.
pub fn validate_page(page: u32, page_size: u32) -> AppResult<()> {
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_owned()));
    }

    if !(1..=MAX_RESOURCE_PAGE_SIZE).contains(&page_size) {
        return Err(AppError::Validation(format!(
            "page_size must be between 1 and {MAX_RESOURCE_PAGE_SIZE}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests;

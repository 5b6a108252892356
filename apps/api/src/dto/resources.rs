use std::collections::BTreeMap;

use cloudgate_application::{ProviderFailure, ResourceFilters, ResourcePage};
use cloudgate_domain::{Resource, ResourceDependency};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

const DEFAULT_PAGE_SIZE: u32 = 50;

/// Query string for resource listing and export.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceListQuery {
    #[serde(alias = "type")]
    pub resource_type: Option<String>,
    pub region: Option<String>,
    pub state: Option<String>,
    pub tag_key: Option<String>,
    pub tag_value: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ResourceListQuery {
    pub fn filters(&self) -> ResourceFilters {
        ResourceFilters {
            resource_type: self.resource_type.clone(),
            region: self.region.clone(),
            state: self.state.clone(),
            tag_key: self.tag_key.clone(),
            tag_value: self.tag_value.clone(),
            search: self.search.clone(),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// API representation of one resource.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/resource-response.ts"
)]
pub struct ResourceResponse {
    pub resource_id: String,
    pub resource_type: String,
    pub name: Option<String>,
    pub region: String,
    pub account_id: String,
    pub state: Option<String>,
    pub tags: BTreeMap<String, String>,
    #[ts(type = "Record<string, unknown>")]
    pub attributes: BTreeMap<String, Value>,
    pub monthly_cost: Option<f64>,
}

impl From<Resource> for ResourceResponse {
    fn from(resource: Resource) -> Self {
        Self {
            resource_id: resource.resource_id,
            resource_type: resource.resource_type.as_str().to_owned(),
            name: resource.name,
            region: resource.region,
            account_id: resource.account_id,
            state: resource.state,
            tags: resource.tags,
            attributes: resource.attributes,
            monthly_cost: resource.monthly_cost,
        }
    }
}

/// Provider that could not be listed.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/provider-failure-response.ts"
)]
pub struct ProviderFailureResponse {
    pub resource_type: String,
    pub kind: String,
}

impl From<ProviderFailure> for ProviderFailureResponse {
    fn from(failure: ProviderFailure) -> Self {
        Self {
            resource_type: failure.resource_type.as_str().to_owned(),
            kind: failure.kind.as_str().to_owned(),
        }
    }
}

/// One page of resources.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/resource-page-response.ts"
)]
pub struct ResourcePageResponse {
    pub items: Vec<ResourceResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub failed_providers: Vec<ProviderFailureResponse>,
}

impl From<ResourcePage> for ResourcePageResponse {
    fn from(page: ResourcePage) -> Self {
        Self {
            items: page.items.into_iter().map(ResourceResponse::from).collect(),
            total: page.total,
            page: page.page,
            page_size: page.page_size,
            has_more: page.has_more,
            failed_providers: page
                .failed_providers
                .into_iter()
                .map(ProviderFailureResponse::from)
                .collect(),
        }
    }
}

/// Advisory dependency of a resource.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/resource-dependency-response.ts"
)]
pub struct ResourceDependencyResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub relationship: String,
    pub message: String,
}

impl From<ResourceDependency> for ResourceDependencyResponse {
    fn from(dependency: ResourceDependency) -> Self {
        Self {
            resource_type: dependency.resource_type.as_str().to_owned(),
            resource_id: dependency.resource_id,
            relationship: dependency.relationship.as_str().to_owned(),
            message: dependency.message,
        }
    }
}

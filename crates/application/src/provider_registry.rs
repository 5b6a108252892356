use std::sync::Arc;

use cloudgate_core::{AppError, AppResult};
use cloudgate_domain::ResourceType;

use crate::provider_ports::ProviderAdapter;

/// Ordered set of provider adapters, at most one per resource type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter, replacing any adapter already serving its type.
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        let resource_type = adapter.resource_type();
        match self
            .adapters
            .iter()
            .position(|existing| existing.resource_type() == resource_type)
        {
            Some(index) => self.adapters[index] = adapter,
            None => self.adapters.push(adapter),
        }

        self
    }

    /// Returns the adapter serving one type.
    #[must_use]
    pub fn get(&self, resource_type: ResourceType) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters
            .iter()
            .find(|adapter| adapter.resource_type() == resource_type)
            .cloned()
    }

    /// Returns the adapter serving one type or a `ProviderUnavailable` error.
    pub fn require(&self, resource_type: ResourceType) -> AppResult<Arc<dyn ProviderAdapter>> {
        self.get(resource_type).ok_or_else(|| {
            AppError::ProviderUnavailable(format!(
                "no provider adapter is registered for resource type '{}'",
                resource_type.as_str()
            ))
        })
    }

    /// Returns every adapter in registration order.
    #[must_use]
    pub fn adapters(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.adapters
    }

    /// Returns registered resource types in registration order.
    #[must_use]
    pub fn resource_types(&self) -> Vec<ResourceType> {
        self.adapters
            .iter()
            .map(|adapter| adapter.resource_type())
            .collect()
    }

    /// Returns whether no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

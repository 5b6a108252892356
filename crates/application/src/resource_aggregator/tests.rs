use std::time::Duration;

use cloudgate_core::AppError;
use cloudgate_domain::ResourceType;

use crate::provider_ports::{ProviderError, ProviderErrorKind};
use crate::provider_registry::ProviderRegistry;
use crate::test_support::{FakeProviderAdapter, resource};

use super::{ResourceAggregator, ResourceFilters};

fn aggregator(registry: ProviderRegistry) -> ResourceAggregator {
    ResourceAggregator::new(registry, Duration::from_secs(5))
}

fn compute_abc() -> FakeProviderAdapter {
    FakeProviderAdapter::new(
        ResourceType::Compute,
        vec![
            resource(ResourceType::Compute, "i-3", Some("c"), &[]),
            resource(ResourceType::Compute, "i-1", Some("a"), &[]),
            resource(ResourceType::Compute, "i-2", Some("b"), &[]),
        ],
    )
}

#[tokio::test]
async fn failing_provider_does_not_fail_aggregation() {
    let registry = ProviderRegistry::new()
        .with_adapter(compute_abc().shared())
        .with_adapter(
            FakeProviderAdapter::new(ResourceType::Database, Vec::new())
                .failing_reads(ProviderError::unavailable("rds endpoint refused connection"))
                .shared(),
        )
        .with_adapter(
            FakeProviderAdapter::new(
                ResourceType::ObjectStore,
                vec![resource(ResourceType::ObjectStore, "logs-bucket", None, &[])],
            )
            .shared(),
        );

    let result = aggregator(registry)
        .list(&ResourceFilters::default(), 1, 50)
        .await;

    assert!(result.is_ok());
    let Ok(page) = result else { return };
    assert_eq!(page.total, 4);
    assert_eq!(page.failed_providers.len(), 1);
    assert_eq!(page.failed_providers[0].resource_type, ResourceType::Database);
    assert_eq!(page.failed_providers[0].kind, ProviderErrorKind::Unavailable);
}

#[tokio::test]
async fn slow_provider_is_treated_as_failed() {
    let registry = ProviderRegistry::new()
        .with_adapter(compute_abc().shared())
        .with_adapter(
            FakeProviderAdapter::new(
                ResourceType::Function,
                vec![resource(ResourceType::Function, "billing", None, &[])],
            )
            .delayed(Duration::from_millis(500))
            .shared(),
        );

    let aggregator = ResourceAggregator::new(registry, Duration::from_millis(50));
    let page = aggregator.list(&ResourceFilters::default(), 1, 50).await;

    assert!(page.is_ok());
    let Ok(page) = page else { return };
    assert_eq!(page.total, 3);
    assert_eq!(page.failed_providers[0].kind, ProviderErrorKind::Timeout);
}

#[tokio::test]
async fn pages_are_sorted_and_contiguous() {
    let aggregator = aggregator(ProviderRegistry::new().with_adapter(compute_abc().shared()));

    let first = aggregator.list(&ResourceFilters::default(), 1, 2).await;
    let second = aggregator.list(&ResourceFilters::default(), 2, 2).await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("listing should succeed");
    };
    let first_names: Vec<_> = first.items.iter().map(|item| item.sort_key()).collect();
    let second_names: Vec<_> = second.items.iter().map(|item| item.sort_key()).collect();
    assert_eq!(first_names, vec!["a", "b"]);
    assert!(first.has_more);
    assert_eq!(second_names, vec!["c"]);
    assert!(!second.has_more);
}

#[tokio::test]
async fn unknown_type_filter_returns_empty_result() {
    let adapter = compute_abc().shared();
    let aggregator = aggregator(ProviderRegistry::new().with_adapter(adapter.clone()));
    let filters = ResourceFilters {
        resource_type: Some("vpc".to_owned()),
        ..ResourceFilters::default()
    };

    let page = aggregator.list(&filters, 1, 10).await;

    assert!(matches!(page, Ok(ref page) if page.total == 0 && !page.has_more));
    assert_eq!(adapter.calls.lock().await.lists, 0);
}

#[tokio::test]
async fn type_filter_queries_only_that_provider() {
    let compute = compute_abc().shared();
    let database = FakeProviderAdapter::new(ResourceType::Database, Vec::new()).shared();
    let aggregator = aggregator(
        ProviderRegistry::new()
            .with_adapter(compute.clone())
            .with_adapter(database.clone()),
    );
    let filters = ResourceFilters {
        resource_type: Some("ec2".to_owned()),
        ..ResourceFilters::default()
    };

    let page = aggregator.list(&filters, 1, 10).await;

    assert!(matches!(page, Ok(ref page) if page.total == 3));
    assert_eq!(compute.calls.lock().await.lists, 1);
    assert_eq!(database.calls.lock().await.lists, 0);
}

#[tokio::test]
async fn tag_and_search_filters_narrow_results() {
    let adapter = FakeProviderAdapter::new(
        ResourceType::Compute,
        vec![
            resource(ResourceType::Compute, "i-1", Some("api-blue"), &[("Team", "payments")]),
            resource(ResourceType::Compute, "i-2", Some("api-green"), &[("Team", "search")]),
            resource(ResourceType::Compute, "i-3", Some("worker"), &[("Team", "payments")]),
        ],
    );
    let aggregator = aggregator(ProviderRegistry::new().with_adapter(adapter.shared()));
    let filters = ResourceFilters {
        tag_key: Some("Team".to_owned()),
        tag_value: Some("payments".to_owned()),
        search: Some("API".to_owned()),
        ..ResourceFilters::default()
    };

    let page = aggregator.list(&filters, 1, 10).await;

    let Ok(page) = page else {
        panic!("listing should succeed");
    };
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].resource_id, "i-1");
}

#[tokio::test]
async fn invalid_page_bounds_are_rejected() {
    let aggregator = aggregator(ProviderRegistry::new());

    let zero_page = aggregator.list(&ResourceFilters::default(), 0, 10).await;
    let oversized = aggregator.list(&ResourceFilters::default(), 1, 1_001).await;

    assert!(matches!(zero_page, Err(AppError::Validation(_))));
    assert!(matches!(oversized, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn get_tries_candidates_in_order() {
    let database = FakeProviderAdapter::new(ResourceType::Database, Vec::new()).shared();
    let object_store = FakeProviderAdapter::new(
        ResourceType::ObjectStore,
        vec![resource(ResourceType::ObjectStore, "logs-bucket", None, &[])],
    )
    .shared();
    let function = FakeProviderAdapter::new(ResourceType::Function, Vec::new()).shared();
    let aggregator = aggregator(
        ProviderRegistry::new()
            .with_adapter(function.clone())
            .with_adapter(object_store.clone())
            .with_adapter(database.clone()),
    );

    let found = aggregator.get("logs-bucket").await;

    assert!(matches!(found, Ok(ref resource) if resource.resource_type == ResourceType::ObjectStore));
    assert_eq!(database.calls.lock().await.gets, vec!["logs-bucket"]);
    assert!(function.calls.lock().await.gets.is_empty());
}

#[tokio::test]
async fn get_reports_not_found_and_unavailable_separately() {
    let compute = FakeProviderAdapter::new(ResourceType::Compute, Vec::new()).shared();
    let volumes = FakeProviderAdapter::new(ResourceType::BlockVolume, Vec::new())
        .failing_reads(ProviderError::unavailable("ebs down"))
        .shared();
    let aggregator = aggregator(
        ProviderRegistry::new()
            .with_adapter(compute)
            .with_adapter(volumes),
    );

    let missing = aggregator.get("i-404").await;
    let unreachable = aggregator.get("vol-1").await;

    assert!(matches!(missing, Err(AppError::NotFound(_))));
    assert!(matches!(unreachable, Err(AppError::ProviderUnavailable(_))));
}

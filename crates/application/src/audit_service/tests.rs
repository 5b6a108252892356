use std::sync::Arc;

use cloudgate_core::{AppError, UserIdentity, UserRole};
use cloudgate_domain::{ActionStatus, ResourceType};
use serde_json::json;
use uuid::Uuid;

use crate::audit_ports::AuditEntryFilter;
use crate::test_support::FakeAuditRepository;

use super::{AuditRecordInput, AuditService, RequestContext};

fn admin() -> UserIdentity {
    UserIdentity::new("alice", Some("alice@example.com".to_owned()), UserRole::Admin)
}

fn operator() -> UserIdentity {
    UserIdentity::new("bob", Some("bob@example.com".to_owned()), UserRole::Operator)
}

fn record_input(resource_ids: &[&str], status: ActionStatus) -> AuditRecordInput {
    AuditRecordInput {
        actor: Some(operator()),
        action: "compute:stop".to_owned(),
        resource_type: ResourceType::Compute.into(),
        resource_ids: resource_ids.iter().map(|id| (*id).to_owned()).collect(),
        account_id: "123456789012".to_owned(),
        region: "us-east-1".to_owned(),
        status,
        request_snapshot: json!({"dry_run": false}),
        response_snapshot: json!({"ok": true}),
        context: RequestContext {
            forwarded_for: Some("203.0.113.7, 10.0.0.1".to_owned()),
            real_ip: Some("198.51.100.1".to_owned()),
            peer_addr: Some("127.0.0.1".to_owned()),
            user_agent: Some("curl/8.5".to_owned()),
        },
    }
}

#[test]
fn client_ip_prefers_forwarded_then_real_ip_then_peer() {
    let mut context = RequestContext {
        forwarded_for: Some(" 203.0.113.7 , 10.0.0.1".to_owned()),
        real_ip: Some("198.51.100.1".to_owned()),
        peer_addr: Some("127.0.0.1".to_owned()),
        user_agent: None,
    };
    assert_eq!(context.client_ip().as_deref(), Some("203.0.113.7"));

    context.forwarded_for = None;
    assert_eq!(context.client_ip().as_deref(), Some("198.51.100.1"));

    context.real_ip = Some("  ".to_owned());
    assert_eq!(context.client_ip().as_deref(), Some("127.0.0.1"));

    assert_eq!(RequestContext::default().client_ip(), None);
}

#[tokio::test]
async fn record_writes_one_entry_per_resource() {
    let repository = Arc::new(FakeAuditRepository::default());
    let service = AuditService::new(repository.clone());

    let written = service
        .record(record_input(&["i-1", "i-2"], ActionStatus::Success))
        .await;

    assert!(written.is_ok());
    let entries = repository.entries.lock().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].resource_id, "i-1");
    assert_eq!(entries[1].resource_id, "i-2");
    assert_eq!(entries[0].client_ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(entries[0].actor.as_deref(), Some("bob"));
    assert_eq!(entries[0].status, ActionStatus::Success);
}

#[tokio::test]
async fn persistence_failure_is_surfaced() {
    let repository = Arc::new(FakeAuditRepository {
        fail_writes: true,
        ..FakeAuditRepository::default()
    });
    let service = AuditService::new(repository);

    let result = service
        .record(record_input(&["i-1"], ActionStatus::Failed))
        .await;

    assert!(matches!(result, Err(AppError::Persistence(_))));
}

#[tokio::test]
async fn reads_require_admin() {
    let service = AuditService::new(Arc::new(FakeAuditRepository::default()));

    let listed = service
        .list_entries(&operator(), &AuditEntryFilter::default(), 1, 10)
        .await;
    let found = service.find_entry(&operator(), Uuid::new_v4()).await;

    assert!(matches!(listed, Err(AppError::Forbidden(_))));
    assert!(matches!(found, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn list_filters_and_paginates() {
    let repository = Arc::new(FakeAuditRepository::default());
    let service = AuditService::new(repository);
    assert!(
        service
            .record(record_input(&["i-1", "i-2", "i-3"], ActionStatus::DryRun))
            .await
            .is_ok()
    );
    assert!(
        service
            .record(record_input(&["i-4"], ActionStatus::Failed))
            .await
            .is_ok()
    );

    let filter = AuditEntryFilter {
        action: Some("STOP".to_owned()),
        status: Some(ActionStatus::DryRun),
        ..AuditEntryFilter::default()
    };
    let first = service.list_entries(&admin(), &filter, 1, 2).await;
    let second = service.list_entries(&admin(), &filter, 2, 2).await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("admin listing should succeed");
    };
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert!(first.has_more);
    assert_eq!(second.items.len(), 1);
    assert!(!second.has_more);
}

#[tokio::test]
async fn page_size_is_bounded() {
    let service = AuditService::new(Arc::new(FakeAuditRepository::default()));

    let result = service
        .list_entries(&admin(), &AuditEntryFilter::default(), 1, 101)
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn recent_reads_select_by_resource_and_actor() {
    let service = AuditService::new(Arc::new(FakeAuditRepository::default()));
    assert!(
        service
            .record(record_input(&["i-1", "i-2"], ActionStatus::Success))
            .await
            .is_ok()
    );

    let by_resource = service.recent_for_resource(&admin(), "i-2", 10).await;
    let missing = service.find_entry(&admin(), Uuid::new_v4()).await;

    assert!(matches!(by_resource, Ok(ref entries) if entries.len() == 1));
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn recent_for_actor_matches_the_exact_subject() {
    let service = AuditService::new(Arc::new(FakeAuditRepository::default()));
    let mut bobby = record_input(&["i-9"], ActionStatus::Success);
    bobby.actor = Some(UserIdentity::new(
        "bobby",
        Some("bobby@example.com".to_owned()),
        UserRole::Operator,
    ));
    assert!(service.record(bobby).await.is_ok());
    assert!(
        service
            .record(record_input(&["i-1"], ActionStatus::Success))
            .await
            .is_ok()
    );

    let Ok(entries) = service.recent_for_actor(&admin(), "bob", 10).await else {
        panic!("admin read should succeed");
    };
    assert_eq!(entries.len(), 1);
    assert!(
        entries
            .iter()
            .all(|entry| entry.actor.as_deref() == Some("bob"))
    );

    let by_prefix = service.recent_for_actor(&admin(), "bo", 10).await;
    assert!(matches!(by_prefix, Ok(ref entries) if entries.is_empty()));

    let substring = AuditEntryFilter {
        actor: Some("BOB".to_owned()),
        ..AuditEntryFilter::default()
    };
    let listed = service.list_entries(&admin(), &substring, 1, 10).await;
    assert!(matches!(listed, Ok(ref page) if page.total == 2));
}

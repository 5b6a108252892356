use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use cloudgate_application::{AdapterScope, ProviderRegistry};
use cloudgate_infrastructure::{
    InMemoryAccountRepository, InMemoryAccountVerifier, InMemoryAuditRepository,
    InMemoryProviderAdapter, InMemoryResourceCache,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::build_router;
use crate::api_config::ApiConfig;
use crate::api_services::{AppStateParts, assemble_app_state};
use crate::middleware::{ROLE_HEADER, SUBJECT_HEADER};

const FIXTURES: &str = r#"[
    {"resource_id": "i-0web", "resource_type": "compute", "name": "web",
     "region": "us-east-1", "account_id": "000000000000", "state": "running",
     "tags": {"Environment": "staging"}},
    {"resource_id": "vol-0data", "resource_type": "block_volume", "region": "us-east-1",
     "account_id": "000000000000", "state": "in-use",
     "attributes": {"attached_to": "i-0web"}},
    {"resource_id": "db-prod", "resource_type": "database", "name": "orders",
     "region": "us-east-1", "account_id": "000000000000", "state": "available",
     "tags": {"Environment": "production"}},
    {"resource_id": "prod/web", "resource_type": "container_service", "name": "web",
     "region": "us-east-1", "account_id": "000000000000", "state": "active",
     "attributes": {"desired_count": 2}}
]"#;

fn app() -> Router {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("AUDIT_STORE", "in_memory"),
        ("ADMIN_OVERRIDE_CODE", "break-glass"),
    ]);
    let Ok(config) = ApiConfig::from_lookup(false, |name| {
        vars.get(name).map(|value| (*value).to_owned())
    }) else {
        panic!("test config should load");
    };
    let Ok(resources) = InMemoryProviderAdapter::parse_fixtures(FIXTURES) else {
        panic!("fixtures should parse");
    };

    let scope = AdapterScope {
        account_id: config.provider_account_id.clone(),
        region: config.provider_region.clone(),
    };
    let registry = InMemoryProviderAdapter::for_all_types(&scope, &resources)
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, adapter| {
            registry.with_adapter(Arc::new(adapter))
        });

    build_router(assemble_app_state(
        AppStateParts {
            registry,
            cache: Arc::new(InMemoryResourceCache::new()),
            audit_repository: Arc::new(InMemoryAuditRepository::new()),
            account_repository: Arc::new(InMemoryAccountRepository::new()),
            account_verifier: Arc::new(InMemoryAccountVerifier),
            postgres_pool: None,
            redis_client: None,
        },
        &config,
    ))
}

fn request(method: Method, uri: &str, role: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder
            .header(SUBJECT_HEADER, "alice")
            .header(ROLE_HEADER, role);
    }

    let body = match body {
        Some(body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let Ok(request) = builder.body(body) else {
        panic!("test request should build");
    };
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let Ok(response) = app.clone().oneshot(request).await else {
        panic!("router should respond");
    };
    let status = response.status();
    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("response body should be readable");
    };

    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_is_ready_without_external_stores() {
    let (status, body) = send(&app(), request(Method::GET, "/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], json!(true));
    assert_eq!(body["postgres"]["status"], json!("disabled"));
}

#[tokio::test]
async fn protected_routes_require_identity() {
    let (status, _) = send(&app(), request(Method::GET, "/api/resources", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resources_are_listed_and_resolved_by_id() {
    let app = app();

    let (status, page) = send(
        &app,
        request(
            Method::GET,
            "/api/resources?page=1&page_size=2",
            Some("readonly"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], json!(4));
    assert_eq!(page["has_more"], json!(true));

    let (status, resource) = send(
        &app,
        request(Method::GET, "/api/resources/vol-0data", Some("readonly"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resource["resource_type"], json!("block_volume"));

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/resources/i-0missing", Some("readonly"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dependents_list_attached_volumes() {
    let (status, dependents) = send(
        &app(),
        request(
            Method::GET,
            "/api/resources/compute/i-0web/dependents",
            Some("readonly"),
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(dependents[0]["resource_id"], json!("vol-0data"));
    assert_eq!(dependents[0]["relationship"], json!("attached_volume"));
}

#[tokio::test]
async fn slash_ids_resolve_without_encoding() {
    let app = app();

    let (status, service) = send(
        &app,
        request(Method::GET, "/api/resources/prod/web", Some("readonly"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(service["resource_type"], json!("container_service"));

    let (status, encoded) = send(
        &app,
        request(Method::GET, "/api/resources/prod%2Fweb", Some("readonly"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(encoded["resource_id"], json!("prod/web"));

    let (status, dependents) = send(
        &app,
        request(
            Method::GET,
            "/api/resources/container_service/prod/web/dependents",
            Some("readonly"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dependents, json!([]));

    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/actions/ecs:scale",
            Some("operator"),
            Some(json!({
                "target_resource_ids": ["prod/web"],
                "dry_run": false,
                "params": {"desired_count": 3}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, recent) = send(
        &app,
        request(
            Method::GET,
            "/api/audit/resources/prod/web",
            Some("admin"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent[0]["resource_id"], json!("prod/web"));
}

#[tokio::test]
async fn accounts_are_admin_only_and_audited() {
    let app = app();
    let body = json!({
        "account_id": "123456789012",
        "account_name": "prod",
        "role_arn": "arn:aws:iam::123456789012:role/Cloudgate",
        "external_id": "shared-secret"
    });

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/accounts", Some("operator"), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = send(
        &app,
        request(Method::POST, "/api/accounts", Some("admin"), Some(body.clone())),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["has_external_id"], json!(true));
    assert!(created.get("external_id").is_none());

    let (status, _) = send(
        &app,
        request(Method::POST, "/api/accounts", Some("admin"), Some(body)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = created["id"].as_str().unwrap_or_default().to_owned();
    let (status, verified) = send(
        &app,
        request(
            Method::POST,
            format!("/api/accounts/{id}/verify").as_str(),
            Some("admin"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verified["status"], json!("verified"));

    let (status, _) = send(
        &app,
        request(
            Method::DELETE,
            format!("/api/accounts/{id}").as_str(),
            Some("admin"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, audit) = send(
        &app,
        request(
            Method::GET,
            "/api/audit?resource_type=provider_account",
            Some("admin"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["total"], json!(3));
    let mut actions: Vec<&str> = audit["items"]
        .as_array()
        .map(|items| items.iter().filter_map(|item| item["action"].as_str()).collect())
        .unwrap_or_default();
    actions.sort_unstable();
    assert_eq!(
        actions,
        vec!["account:create", "account:delete", "account:verify"]
    );
}

#[tokio::test]
async fn actions_default_to_dry_run() {
    let (status, outcome) = send(
        &app(),
        request(
            Method::POST,
            "/api/actions/compute:stop",
            Some("operator"),
            Some(json!({"target_resource_ids": ["i-0web"]})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], json!("dry_run"));
    assert_eq!(outcome["dry_run"], json!(true));
    assert_eq!(outcome["targets"]["i-0web"]["status"], json!("dry_run"));
}

#[tokio::test]
async fn readonly_callers_cannot_mutate() {
    let (status, _) = send(
        &app(),
        request(
            Method::POST,
            "/api/actions/compute:start",
            Some("readonly"),
            Some(json!({"target_resource_ids": ["i-0web"]})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn protected_delete_needs_override_and_is_audited() {
    let app = app();

    let (status, denied) = send(
        &app,
        request(
            Method::POST,
            "/api/actions/database:delete",
            Some("admin"),
            Some(json!({"target_resource_ids": ["db-prod"], "dry_run": false})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(
        denied["message"]
            .as_str()
            .is_some_and(|message| !message.contains("break-glass"))
    );

    let (status, outcome) = send(
        &app,
        request(
            Method::POST,
            "/api/actions/database:delete",
            Some("admin"),
            Some(json!({
                "target_resource_ids": ["db-prod"],
                "dry_run": false,
                "override_code": "break-glass",
                "params": {"skip_final_snapshot": true}
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], json!("success"));

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/resources/db-prod", Some("readonly"), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        request(Method::GET, "/api/audit", Some("operator"), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, audit) = send(
        &app,
        request(
            Method::GET,
            "/api/audit?resource_id=db-prod",
            Some("admin"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["total"], json!(1));
    assert_eq!(audit["items"][0]["status"], json!("success"));
    assert_eq!(
        audit["items"][0]["request_snapshot"]["override_used"],
        json!(true)
    );
}

#[tokio::test]
async fn csv_export_uses_text_csv() {
    let Ok(response) = app()
        .oneshot(request(
            Method::GET,
            "/api/resources/export/csv?type=ec2",
            Some("readonly"),
            None,
        ))
        .await
    else {
        panic!("router should respond");
    };

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/csv; charset=utf-8")
    );

    let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
        panic!("response body should be readable");
    };
    let body = String::from_utf8_lossy(&bytes);
    assert!(body.starts_with("Resource ID,Type,Name,Region,State,Tags,Monthly Cost\r\n"));
    assert!(body.contains("i-0web"));
    assert!(!body.contains("db-prod"));
}

use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    // Resource ids may contain '/', so resource and audit lookups capture the rest of the path.
    let protected_routes = Router::new()
        .route(
            "/api/resources",
            get(handlers::resources::list_resources_handler),
        )
        .route(
            "/api/resources/export/csv",
            get(handlers::resources::export_resources_csv_handler),
        )
        .route(
            "/api/resources/export/json",
            get(handlers::resources::export_resources_json_handler),
        )
        .route(
            "/api/resources/{*resource_ref}",
            get(handlers::resources::resource_lookup_handler),
        )
        .route(
            "/api/accounts",
            get(handlers::accounts::list_accounts_handler)
                .post(handlers::accounts::create_account_handler),
        )
        .route(
            "/api/accounts/{account_id}",
            get(handlers::accounts::get_account_handler)
                .put(handlers::accounts::update_account_handler)
                .delete(handlers::accounts::delete_account_handler),
        )
        .route(
            "/api/accounts/{account_id}/verify",
            post(handlers::accounts::verify_account_handler),
        )
        .route(
            "/api/actions/{action_name}",
            post(handlers::actions::perform_action_handler),
        )
        .route("/api/audit", get(handlers::audit::list_audit_handler))
        .route(
            "/api/audit/export",
            get(handlers::audit::export_audit_handler),
        )
        .route(
            "/api/audit/resources/{*resource_id}",
            get(handlers::audit::recent_resource_audit_handler),
        )
        .route(
            "/api/audit/actors/{actor}",
            get(handlers::audit::recent_actor_audit_handler),
        )
        .route(
            "/api/audit/{entry_id}",
            get(handlers::audit::get_audit_entry_handler),
        )
        .route_layer(from_fn(middleware::require_identity));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests;

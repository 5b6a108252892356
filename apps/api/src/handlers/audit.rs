use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use cloudgate_core::{AppError, UserIdentity};
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{AuditEntryPageResponse, AuditEntryResponse, AuditQuery};
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_RECENT_LIMIT: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct RecentAuditQuery {
    pub limit: Option<u32>,
}

pub async fn list_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<AuditEntryPageResponse>> {
    let page = state
        .audit_service
        .list_entries(&user, &query.filter()?, query.page(), query.page_size())
        .await?;

    Ok(Json(AuditEntryPageResponse::from(page)))
}

pub async fn export_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .audit_service
        .export_entries(&user, &query.filter()?)
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

pub async fn get_audit_entry_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(entry_id): Path<String>,
) -> ApiResult<Json<AuditEntryResponse>> {
    let entry_id = Uuid::parse_str(entry_id.as_str())
        .map_err(|error| AppError::Validation(format!("invalid audit entry id: {error}")))?;
    let entry = state.audit_service.find_entry(&user, entry_id).await?;

    Ok(Json(AuditEntryResponse::from(entry)))
}

pub async fn recent_resource_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(resource_id): Path<String>,
    Query(query): Query<RecentAuditQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .audit_service
        .recent_for_resource(
            &user,
            resource_id.as_str(),
            query.limit.unwrap_or(DEFAULT_RECENT_LIMIT),
        )
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

pub async fn recent_actor_audit_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(actor): Path<String>,
    Query(query): Query<RecentAuditQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    let entries = state
        .audit_service
        .recent_for_actor(
            &user,
            actor.as_str(),
            query.limit.unwrap_or(DEFAULT_RECENT_LIMIT),
        )
        .await?
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use cloudgate_core::{AppError, UserIdentity};
use uuid::Uuid;

use crate::dto::{AccountVerificationResponse, ProviderAccountResponse, SaveProviderAccountRequest};
use crate::error::ApiResult;
use crate::middleware::ClientContext;
use crate::state::AppState;

fn parse_account_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|error| AppError::Validation(format!("invalid provider account id: {error}")))
}

pub async fn list_accounts_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<ProviderAccountResponse>>> {
    let accounts = state
        .account_service
        .list_accounts(&user)
        .await?
        .into_iter()
        .map(ProviderAccountResponse::from)
        .collect();

    Ok(Json(accounts))
}

pub async fn create_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    ClientContext(context): ClientContext,
    Json(payload): Json<SaveProviderAccountRequest>,
) -> ApiResult<(StatusCode, Json<ProviderAccountResponse>)> {
    let account = state
        .account_service
        .create_account(&user, payload.into_draft()?, &context)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProviderAccountResponse::from(account)),
    ))
}

pub async fn get_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(account_id): Path<String>,
) -> ApiResult<Json<ProviderAccountResponse>> {
    let account = state
        .account_service
        .get_account(&user, parse_account_id(account_id.as_str())?)
        .await?;

    Ok(Json(ProviderAccountResponse::from(account)))
}

pub async fn update_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(account_id): Path<String>,
    ClientContext(context): ClientContext,
    Json(payload): Json<SaveProviderAccountRequest>,
) -> ApiResult<Json<ProviderAccountResponse>> {
    let account = state
        .account_service
        .update_account(
            &user,
            parse_account_id(account_id.as_str())?,
            payload.into_draft()?,
            &context,
        )
        .await?;

    Ok(Json(ProviderAccountResponse::from(account)))
}

pub async fn delete_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(account_id): Path<String>,
    ClientContext(context): ClientContext,
) -> ApiResult<StatusCode> {
    state
        .account_service
        .delete_account(&user, parse_account_id(account_id.as_str())?, &context)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn verify_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(account_id): Path<String>,
    ClientContext(context): ClientContext,
) -> ApiResult<Json<AccountVerificationResponse>> {
    let verification = state
        .account_service
        .verify_account(&user, parse_account_id(account_id.as_str())?, &context)
        .await?;

    Ok(Json(AccountVerificationResponse::from(verification)))
}

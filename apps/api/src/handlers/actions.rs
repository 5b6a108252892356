use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use cloudgate_application::ActionRequest;
use cloudgate_core::{AppError, UserIdentity};
use cloudgate_domain::ActionStatus;

use crate::dto::{ActionOutcomeResponse, PerformActionRequest};
use crate::error::ApiResult;
use crate::middleware::ClientContext;
use crate::state::AppState;

pub async fn perform_action_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Path(action_name): Path<String>,
    ClientContext(context): ClientContext,
    Json(payload): Json<PerformActionRequest>,
) -> ApiResult<(StatusCode, Json<ActionOutcomeResponse>)> {
    let pipeline = state.action_pipeline.clone();
    let request = ActionRequest::from(payload);

    // Runs detached: a client disconnect must not drop the audit write.
    let outcome = tokio::spawn(async move {
        pipeline
            .perform_action(&user, action_name.as_str(), request, &context)
            .await
    })
    .await
    .map_err(|error| AppError::Internal(format!("action task failed: {error}")))??;

    let status = if outcome.status == ActionStatus::Failed {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ActionOutcomeResponse::from(outcome))))
}

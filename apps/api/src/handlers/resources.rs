use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use cloudgate_application::render_resources_csv;
use cloudgate_core::UserIdentity;
use cloudgate_domain::ResourceType;

use crate::dto::{
    ResourceDependencyResponse, ResourceListQuery, ResourcePageResponse, ResourceResponse,
};
use crate::error::ApiResult;
use crate::state::AppState;

const DEPENDENTS_SUFFIX: &str = "/dependents";

pub async fn list_resources_handler(
    State(state): State<AppState>,
    Extension(_user): Extension<UserIdentity>,
    Query(query): Query<ResourceListQuery>,
) -> ApiResult<Json<ResourcePageResponse>> {
    let page = state
        .resource_query_service
        .list_resources(&query.filters(), query.page(), query.page_size())
        .await?;

    Ok(Json(ResourcePageResponse::from(page)))
}

/// Serves `GET /api/resources/<id>` and `GET /api/resources/<type>/<id>/dependents`.
///
/// Ids are taken from the rest of the path, so `cluster/service` ids need no encoding.
pub async fn resource_lookup_handler(
    State(state): State<AppState>,
    Extension(_user): Extension<UserIdentity>,
    Path(resource_ref): Path<String>,
) -> ApiResult<Response> {
    if let Some((resource_type, resource_id)) = dependents_ref(resource_ref.as_str()) {
        let dependents: Vec<ResourceDependencyResponse> = state
            .protection_service
            .dependents(resource_type, resource_id)
            .await?
            .into_iter()
            .map(ResourceDependencyResponse::from)
            .collect();

        return Ok(Json(dependents).into_response());
    }

    let resource = state
        .resource_query_service
        .get_resource(resource_ref.as_str())
        .await?;

    Ok(Json(ResourceResponse::from(resource)).into_response())
}

/// Splits `<type>/<id>/dependents` when the first segment names a resource type.
fn dependents_ref(resource_ref: &str) -> Option<(ResourceType, &str)> {
    let (resource_type, resource_id) = resource_ref
        .strip_suffix(DEPENDENTS_SUFFIX)?
        .split_once('/')?;
    if resource_id.is_empty() {
        return None;
    }

    ResourceType::from_str(resource_type)
        .ok()
        .map(|resource_type| (resource_type, resource_id))
}

pub async fn export_resources_json_handler(
    State(state): State<AppState>,
    Extension(_user): Extension<UserIdentity>,
    Query(query): Query<ResourceListQuery>,
) -> Json<Vec<ResourceResponse>> {
    let resources = state
        .resource_query_service
        .export_resources(&query.filters())
        .await
        .into_iter()
        .map(ResourceResponse::from)
        .collect();

    Json(resources)
}

pub async fn export_resources_csv_handler(
    State(state): State<AppState>,
    Extension(_user): Extension<UserIdentity>,
    Query(query): Query<ResourceListQuery>,
) -> impl IntoResponse {
    let resources = state
        .resource_query_service
        .export_resources(&query.filters())
        .await;

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"resources.csv\"",
            ),
        ],
        render_resources_csv(&resources),
    )
}

#[cfg(test)]
mod tests {
    use cloudgate_domain::ResourceType;

    use super::dependents_ref;

    #[test]
    fn dependents_refs_need_a_known_type_and_an_id() {
        assert_eq!(
            dependents_ref("compute/i-0web/dependents"),
            Some((ResourceType::Compute, "i-0web"))
        );
        assert_eq!(
            dependents_ref("ecs/prod/web/dependents"),
            Some((ResourceType::ContainerService, "prod/web"))
        );
        assert_eq!(dependents_ref("compute/dependents"), None);
        assert_eq!(dependents_ref("prod/dependents"), None);
        assert_eq!(dependents_ref("prod/web"), None);
    }
}

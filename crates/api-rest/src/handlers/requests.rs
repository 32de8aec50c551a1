use super::blocking;
use crate::error::{ApiResult, ErrorBody};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use alinea_core::formatter::AccessRequestPayload;
use alinea_core::{
    AccessRequestId, DataType, EntityId, RequestDocuments, RequestFilter, UserId,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccessRequestReq {
    pub entity_id: i64,
    /// Defaults to the configured dashboard user when omitted.
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub purpose: String,
    /// Data type tags, e.g. `personal_info`.
    pub data_types: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePurposeReq {
    pub purpose: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AccessRequestQuery {
    pub entity_id: Option<i64>,
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RequestDocumentsRes {
    pub data: RequestDocuments,
}

#[utoipa::path(
    post,
    path = "/access-requests",
    request_body = CreateAccessRequestReq,
    responses(
        (status = 201, description = "Request and its pending items created", body = AccessRequestPayload),
        (status = 400, description = "No or unknown data types", body = ErrorBody),
        (status = 404, description = "Entity or user not found", body = ErrorBody)
    )
)]
/// Create an access request
///
/// Creates one pending item per data type and notifies the user's dashboard.
///
/// # Errors
/// Returns `400 Bad Request` if `data_types` is empty or holds an unknown tag, and
/// `404 Not Found` if the entity or user does not exist.
#[axum::debug_handler]
pub async fn create_access_request(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAccessRequestReq>,
) -> ApiResult<(StatusCode, Json<AccessRequestPayload>)> {
    let data_types = DataType::parse_all(&req.data_types)?;
    let entity_id = EntityId(req.entity_id);
    let user_id = req
        .user_id
        .map(UserId)
        .unwrap_or_else(|| state.core.cfg.default_user_id());

    let created = blocking(&state, move |core| {
        core.access
            .create_access_request(entity_id, user_id, &req.purpose, &data_types)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/access-requests",
    params(AccessRequestQuery),
    responses(
        (status = 200, description = "Matching requests, oldest first", body = [AccessRequestPayload])
    )
)]
#[axum::debug_handler]
pub async fn list_access_requests(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AccessRequestQuery>,
) -> ApiResult<Json<Vec<AccessRequestPayload>>> {
    let filter = RequestFilter {
        entity_id: query.entity_id.map(EntityId),
        user_id: query.user_id.map(UserId),
    };
    blocking(&state, move |core| core.access.list_access_requests(filter))
        .await
        .map(Json)
}

#[utoipa::path(
    get,
    path = "/access-requests/{id}",
    params(("id" = i64, Path, description = "Access request id")),
    responses(
        (status = 200, description = "The request with its items", body = AccessRequestPayload),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_access_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<AccessRequestPayload>> {
    blocking(&state, move |core| {
        core.access.get_access_request(AccessRequestId(id))
    })
    .await
    .map(Json)
}

#[utoipa::path(
    patch,
    path = "/access-requests/{id}",
    params(("id" = i64, Path, description = "Access request id")),
    request_body = UpdatePurposeReq,
    responses(
        (status = 200, description = "Purpose updated", body = AccessRequestPayload),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn update_access_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePurposeReq>,
) -> ApiResult<Json<AccessRequestPayload>> {
    blocking(&state, move |core| {
        core.access.update_purpose(AccessRequestId(id), &req.purpose)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    delete,
    path = "/access-requests/{id}",
    params(("id" = i64, Path, description = "Access request id")),
    responses(
        (status = 204, description = "Request and its items deleted"),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn delete_access_request(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |core| {
        core.access.delete_access_request(AccessRequestId(id))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/access-requests/{id}/documents",
    params(("id" = i64, Path, description = "Access request id")),
    responses(
        (status = 200, description = "Data types grouped by decision; content for approved ones", body = RequestDocumentsRes),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn request_documents(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<RequestDocumentsRes>> {
    let data = blocking(&state, move |core| {
        core.documents.documents_for_request(AccessRequestId(id))
    })
    .await?;
    Ok(Json(RequestDocumentsRes { data }))
}

use super::blocking;
use crate::error::{ApiResult, ErrorBody};
use crate::extract::{ApiJson, ApiPath};
use crate::AppState;
use alinea_core::{DataType, UserId};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde_json::{Map, Value};

#[utoipa::path(
    get,
    path = "/users/{user_id}/documents",
    params(("user_id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Every document of the user keyed by data type", body = serde_json::Value),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn list_documents(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<Map<String, Value>>> {
    blocking(&state, move |core| core.documents.get_all(UserId(user_id)))
        .await
        .map(Json)
}

#[utoipa::path(
    get,
    path = "/users/{user_id}/documents/{data_type}",
    params(
        ("user_id" = i64, Path, description = "User id"),
        ("data_type" = String, Path, description = "Data type tag")
    ),
    responses(
        (status = 200, description = "The document", body = serde_json::Value),
        (status = 400, description = "Unknown data type", body = ErrorBody),
        (status = 404, description = "No such document", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_document(
    State(state): State<AppState>,
    ApiPath((user_id, data_type)): ApiPath<(i64, String)>,
) -> ApiResult<Json<Value>> {
    let data_type: DataType = data_type.parse()?;
    blocking(&state, move |core| {
        core.documents.get(UserId(user_id), data_type)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    put,
    path = "/users/{user_id}/documents/{data_type}",
    params(
        ("user_id" = i64, Path, description = "User id"),
        ("data_type" = String, Path, description = "Data type tag")
    ),
    request_body = serde_json::Value,
    responses(
        (status = 200, description = "Document stored", body = serde_json::Value),
        (status = 400, description = "Unknown data type or body is not an object", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
/// Store a user's document for one data type, replacing any previous one
#[axum::debug_handler]
pub async fn put_document(
    State(state): State<AppState>,
    ApiPath((user_id, data_type)): ApiPath<(i64, String)>,
    ApiJson(document): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let data_type: DataType = data_type.parse()?;
    blocking(&state, move |core| {
        core.documents.put(UserId(user_id), data_type, document)
    })
    .await
    .map(Json)
}

#[utoipa::path(
    delete,
    path = "/users/{user_id}/documents/{data_type}",
    params(
        ("user_id" = i64, Path, description = "User id"),
        ("data_type" = String, Path, description = "Data type tag")
    ),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "No such document", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn delete_document(
    State(state): State<AppState>,
    ApiPath((user_id, data_type)): ApiPath<(i64, String)>,
) -> ApiResult<StatusCode> {
    let data_type: DataType = data_type.parse()?;
    blocking(&state, move |core| {
        core.documents.delete(UserId(user_id), data_type)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

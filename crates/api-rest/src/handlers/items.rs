use super::blocking;
use crate::error::{ApiResult, ErrorBody};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::AppState;
use alinea_core::formatter::ItemPayload;
use alinea_core::{AccessRequestId, AccessRequestItem, ItemId, ItemUpdate};
use axum::{
    extract::State,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetItemStatusReq {
    pub item_id: i64,
    /// `approved` or `rejected`.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SetItemStatusRes {
    pub status: String,
    pub item: ItemPayload,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemsRes {
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ItemsQuery {
    pub access_request_id: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemReq {
    /// `null` clears the reason.
    pub rejection_reason: Option<String>,
}

#[utoipa::path(
    post,
    path = "/set_access_request_item_status",
    request_body = SetItemStatusReq,
    responses(
        (status = 200, description = "Status stored; entity dashboards notified on change", body = SetItemStatusRes),
        (status = 400, description = "Status is not approved or rejected", body = ErrorBody),
        (status = 404, description = "Item not found", body = ErrorBody)
    )
)]
/// Approve or reject one access request item
///
/// Re-submitting the current status refreshes `status_set_at` but sends no notification.
///
/// # Errors
/// Returns `400 Bad Request` for any status other than `approved` or `rejected`, and
/// `404 Not Found` if the item does not exist.
#[axum::debug_handler]
pub async fn set_item_status(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetItemStatusReq>,
) -> ApiResult<Json<SetItemStatusRes>> {
    let item = blocking(&state, move |core| {
        core.access.set_item_status(ItemId(req.item_id), &req.status)
    })
    .await?;

    Ok(Json(SetItemStatusRes {
        status: "success".into(),
        item,
    }))
}

#[utoipa::path(
    get,
    path = "/access_request_items",
    params(ItemsQuery),
    responses(
        (status = 200, description = "Items of the request", body = ItemsRes),
        (status = 400, description = "Missing access_request_id"),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn list_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ItemsQuery>,
) -> ApiResult<Json<ItemsRes>> {
    let request_id = AccessRequestId(query.access_request_id);
    let items = blocking(&state, move |core| core.access.list_items(request_id)).await?;
    Ok(Json(ItemsRes { items }))
}

#[utoipa::path(
    patch,
    path = "/access-request-items/{id}",
    params(("id" = i64, Path, description = "Item id")),
    request_body = UpdateItemReq,
    responses(
        (status = 200, description = "Item updated", body = AccessRequestItem),
        (status = 404, description = "Item not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn update_item(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateItemReq>,
) -> ApiResult<Json<AccessRequestItem>> {
    let update = ItemUpdate {
        status: None,
        rejection_reason: Some(req.rejection_reason),
    };
    blocking(&state, move |core| core.access.update_item(ItemId(id), update))
        .await
        .map(Json)
}

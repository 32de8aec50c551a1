//! # API REST
//!
//! REST and WebSocket surface for Alinea.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation
//! - Live dashboard sockets for entities and users
//! - REST-specific concerns (JSON serialization, CORS)
//!
//! All state lives in [`alinea_core::CoreServices`]; this crate only adapts it to HTTP.

#![warn(rust_2018_idioms)]

pub mod dashboard;
pub mod error;
pub mod extract;
pub mod handlers;

use alinea_core::formatter::{AccessRequestPayload, ItemPayload};
use alinea_core::CoreServices;
use api_shared::{pb, HealthService};
use axum::{
    extract::State,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use handlers::{directory, documents, items, requests};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub core: CoreServices,
}

impl AppState {
    pub fn new(core: CoreServices) -> Self {
        Self { core }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        directory::list_entities,
        directory::create_entity,
        directory::get_entity,
        directory::list_users,
        directory::create_user,
        directory::get_user,
        requests::create_access_request,
        requests::list_access_requests,
        requests::get_access_request,
        requests::update_access_request,
        requests::delete_access_request,
        requests::request_documents,
        items::set_item_status,
        items::list_items,
        items::update_item,
        documents::list_documents,
        documents::get_document,
        documents::put_document,
        documents::delete_document,
    ),
    components(schemas(
        pb::HealthRes,
        error::ErrorBody,
        alinea_core::Entity,
        alinea_core::EntityType,
        alinea_core::EntityId,
        alinea_core::User,
        alinea_core::UserId,
        alinea_core::AccessRequestId,
        alinea_core::AccessRequestItem,
        alinea_core::ItemId,
        alinea_core::DataType,
        alinea_core::ItemStatus,
        alinea_core::RequestDocuments,
        AccessRequestPayload,
        ItemPayload,
        directory::CreateEntityReq,
        directory::CreateUserReq,
        requests::CreateAccessRequestReq,
        requests::UpdatePurposeReq,
        items::SetItemStatusReq,
        items::SetItemStatusRes,
        items::UpdateItemReq,
        items::ItemsRes,
        requests::RequestDocumentsRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router.
///
/// # Arguments
/// * `state` - Services shared by every route, including the dashboard sockets.
///
/// # Returns
/// A router with permissive CORS, ready for `axum::serve`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/entities",
            get(directory::list_entities).post(directory::create_entity),
        )
        .route("/entities/:id", get(directory::get_entity))
        .route(
            "/users",
            get(directory::list_users).post(directory::create_user),
        )
        .route("/users/:id", get(directory::get_user))
        .route(
            "/access-requests",
            get(requests::list_access_requests).post(requests::create_access_request),
        )
        .route(
            "/access-requests/:id",
            get(requests::get_access_request)
                .patch(requests::update_access_request)
                .delete(requests::delete_access_request),
        )
        .route(
            "/access-requests/:id/documents",
            get(requests::request_documents),
        )
        .route(
            "/set_access_request_item_status",
            post(items::set_item_status),
        )
        .route("/access_request_items", get(items::list_items))
        .route("/access-request-items/:id", patch(items::update_item))
        .route("/users/:id/documents", get(documents::list_documents))
        .route(
            "/users/:id/documents/:data_type",
            get(documents::get_document)
                .put(documents::put_document)
                .delete(documents::delete_document),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/ws/entities/:id", get(dashboard::entity_dashboard))
        .route("/ws/users/:id", get(dashboard::user_dashboard))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = pb::HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<pb::HealthRes> {
    Json(HealthService::check_health())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

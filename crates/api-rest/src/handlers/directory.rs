use super::blocking;
use crate::error::{ApiResult, ErrorBody};
use crate::extract::{ApiJson, ApiPath};
use crate::AppState;
use alinea_core::{
    AccessError, EmailAddress, Entity, EntityId, EntityType, NewEntity, NewUser, NonEmptyText,
    User, UserId,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEntityReq {
    pub name: String,
    /// One of clinic, dentist, hospital, psychologist, therapist, pharmacy.
    pub entity_type: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserReq {
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: String,
}

fn optional_email(email: Option<String>) -> Result<Option<EmailAddress>, AccessError> {
    email
        .filter(|e| !e.trim().is_empty())
        .map(EmailAddress::parse)
        .transpose()
        .map_err(AccessError::from)
}

impl TryFrom<CreateEntityReq> for NewEntity {
    type Error = AccessError;

    fn try_from(req: CreateEntityReq) -> Result<Self, Self::Error> {
        Ok(NewEntity {
            name: NonEmptyText::new(&req.name)?,
            entity_type: req.entity_type.parse()?,
            address: req.address,
            phone: req.phone,
            email: optional_email(req.email)?,
        })
    }
}

impl TryFrom<CreateUserReq> for NewUser {
    type Error = AccessError;

    fn try_from(req: CreateUserReq) -> Result<Self, Self::Error> {
        Ok(NewUser {
            username: NonEmptyText::new(&req.username)?,
            first_name: req.first_name,
            last_name: req.last_name,
            email: optional_email(req.email)?,
            phone_number: req.phone_number,
        })
    }
}

#[utoipa::path(
    get,
    path = "/entities",
    responses(
        (status = 200, description = "All entities", body = [Entity]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn list_entities(State(state): State<AppState>) -> ApiResult<Json<Vec<Entity>>> {
    blocking(&state, |core| core.directory.list_entities())
        .await
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/entities",
    request_body = CreateEntityReq,
    responses(
        (status = 201, description = "Entity created", body = Entity),
        (status = 400, description = "Invalid name, type or email", body = ErrorBody)
    )
)]
/// Create an entity
///
/// # Errors
/// Returns `400 Bad Request` if the name is empty, the entity type is unknown or the email is
/// malformed.
#[axum::debug_handler]
pub async fn create_entity(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateEntityReq>,
) -> ApiResult<(StatusCode, Json<Entity>)> {
    let new = NewEntity::try_from(req)?;
    let entity = blocking(&state, move |core| core.directory.create_entity(new)).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

#[utoipa::path(
    get,
    path = "/entities/{id}",
    params(("id" = i64, Path, description = "Entity id")),
    responses(
        (status = 200, description = "The entity", body = Entity),
        (status = 404, description = "Entity not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_entity(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Entity>> {
    blocking(&state, move |core| core.directory.get_entity(EntityId(id)))
        .await
        .map(Json)
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    blocking(&state, |core| core.directory.list_users())
        .await
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserReq,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Empty or duplicate username, or malformed email", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateUserReq>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let new = NewUser::try_from(req)?;
    let user = blocking(&state, move |core| core.directory.create_user(new)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 404, description = "User not found", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<User>> {
    blocking(&state, move |core| core.directory.get_user(UserId(id)))
        .await
        .map(Json)
}

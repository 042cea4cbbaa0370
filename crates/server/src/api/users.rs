//! User registry management endpoints (/users).

use crate::AppResources;
use crate::auth::CurrentUser;
use crate::entity::user;
use crate::error::{AppError, ErrorBody};
use axum::{
    Extension, Json,
    extract::{
        Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;

/// Tag for OpenAPI documentation.
pub const USERS_TAG: &str = "Users";

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    /// Email address the user signs in with at the broker
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: Option<String>,
    pub email: String,
    pub picture: Option<String>,
    #[serde(with = "time::serde::rfc3339::option", default)]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: OffsetDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            picture: model.picture,
            last_login_at: model.last_login_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::invalid_request(e.body_text()))
}

fn user_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, AppError> {
    match path {
        Ok(Path(id)) if id >= 1 => Ok(id),
        Ok(Path(id)) => Err(AppError::invalid_request(format!(
            "user id must be a positive integer, got {id}"
        ))),
        Err(e) => Err(AppError::invalid_request(e.body_text())),
    }
}

#[tracing::instrument(skip_all, fields(caller = caller.user_id))]
#[utoipa::path(
    get,
    path = "/users",
    tag = USERS_TAG,
    operation_id = "List Users",
    summary = "List registered users",
    description = "Returns every user that has not been deleted, ordered by id.",
    security(("Authorization" = [])),
    responses(
        (status = 200, description = "Registered users", body = [UserResponse]),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 403, description = "Caller is no longer registered", body = ErrorBody)
    )
)]
pub async fn list_users(
    Extension(resources): Extension<AppResources>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = resources.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[tracing::instrument(skip_all, fields(caller = caller.user_id))]
#[utoipa::path(
    post,
    path = "/users",
    tag = USERS_TAG,
    operation_id = "Create User",
    summary = "Provision a user",
    description = "Registers an email address so its owner can log in through the broker.",
    security(("Authorization" = [])),
    request_body(content = EmailRequest, description = "Email to register"),
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Malformed body or email", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn create_user(
    Extension(resources): Extension<AppResources>,
    CurrentUser(caller): CurrentUser,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let request = json_body(payload)?;
    let created = resources.users.create(&request.email).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[tracing::instrument(skip_all, fields(caller = caller.user_id))]
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = USERS_TAG,
    operation_id = "Update User Email",
    summary = "Change a user's email",
    security(("Authorization" = [])),
    params(("id" = i32, Path, description = "User id")),
    request_body(content = EmailRequest, description = "New email"),
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Malformed id, body or email", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody),
        (status = 409, description = "Email used by another user", body = ErrorBody)
    )
)]
pub async fn update_user(
    Extension(resources): Extension<AppResources>,
    CurrentUser(caller): CurrentUser,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let id = user_id(path)?;
    let request = json_body(payload)?;
    let updated = resources.users.update_email(id, &request.email).await?;
    Ok(Json(updated.into()))
}

#[tracing::instrument(skip_all, fields(caller = caller.user_id))]
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = USERS_TAG,
    operation_id = "Delete User",
    summary = "Remove a user",
    description = "Soft-deletes the user. Their outstanding tokens stop working on the next request.",
    security(("Authorization" = [])),
    params(("id" = i32, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Malformed id", body = ErrorBody),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn delete_user(
    Extension(resources): Extension<AppResources>,
    CurrentUser(caller): CurrentUser,
    path: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let id = user_id(path)?;
    resources.users.soft_delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

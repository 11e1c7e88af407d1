//! User administration (administrators only)

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{CreateUserRequest, UserResponse, UserRole};
use crate::error::ApiError;

/// GET /users
pub async fn list_users(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    let users = state.accounts.list().await?;
    Ok(Json(Paginated::from_items(users, &pagination, UserResponse::from)))
}

/// POST /users
///
/// Provisions an account for a subject before their first sign-in.
pub async fn create_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    let user = state.accounts.provision(req, &auth.stamp()).await?;
    Ok(Created::at(
        format!("/users/{}", user.id()),
        UserResponse::from(user),
    ))
}

/// GET /users/username/:username
pub async fn get_user_by_username(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    let user = state.accounts.get_by_username(username).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

/// DELETE /users/:id
pub async fn delete_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    if id == auth.user_id {
        return Err(ApiError::bad_request("Administrators cannot delete themselves"));
    }
    state.accounts.delete(id, &auth.stamp()).await?;
    Ok(NoContent)
}

/// GET /users/:id
pub async fn get_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    let user = state.accounts.get(id).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

/// POST /users/:id/activate
pub async fn activate_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    let user = state.accounts.activate(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

/// POST /users/:id/deactivate
pub async fn deactivate_user(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[UserRole::Admin])?;
    if id == auth.user_id {
        return Err(ApiError::bad_request("Administrators cannot deactivate themselves"));
    }
    let user = state.accounts.deactivate(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

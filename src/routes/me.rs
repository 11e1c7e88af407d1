use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{UpdateUserRequest, UserResponse, UserRole};
use crate::error::ApiError;
use crate::services::ServiceError;

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
    pub issuer: String,
    /// `None` until the caller has registered
    pub profile: Option<UserResponse>,
}

/// GET /me
pub async fn get_me(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = match state.accounts.get(auth.user_id).await {
        Ok(user) => Some(UserResponse::from(user)),
        Err(ServiceError::NotFound { .. }) => None,
        Err(e) => return Err(e.into()),
    };

    Ok(Json(MeResponse {
        user_id: auth.user_id,
        email: auth.email.clone(),
        role: auth.role,
        issuer: auth.issuer.clone(),
        profile,
    }))
}

/// PUT /me
pub async fn update_me(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .accounts
        .update_profile(auth.user_id, req, &auth.stamp())
        .await?;
    Ok(Json(DataResponse::new(UserResponse::from(user))))
}

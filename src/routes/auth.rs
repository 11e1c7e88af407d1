//! Account routes
//!
//! Sign-in happens at the identity provider. These routes attach a local
//! profile to the verified subject and manage the refresh tokens issued to it.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{
    AuditStamp, RefreshTokenRequest, RefreshTokenResponse, RegisterUserRequest, UserResponse,
};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub token: RefreshTokenResponse,
}

/// POST /auth/register
///
/// Creates the caller's profile with the role carried by the token.
pub async fn register(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        user_id = %auth.user_id,
        username = %req.username,
        role = %auth.role,
        "Registering user"
    );

    let (user, token) = state
        .accounts
        .register(auth.principal(), req, &auth.stamp())
        .await?;

    Ok(Created::at(
        "/me",
        RegisterResponse {
            user: user.into(),
            token,
        },
    ))
}

/// POST /auth/refresh
///
/// Public: the refresh token itself is the credential.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .accounts
        .refresh(req.refresh_token, &AuditStamp::now("refresh"))
        .await?;
    Ok(Json(DataResponse::new(token)))
}

/// POST /auth/revoke
pub async fn revoke(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .accounts
        .revoke(auth.user_id, req.refresh_token, &auth.stamp())
        .await?;
    Ok(Json(MessageResponse::new("Refresh token revoked")))
}

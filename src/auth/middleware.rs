//! `RequireAuth`: the bearer-token extractor every protected route takes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ErrorResponse;
use crate::middleware::X_REQUEST_ID;

/// Verified caller. Handlers narrow it further with
/// [`AuthContext::require_role`].
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    InvalidFormat,
    InvalidToken,
}

impl AuthFailure {
    fn message(&self) -> &'static str {
        match self {
            Self::MissingToken => "Missing authorization token",
            Self::InvalidFormat => "Invalid authorization format",
            Self::InvalidToken => "Invalid or expired token",
        }
    }
}

/// 401 rejection, tagged with the request id when one is present.
#[derive(Debug)]
pub struct AuthError {
    pub failure: AuthFailure,
    request_id: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: "UNAUTHORIZED".to_string(),
            message: self.failure.message().to_string(),
            request_id: self.request_id,
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

/// Extracts the token from `Authorization: Bearer <token>`. The scheme is
/// matched case-insensitively.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthFailure::MissingToken)?
        .to_str()
        .map_err(|_| AuthFailure::InvalidFormat)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthFailure::InvalidFormat)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthFailure::InvalidFormat);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthFailure::MissingToken);
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let reject = |failure: AuthFailure| AuthError {
            failure,
            request_id: parts
                .headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };

        let token = bearer_token(&parts.headers).map_err(reject)?;

        let claims = match state.jwks_cache.verify_token(token).await {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(error = %err, path = %parts.uri.path(), "Bearer token rejected");
                return Err(reject(AuthFailure::InvalidToken));
            }
        };

        match AuthContext::from_claims(&claims) {
            Ok(context) => Ok(RequireAuth(context)),
            Err(reason) => {
                tracing::warn!(sub = %claims.sub, reason, "Token subject is not a user id");
                Err(reject(AuthFailure::InvalidToken))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Ok("abc"));
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthFailure::InvalidFormat)
        );
        assert_eq!(bearer_token(&headers("Bearer ")), Err(AuthFailure::InvalidFormat));
        assert_eq!(bearer_token(&headers("Bearer   ")), Err(AuthFailure::InvalidFormat));
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthFailure::MissingToken)
        );
    }
}

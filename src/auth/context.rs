use uuid::Uuid;

use super::Claims;
use crate::domain::{AuditStamp, UserRole};
use crate::error::{ApiError, ApiResult};
use crate::services::Principal;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    /// User email if available
    pub email: Option<String>,

    /// Application role, `Bidder` when the token carries none
    pub role: UserRole,

    /// Token issuer
    pub issuer: String,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role: resolve_role(claims),
            issuer: claims.iss.clone(),
        })
    }

    /// Actor and clock for the mutations made on behalf of this caller.
    pub fn stamp(&self) -> AuditStamp {
        AuditStamp::now(self.user_id.to_string())
    }

    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// 403 unless the caller holds one of `allowed`.
    pub fn require_role(&self, allowed: &[UserRole]) -> ApiResult<()> {
        if allowed.contains(&self.role) {
            return Ok(());
        }
        tracing::warn!(user_id = %self.user_id, role = %self.role, "Role not permitted");
        Err(ApiError::forbidden(format!(
            "Role '{}' is not permitted to perform this action",
            self.role
        )))
    }
}

/// `app_metadata.role` wins over the top-level `role` claim.
fn resolve_role(claims: &Claims) -> UserRole {
    claims
        .app_metadata
        .as_ref()
        .and_then(|m| m.role.as_deref())
        .into_iter()
        .chain(claims.role.as_deref())
        .find_map(|r| r.parse().ok())
        .unwrap_or_default()
}

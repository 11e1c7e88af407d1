use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::{User, UserRole};
use crate::domain::dto::AddressDto;

/// Request DTO for registering the authenticated subject as a user.
///
/// The role comes from the verified token, never from the body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Falls back to the token's email claim
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub company_address: Option<AddressDto>,
}

/// Administrator-provisioned account for a known identity-provider subject.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    /// Subject id the user will authenticate with
    pub user_id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    pub role: UserRole,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub company_address: Option<AddressDto>,
}

/// Request DTO for updating the caller's profile
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub company_address: Option<AddressDto>,
}

/// Token refresh / revoke request
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenResponse {
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Response DTO for user
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub company_name: Option<String>,
    pub registration_number: Option<String>,
    pub company_address: Option<AddressDto>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        let profile = u.profile();
        let company = u.company();
        Self {
            id: u.id(),
            username: u.username().to_string(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            email: profile.email.to_string(),
            phone_number: profile.phone_number.clone(),
            role: u.role(),
            is_active: u.is_active(),
            last_login_at: u.last_login_at(),
            company_name: company.map(|c| c.company_name.clone()),
            registration_number: company.map(|c| c.registration_number.clone()),
            company_address: company.map(|c| AddressDto::from(&c.company_address)),
            created_at: u.audit().created_at(),
        }
    }
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self::from(&u)
    }
}

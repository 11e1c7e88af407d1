use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::audit::{AuditInfo, AuditStamp};
use crate::domain::errors::{require_text, DomainError, DomainResult};
use crate::domain::value_objects::{Address, Email};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    ProcurementOfficer,
    Bidder,
    Evaluator,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Bidder
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::ProcurementOfficer => "procurement_officer",
            Self::Bidder => "bidder",
            Self::Evaluator => "evaluator",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "procurement_officer" | "procurementofficer" => Ok(Self::ProcurementOfficer),
            "bidder" => Ok(Self::Bidder),
            "evaluator" => Ok(Self::Evaluator),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Long-lived opaque token exchanged for a fresh session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub expiry_date: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub audit: AuditInfo,
}

impl RefreshToken {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expiry_date > now
    }
}

/// Company registration of a bidder.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyDetails {
    pub company_name: String,
    pub registration_number: String,
    pub company_address: Address,
}

/// Profile fields editable after registration.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub phone_number: String,
}

#[derive(Debug, Clone)]
pub struct User {
    id: Uuid,
    username: String,
    profile: UserProfile,
    role: UserRole,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    company: Option<CompanyDetails>,
    refresh_tokens: Vec<RefreshToken>,
    audit: AuditInfo,
}

impl User {
    /// `id` is the identity provider's subject for this account.
    pub fn new(
        id: Uuid,
        username: &str,
        profile: UserProfile,
        role: UserRole,
        stamp: &AuditStamp,
    ) -> DomainResult<Self> {
        let username = require_text("username", username)?;
        let profile = validate_profile(profile)?;
        Ok(Self {
            id,
            username,
            profile,
            role,
            is_active: true,
            last_login_at: None,
            company: None,
            refresh_tokens: Vec::new(),
            audit: AuditInfo::created(stamp),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn email(&self) -> &Email {
        &self.profile.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    pub fn company(&self) -> Option<&CompanyDetails> {
        self.company.as_ref()
    }

    pub fn refresh_tokens(&self) -> &[RefreshToken] {
        &self.refresh_tokens
    }

    pub fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    pub fn set_company_details(
        &mut self,
        company: CompanyDetails,
        stamp: &AuditStamp,
    ) -> DomainResult<()> {
        if self.role != UserRole::Bidder {
            return Err(DomainError::operation(
                "Only bidders can have company details",
            ));
        }
        let company_name = require_text("company name", &company.company_name)?;
        self.company = Some(CompanyDetails {
            company_name,
            ..company
        });
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn update_profile(&mut self, profile: UserProfile, stamp: &AuditStamp) -> DomainResult<()> {
        self.profile = validate_profile(profile)?;
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn activate(&mut self, stamp: &AuditStamp) {
        self.is_active = true;
        self.audit.touch(stamp);
    }

    pub fn deactivate(&mut self, stamp: &AuditStamp) {
        self.is_active = false;
        self.audit.touch(stamp);
    }

    pub fn record_login(&mut self, at: DateTime<Utc>) {
        self.last_login_at = Some(at);
    }

    /// Stores a new token, then drops expired tokens and the oldest ones
    /// beyond `max_tokens`.
    pub fn add_refresh_token(
        &mut self,
        token: &str,
        expiry_date: DateTime<Utc>,
        max_tokens: usize,
        stamp: &AuditStamp,
    ) -> DomainResult<()> {
        let token = require_text("refresh token", token)?;
        if expiry_date <= stamp.at {
            return Err(DomainError::invalid_argument(
                "expiry date",
                "must be in the future",
            ));
        }

        self.refresh_tokens.push(RefreshToken {
            id: Uuid::new_v4(),
            token,
            expiry_date,
            is_revoked: false,
            revoked_at: None,
            audit: AuditInfo::created(stamp),
        });
        self.refresh_tokens.retain(|t| t.expiry_date >= stamp.at);

        let max_tokens = max_tokens.max(1);
        if self.refresh_tokens.len() > max_tokens {
            let excess = self.refresh_tokens.len() - max_tokens;
            self.refresh_tokens.drain(..excess);
        }
        Ok(())
    }

    pub fn has_valid_refresh_token(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.refresh_tokens
            .iter()
            .any(|t| t.token == token && t.is_active(now))
    }

    /// Returns `false` when the token is unknown or already revoked.
    pub fn revoke_refresh_token(&mut self, token: &str, stamp: &AuditStamp) -> bool {
        match self
            .refresh_tokens
            .iter_mut()
            .find(|t| t.token == token && !t.is_revoked)
        {
            Some(t) => {
                t.is_revoked = true;
                t.revoked_at = Some(stamp.at);
                t.audit.touch(stamp);
                true
            }
            None => false,
        }
    }
}

fn validate_profile(mut profile: UserProfile) -> DomainResult<UserProfile> {
    profile.first_name = require_text("first name", &profile.first_name)?;
    profile.last_name = require_text("last name", &profile.last_name)?;
    profile.phone_number = profile.phone_number.trim().to_string();
    Ok(profile)
}

// ============================================================================
// Rehydration
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct UserSnapshot {
    pub id: Uuid,
    pub username: String,
    pub profile: UserProfile,
    pub role: UserRole,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub company: Option<CompanyDetails>,
    pub refresh_tokens: Vec<RefreshToken>,
    pub audit: AuditInfo,
}

impl User {
    pub(crate) fn from_snapshot(s: UserSnapshot) -> Self {
        Self {
            id: s.id,
            username: s.username,
            profile: s.profile,
            role: s.role,
            is_active: s.is_active,
            last_login_at: s.last_login_at,
            company: s.company,
            refresh_tokens: s.refresh_tokens,
            audit: s.audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn stamp() -> AuditStamp {
        AuditStamp::new("system", Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    fn profile() -> UserProfile {
        UserProfile {
            first_name: "Ada".into(),
            last_name: "Okafor".into(),
            email: Email::new("ada@builders.io").unwrap(),
            phone_number: "+1 555 0100".into(),
        }
    }

    fn user(role: UserRole) -> User {
        User::new(Uuid::new_v4(), "ada", profile(), role, &stamp()).unwrap()
    }

    fn company() -> CompanyDetails {
        CompanyDetails {
            company_name: "Okafor Builders".into(),
            registration_number: "RC-1234".into(),
            company_address: Address::new("1 Dock Rd", "Lagos", "LA", "NG", "100001"),
        }
    }

    #[test]
    fn test_new_user_is_active() {
        let u = user(UserRole::Evaluator);
        assert!(u.is_active());
        assert!(u.refresh_tokens().is_empty());
        assert!(User::new(Uuid::new_v4(), " ", profile(), UserRole::Admin, &stamp()).is_err());
    }

    #[test]
    fn test_only_bidders_have_company_details() {
        let mut officer = user(UserRole::ProcurementOfficer);
        let err = officer.set_company_details(company(), &stamp()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidOperation(_)));
        assert!(officer.company().is_none());

        let mut bidder = user(UserRole::Bidder);
        bidder.set_company_details(company(), &stamp()).unwrap();
        assert_eq!(bidder.company().unwrap().registration_number, "RC-1234");
    }

    #[test]
    fn test_refresh_tokens_are_capped() {
        let mut u = user(UserRole::Bidder);
        let s = stamp();
        for i in 0..7 {
            u.add_refresh_token(&format!("tok-{i}"), s.at + Duration::days(7), 5, &s)
                .unwrap();
        }
        assert_eq!(u.refresh_tokens().len(), 5);
        assert!(!u.has_valid_refresh_token("tok-0", s.at));
        assert!(u.has_valid_refresh_token("tok-6", s.at));
    }

    #[test]
    fn test_expired_tokens_are_pruned() {
        let mut u = user(UserRole::Bidder);
        let early = stamp();
        u.add_refresh_token("old", early.at + Duration::days(1), 5, &early)
            .unwrap();

        let later = AuditStamp::new("system", early.at + Duration::days(3));
        u.add_refresh_token("new", later.at + Duration::days(7), 5, &later)
            .unwrap();
        assert_eq!(u.refresh_tokens().len(), 1);
        assert_eq!(u.refresh_tokens()[0].token, "new");
    }

    #[test]
    fn test_revoke_refresh_token() {
        let mut u = user(UserRole::Bidder);
        let s = stamp();
        u.add_refresh_token("tok", s.at + Duration::days(7), 5, &s)
            .unwrap();
        assert!(u.revoke_refresh_token("tok", &s));
        assert!(!u.has_valid_refresh_token("tok", s.at));
        assert!(!u.revoke_refresh_token("tok", &s));
        assert!(!u.revoke_refresh_token("missing", &s));
    }

    #[test]
    fn test_deactivate_and_activate() {
        let mut u = user(UserRole::Bidder);
        u.deactivate(&stamp());
        assert!(!u.is_active());
        u.activate(&stamp());
        assert!(u.is_active());
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(
            "ProcurementOfficer".parse::<UserRole>().unwrap(),
            UserRole::ProcurementOfficer
        );
        assert!("authenticated".parse::<UserRole>().is_err());
    }
}

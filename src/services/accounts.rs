//! User registration and refresh-token lifecycle.
//!
//! Identity is owned by the external provider; this service keeps the local
//! profile keyed by the token subject and the refresh tokens issued to it.

use chrono::Duration;
use futures::FutureExt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::{require_field, ServiceError, ServiceResult};
use crate::domain::{
    Address, AuditStamp, CompanyDetails, CreateUserRequest, Email, RefreshTokenResponse,
    RegisterUserRequest, UpdateUserRequest, User, UserProfile, UserRole,
};
use crate::persistence::{Store, Transaction, UnitOfWork};

/// Verified caller identity as seen by the services.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy)]
pub struct TokenPolicy {
    pub ttl_days: i64,
    pub max_tokens: usize,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl_days: 7,
            max_tokens: 5,
        }
    }
}

async fn load_user(tx: &mut Transaction<'_>, id: Uuid) -> ServiceResult<User> {
    tx.users()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("user", id))
}

fn generate_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// Adds a fresh token to `user` and returns it to the caller.
fn issue_token(
    user: &mut User,
    policy: TokenPolicy,
    stamp: &AuditStamp,
) -> ServiceResult<RefreshTokenResponse> {
    let token = generate_token();
    let expires_at = stamp.at + Duration::days(policy.ttl_days);
    user.add_refresh_token(&token, expires_at, policy.max_tokens, stamp)?;
    Ok(RefreshTokenResponse {
        refresh_token: token,
        expires_at,
    })
}

/// Merges optional company fields over what the user already has.
fn merge_company(
    current: Option<&CompanyDetails>,
    name: Option<String>,
    registration_number: Option<String>,
    address: Option<Address>,
) -> ServiceResult<Option<CompanyDetails>> {
    if name.is_none() && registration_number.is_none() && address.is_none() {
        return Ok(None);
    }
    let company_name = name
        .or_else(|| current.map(|c| c.company_name.clone()))
        .ok_or_else(|| ServiceError::Validation("company_name is required".into()))?;
    let company_address = address
        .or_else(|| current.map(|c| c.company_address.clone()))
        .ok_or_else(|| ServiceError::Validation("company_address is required".into()))?;
    let registration_number = registration_number
        .or_else(|| current.map(|c| c.registration_number.clone()))
        .unwrap_or_default();

    Ok(Some(CompanyDetails {
        company_name,
        registration_number,
        company_address,
    }))
}

/// Fields of a user about to be created, already validated.
struct NewAccount {
    user_id: Uuid,
    username: String,
    profile: UserProfile,
    role: UserRole,
    company: Option<CompanyDetails>,
}

/// Checks id, username and email uniqueness, then builds the user. The
/// caller persists it.
async fn build_account(
    tx: &mut Transaction<'_>,
    account: NewAccount,
    stamp: &AuditStamp,
) -> ServiceResult<User> {
    if tx.users().exists(account.user_id).await? {
        return Err(ServiceError::DuplicateKey(
            "User is already registered".into(),
        ));
    }
    if tx.users().exists_by_username(&account.username).await? {
        return Err(ServiceError::DuplicateKey(format!(
            "Username '{}' is already taken",
            account.username
        )));
    }
    let email = account.profile.email.clone();
    if tx.users().exists_by_email(email.as_str()).await? {
        return Err(ServiceError::DuplicateKey(format!(
            "Email '{email}' is already registered"
        )));
    }

    let mut user = User::new(
        account.user_id,
        &account.username,
        account.profile,
        account.role,
        stamp,
    )?;
    if let Some(company) = account.company {
        user.set_company_details(company, stamp)?;
    }
    Ok(user)
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    policy: TokenPolicy,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, policy: TokenPolicy) -> Self {
        Self { store, policy }
    }

    fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone())
    }

    /// Creates the local profile for the authenticated subject and issues
    /// its first refresh token.
    #[instrument(skip(self, req, stamp), fields(user_id = %principal.user_id, role = %principal.role))]
    pub async fn register(
        &self,
        principal: Principal,
        req: RegisterUserRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<(User, RefreshTokenResponse)> {
        require_field("username", &req.username)?;
        let email = req
            .email
            .clone()
            .or_else(|| principal.email.clone())
            .ok_or_else(|| ServiceError::Validation("email is required".into()))?;
        let email = Email::new(&email)?;
        let policy = self.policy;
        let stamp = stamp.clone();

        let account = NewAccount {
            user_id: principal.user_id,
            username: req.username.trim().to_string(),
            profile: UserProfile {
                first_name: req.first_name,
                last_name: req.last_name,
                email,
                phone_number: req.phone_number,
            },
            role: principal.role,
            company: merge_company(
                None,
                req.company_name,
                req.registration_number,
                req.company_address.map(Address::from),
            )?,
        };

        let (user, token) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut user = build_account(tx, account, &stamp).await?;
                    user.record_login(stamp.at);
                    let token = issue_token(&mut user, policy, &stamp)?;

                    tx.users().add(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>((user, token))
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user.id(), username = %user.username(), "User registered");
        Ok((user, token))
    }

    /// Swaps a valid refresh token for a new one. The presented token is
    /// revoked in the same transaction.
    #[instrument(skip(self, token, stamp))]
    pub async fn refresh(&self, token: String, stamp: &AuditStamp) -> ServiceResult<RefreshTokenResponse> {
        let policy = self.policy;
        let stamp = stamp.clone();

        let (user_id, issued) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut user = tx
                        .users()
                        .get_by_refresh_token(&token)
                        .await?
                        .filter(|u| u.has_valid_refresh_token(&token, stamp.at))
                        .ok_or_else(|| {
                            ServiceError::Unauthorized("Invalid or expired refresh token".into())
                        })?;
                    if !user.is_active() {
                        return Err(ServiceError::Forbidden("Account is deactivated".into()));
                    }

                    user.revoke_refresh_token(&token, &stamp);
                    user.record_login(stamp.at);
                    let issued = issue_token(&mut user, policy, &stamp)?;

                    tx.users().update(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>((user.id(), issued))
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user_id, "Refresh token rotated");
        Ok(issued)
    }

    #[instrument(skip(self, token, stamp))]
    pub async fn revoke(&self, user_id: Uuid, token: String, stamp: &AuditStamp) -> ServiceResult<()> {
        let stamp = stamp.clone();
        self.uow()
            .execute(move |tx| {
                async move {
                    let mut user = load_user(tx, user_id).await?;
                    if !user.revoke_refresh_token(&token, &stamp) {
                        return Err(ServiceError::NotFound {
                            entity: "refresh token",
                            id: "active token".into(),
                        });
                    }
                    tx.users().update(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(())
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user_id, "Refresh token revoked");
        Ok(())
    }

    #[instrument(skip(self, req, stamp))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateUserRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<User> {
        let email = req.email.as_deref().map(Email::new).transpose()?;
        let stamp = stamp.clone();

        self.uow()
            .execute(move |tx| {
                async move {
                    let mut user = load_user(tx, user_id).await?;

                    if let Some(email) = &email {
                        if email != user.email() && tx.users().exists_by_email(email.as_str()).await? {
                            return Err(ServiceError::DuplicateKey(format!(
                                "Email '{email}' is already registered"
                            )));
                        }
                    }

                    let current = user.profile().clone();
                    user.update_profile(
                        UserProfile {
                            first_name: req.first_name.unwrap_or(current.first_name),
                            last_name: req.last_name.unwrap_or(current.last_name),
                            email: email.unwrap_or(current.email),
                            phone_number: req.phone_number.unwrap_or(current.phone_number),
                        },
                        &stamp,
                    )?;

                    if let Some(company) = merge_company(
                        user.company(),
                        req.company_name,
                        req.registration_number,
                        req.company_address.map(Address::from),
                    )? {
                        user.set_company_details(company, &stamp)?;
                    }

                    tx.users().update(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(user)
                }
                .boxed()
            })
            .await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn activate(&self, user_id: Uuid, stamp: &AuditStamp) -> ServiceResult<User> {
        self.set_active(user_id, true, stamp).await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn deactivate(&self, user_id: Uuid, stamp: &AuditStamp) -> ServiceResult<User> {
        self.set_active(user_id, false, stamp).await
    }

    async fn set_active(&self, user_id: Uuid, active: bool, stamp: &AuditStamp) -> ServiceResult<User> {
        let stamp = stamp.clone();
        let user = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut user = load_user(tx, user_id).await?;
                    if active {
                        user.activate(&stamp);
                    } else {
                        user.deactivate(&stamp);
                    }
                    tx.users().update(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(user)
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user_id, is_active = active, "User activation changed");
        Ok(user)
    }

    /// Administrator-provisioned account for a subject that has not signed
    /// in yet. No refresh token is issued.
    #[instrument(skip(self, req, stamp), fields(user_id = %req.user_id, role = %req.role, actor = %stamp.actor))]
    pub async fn provision(&self, req: CreateUserRequest, stamp: &AuditStamp) -> ServiceResult<User> {
        require_field("username", &req.username)?;
        let account = NewAccount {
            user_id: req.user_id,
            username: req.username.trim().to_string(),
            profile: UserProfile {
                first_name: req.first_name,
                last_name: req.last_name,
                email: Email::new(&req.email)?,
                phone_number: req.phone_number,
            },
            role: req.role,
            company: merge_company(
                None,
                req.company_name,
                req.registration_number,
                req.company_address.map(Address::from),
            )?,
        };
        let stamp = stamp.clone();

        let user = self
            .uow()
            .execute(move |tx| {
                async move {
                    let user = build_account(tx, account, &stamp).await?;
                    tx.users().add(&user).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(user)
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user.id(), username = %user.username(), "User provisioned");
        Ok(user)
    }

    /// Removes the local profile and its refresh tokens.
    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn delete(&self, user_id: Uuid, stamp: &AuditStamp) -> ServiceResult<()> {
        self.uow()
            .execute(move |tx| {
                async move {
                    if !tx.users().remove(user_id).await? {
                        return Err(ServiceError::not_found("user", user_id));
                    }
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(())
                }
                .boxed()
            })
            .await?;

        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid) -> ServiceResult<User> {
        self.uow().execute(move |tx| load_user(tx, user_id).boxed()).await
    }

    pub async fn get_by_username(&self, username: String) -> ServiceResult<User> {
        require_field("username", &username)?;
        self.uow()
            .execute(move |tx| {
                async move {
                    let username = username.trim();
                    tx.users()
                        .get_by_username(username)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("user", username))
                }
                .boxed()
            })
            .await
    }

    pub async fn list(&self) -> ServiceResult<Vec<User>> {
        self.uow()
            .execute(|tx| {
                async move { Ok::<_, ServiceError>(tx.users().get_all().await?) }.boxed()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AddressDto;
    use crate::persistence::InMemoryStore;
    use chrono::Utc;

    fn service() -> AccountService {
        AccountService::new(Arc::new(InMemoryStore::new()), TokenPolicy::default())
    }

    fn principal(role: UserRole) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            email: Some("ada@acme.example".into()),
            role,
        }
    }

    fn register_request(username: &str) -> RegisterUserRequest {
        RegisterUserRequest {
            username: username.into(),
            first_name: "Ada".into(),
            last_name: "Okafor".into(),
            email: None,
            phone_number: "+44 20 0000 0000".into(),
            company_name: Some("Acme Paving".into()),
            registration_number: Some("RC-1234".into()),
            company_address: Some(AddressDto {
                street: "1 Main St".into(),
                city: "Leeds".into(),
                state: String::new(),
                country: "UK".into(),
                zip_code: "LS1".into(),
            }),
        }
    }

    #[tokio::test]
    async fn test_register_bidder_with_company_and_token() {
        let svc = service();
        let who = principal(UserRole::Bidder);
        let stamp = AuditStamp::now(who.user_id.to_string());

        let (user, token) = svc
            .register(who.clone(), register_request("ada"), &stamp)
            .await
            .unwrap();

        assert_eq!(user.id(), who.user_id);
        assert_eq!(user.email().as_str(), "ada@acme.example");
        assert_eq!(user.company().unwrap().company_name, "Acme Paving");
        assert!(user.has_valid_refresh_token(&token.refresh_token, Utc::now()));

        let again = svc.register(who, register_request("ada2"), &stamp).await;
        assert!(matches!(again, Err(ServiceError::DuplicateKey(_))));
    }

    #[tokio::test]
    async fn test_register_officer_rejects_company_details() {
        let svc = service();
        let who = principal(UserRole::ProcurementOfficer);
        let stamp = AuditStamp::now("officer");

        let result = svc.register(who, register_request("grace"), &stamp).await;
        assert!(matches!(result, Err(ServiceError::Domain(_))));
        assert!(svc.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_old_token_stops_working() {
        let svc = service();
        let who = principal(UserRole::Bidder);
        let stamp = AuditStamp::now("ada");
        let (_, first) = svc.register(who, register_request("ada"), &stamp).await.unwrap();

        let second = svc
            .refresh(first.refresh_token.clone(), &AuditStamp::now("ada"))
            .await
            .unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        let reused = svc.refresh(first.refresh_token, &AuditStamp::now("ada")).await;
        assert!(matches!(reused, Err(ServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_deactivated_user_cannot_refresh() {
        let svc = service();
        let who = principal(UserRole::Bidder);
        let (user, token) = svc
            .register(who, register_request("ada"), &AuditStamp::now("ada"))
            .await
            .unwrap();

        svc.deactivate(user.id(), &AuditStamp::now("admin")).await.unwrap();
        let result = svc.refresh(token.refresh_token, &AuditStamp::now("ada")).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_revoke_unknown_token_is_not_found() {
        let svc = service();
        let who = principal(UserRole::Evaluator);
        let mut req = register_request("eve");
        req.company_name = None;
        req.registration_number = None;
        req.company_address = None;
        let (user, _) = svc.register(who, req, &AuditStamp::now("eve")).await.unwrap();

        let result = svc
            .revoke(user.id(), "nope".into(), &AuditStamp::now("eve"))
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    fn provision_request(username: &str, email: &str) -> CreateUserRequest {
        CreateUserRequest {
            user_id: Uuid::new_v4(),
            username: username.into(),
            first_name: "Grace".into(),
            last_name: "Mensah".into(),
            email: email.into(),
            phone_number: String::new(),
            role: UserRole::Evaluator,
            company_name: None,
            registration_number: None,
            company_address: None,
        }
    }

    #[tokio::test]
    async fn test_provisioned_user_is_found_by_username_and_can_be_deleted() {
        let svc = service();
        let admin = AuditStamp::now("admin");

        let user = svc
            .provision(provision_request("grace", "grace@county.gov"), &admin)
            .await
            .unwrap();
        assert_eq!(user.role(), UserRole::Evaluator);
        assert!(user.last_login_at().is_none());

        let found = svc.get_by_username(" grace ".into()).await.unwrap();
        assert_eq!(found.id(), user.id());

        let clash = svc
            .provision(provision_request("grace-2", "grace@county.gov"), &admin)
            .await;
        assert!(matches!(clash, Err(ServiceError::DuplicateKey(_))));

        svc.delete(user.id(), &admin).await.unwrap();
        assert!(matches!(
            svc.get_by_username("grace".into()).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            svc.delete(user.id(), &admin).await,
            Err(ServiceError::NotFound { .. })
        ));
    }
}

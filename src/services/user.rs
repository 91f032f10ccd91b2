//! User service
//!
//! Implements the credential store:
//! - Registration with normalised, unique email
//! - Login issuing a bearer token
//! - Token verification backed by a user lookup
//! - Administrative account status changes

use crate::db::is_unique_violation;
use crate::db::repositories::UserRepository;
use crate::hooks::{hook_names, HookManager};
use crate::models::{ProfileUpdate, RegisterInput, User, UserRole, UserStatus};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::{IssuedToken, TokenIssuer};
use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 6;

const MAX_USERNAME_LENGTH: usize = 50;
const MAX_NAME_LENGTH: usize = 100;

/// A user together with a freshly issued token
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub user: User,
}

impl AuthSession {
    fn new(user: User, issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at,
            user,
        }
    }
}

/// User service for accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenIssuer>,
    hook_manager: Option<Arc<HookManager>>,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            user_repo,
            tokens,
            hook_manager: None,
        }
    }

    /// Create a new user service with hook manager
    pub fn with_hooks(
        user_repo: Arc<dyn UserRepository>,
        tokens: Arc<TokenIssuer>,
        hook_manager: Arc<HookManager>,
    ) -> Self {
        Self {
            user_repo,
            tokens,
            hook_manager: Some(hook_manager),
        }
    }

    fn trigger_hook(&self, name: &str, data: serde_json::Value) {
        if let Some(ref manager) = self.hook_manager {
            manager.trigger(name, data);
        }
    }

    /// Register a new account with role `user` and status `active`.
    ///
    /// # Errors
    ///
    /// - `Validation` for a malformed email, short password or empty name
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, input: RegisterInput) -> ServiceResult<AuthSession> {
        let email = normalize_email(&input.email);
        validate_registration(&email, &input.password, &input.name)?;

        let username = match input.username.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => email.split('@').next().unwrap_or_default().to_string(),
        };
        check_username(&username)?;

        if self.user_repo.get_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&input.password)?;
        let user = User::new(
            username,
            email,
            input.name.trim().to_string(),
            password_hash,
            UserRole::User,
        );

        // Two racing registrations both pass the lookup; the unique key decides.
        let created = match self.user_repo.create(&user).await {
            Ok(created) => created,
            Err(e) if is_unique_violation(&e) => {
                return Err(ServiceError::Conflict("Email already registered".to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = created.id, "User registered");
        self.trigger_hook(
            hook_names::USER_REGISTER_AFTER,
            json!({
                "id": created.id,
                "username": created.username,
                "email": created.email,
            }),
        );

        let issued = self.tokens.issue(&created)?;
        Ok(AuthSession::new(created, issued))
    }

    /// Authenticate with email and password.
    ///
    /// Inactive accounts are only reported as such once the password has
    /// verified. Failed attempts leave no state behind.
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` for an unknown email or wrong password
    /// - `AccountInactive` for a deactivated account with the right password
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<AuthSession> {
        let email = normalize_email(email);

        let user = match self.user_repo.get_by_email(&email).await? {
            Some(user) => user,
            None => return Err(self.login_failed(&email, "unknown email")),
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(self.login_failed(&email, "wrong password"));
        }

        if !user.is_active() {
            tracing::warn!(user_id = user.id, "Login refused for inactive account");
            return Err(ServiceError::AccountInactive);
        }

        let issued = self.tokens.issue(&user)?;
        tracing::info!(user_id = user.id, "User logged in");
        self.trigger_hook(
            hook_names::USER_LOGIN_AFTER,
            json!({ "id": user.id, "email": user.email }),
        );

        Ok(AuthSession::new(user, issued))
    }

    fn login_failed(&self, email: &str, reason: &str) -> ServiceError {
        tracing::warn!(reason, "Login failed");
        self.trigger_hook(
            hook_names::USER_LOGIN_FAILED,
            json!({ "email": email, "reason": reason }),
        );
        ServiceError::InvalidCredentials
    }

    /// Resolve a bearer token to the user it names.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` for a bad signature, expired or malformed token
    /// - `UserNotFound` when the user no longer exists or is inactive
    pub async fn verify(&self, token: &str) -> ServiceResult<User> {
        let claims = self.tokens.decode(token)?;

        match self.user_repo.get_by_id(claims.sub).await? {
            Some(user) if user.is_active() => Ok(user),
            _ => Err(ServiceError::UserNotFound),
        }
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<User> {
        self.user_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    /// Change the caller's own display name and username.
    ///
    /// Values are trimmed; a field left out keeps its current value.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty or over-long name or username
    /// - `UserNotFound` if the account vanished in the meantime
    pub async fn update_profile(&self, user: &User, update: ProfileUpdate) -> ServiceResult<User> {
        let name = match update.name.as_deref().map(str::trim) {
            Some(name) => name.to_string(),
            None => user.name.clone(),
        };
        let username = match update.username.as_deref().map(str::trim) {
            Some(username) => username.to_string(),
            None => user.username.clone(),
        };
        check_name(&name)?;
        check_username(&username)?;

        if !self.user_repo.update_profile(user.id, &name, &username).await? {
            return Err(ServiceError::UserNotFound);
        }

        tracing::info!(user_id = user.id, "Profile updated");
        self.trigger_hook(
            hook_names::USER_PROFILE_UPDATED,
            json!({ "id": user.id, "name": name, "username": username }),
        );

        self.user_repo
            .get_by_id(user.id)
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    /// Activate or deactivate an account. Admin only.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `actor` is not an admin
    /// - `Validation` if an admin tries to deactivate themselves
    /// - `NotFound` if the user does not exist
    pub async fn set_user_status(
        &self,
        actor: &User,
        user_id: i64,
        status: UserStatus,
    ) -> ServiceResult<User> {
        if !actor.is_admin() {
            return Err(ServiceError::forbidden("Admin privileges required"));
        }
        if actor.id == user_id && status == UserStatus::Inactive {
            return Err(ServiceError::validation("You cannot deactivate your own account"));
        }

        if !self.user_repo.update_status(user_id, status).await? {
            return Err(ServiceError::not_found("User not found"));
        }

        tracing::info!(user_id, %status, admin_id = actor.id, "User status changed");
        self.trigger_hook(
            hook_names::USER_STATUS_CHANGED,
            json!({ "id": user_id, "status": status.to_string(), "admin_id": actor.id }),
        );

        self.get_by_id(user_id).await
    }

    /// Make sure an admin account exists for `email`.
    ///
    /// An existing account is promoted; otherwise one is created with the
    /// given password. Used at start-up from configuration.
    pub async fn ensure_admin(&self, email: &str, password: &str, name: &str) -> ServiceResult<User> {
        let email = normalize_email(email);

        if let Some(existing) = self.user_repo.get_by_email(&email).await? {
            if !existing.is_admin() {
                self.user_repo
                    .update_role(existing.id, UserRole::Admin)
                    .await
                    .context("Failed to promote admin")?;
                tracing::info!(user_id = existing.id, "Promoted existing account to admin");
            }
            return self.get_by_id(existing.id).await;
        }

        validate_registration(&email, password, name)?;
        let username = email.split('@').next().unwrap_or_default().to_string();
        let admin = User::new(
            username,
            email,
            name.trim().to_string(),
            hash_password(password)?,
            UserRole::Admin,
        );
        let created = self.user_repo.create(&admin).await?;
        tracing::info!(user_id = created.id, "Created admin account");
        Ok(created)
    }
}

/// Trim and lower-case an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_registration(email: &str, password: &str, name: &str) -> ServiceResult<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
        _ => return Err(ServiceError::validation("A valid email address is required")),
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    check_name(name.trim())
}

fn check_name(name: &str) -> ServiceResult<()> {
    if name.is_empty() {
        return Err(ServiceError::validation("Name is required"));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ServiceError::validation(format!(
            "Name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

fn check_username(username: &str) -> ServiceResult<()> {
    if username.is_empty() {
        return Err(ServiceError::validation("Username must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ServiceError::validation(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn create_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool),
            Arc::new(TokenIssuer::with_days("test-secret", 7)),
        )
    }

    fn input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            name: "Test User".to_string(),
            username: None,
        }
    }

    #[tokio::test]
    async fn test_register_defaults() {
        let service = create_test_service().await;
        let session = service.register(input("  Ada@Example.COM ")).await.unwrap();

        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.username, "ada");
        assert_eq!(session.user.role, UserRole::User);
        assert_eq!(session.user.status, UserStatus::Active);
        assert!(!session.token.is_empty());
        assert_ne!(session.user.password_hash, "password123");
    }

    #[tokio::test]
    async fn test_register_duplicate_email_conflicts() {
        let service = create_test_service().await;
        service.register(input("dup@example.com")).await.unwrap();

        let err = service.register(input("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = create_test_service().await;

        let err = service.register(input("no-at-sign")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut short = input("short@example.com");
        short.password = "12345".to_string();
        assert!(matches!(service.register(short).await, Err(ServiceError::Validation(_))));

        let mut nameless = input("nameless@example.com");
        nameless.name = "   ".to_string();
        assert!(matches!(service.register(nameless).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_and_verify() {
        let service = create_test_service().await;
        let registered = service.register(input("login@example.com")).await.unwrap();

        let session = service.login("LOGIN@example.com", "password123").await.unwrap();
        assert_eq!(session.user.id, registered.user.id);

        let verified = service.verify(&session.token).await.unwrap();
        assert_eq!(verified.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_invalid_credentials() {
        let service = create_test_service().await;
        service.register(input("wrong@example.com")).await.unwrap();

        for _ in 0..5 {
            let err = service.login("wrong@example.com", "nope-nope").await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidCredentials));
        }
        let err = service.login("ghost@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        // No lockout: the right password still works.
        assert!(service.login("wrong@example.com", "password123").await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_account() {
        let service = create_test_service().await;
        let admin = service.ensure_admin("root@example.com", "rootpass", "Root").await.unwrap();
        let user = service.register(input("idle@example.com")).await.unwrap();

        service
            .set_user_status(&admin, user.user.id, UserStatus::Inactive)
            .await
            .unwrap();

        // Wrong password does not reveal the status.
        let err = service.login("idle@example.com", "bad-password").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidCredentials));

        let err = service.login("idle@example.com", "password123").await.unwrap_err();
        assert!(matches!(err, ServiceError::AccountInactive));

        // Tokens issued before deactivation stop working.
        let err = service.verify(&user.token).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[tokio::test]
    async fn test_verify_bad_token() {
        let service = create_test_service().await;
        let err = service.verify("garbage").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidToken));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = create_test_service().await;
        let user = service.register(input("pat@example.com")).await.unwrap().user;

        let update = ProfileUpdate {
            name: Some("  Pat Doe ".to_string()),
            username: None,
        };
        let updated = service.update_profile(&user, update).await.unwrap();
        assert_eq!(updated.name, "Pat Doe");
        assert_eq!(updated.username, "pat");

        let update = ProfileUpdate {
            name: None,
            username: Some(" patd ".to_string()),
        };
        let updated = service.update_profile(&updated, update).await.unwrap();
        assert_eq!(updated.name, "Pat Doe");
        assert_eq!(updated.username, "patd");
        assert_eq!(updated.email, "pat@example.com");
    }

    #[tokio::test]
    async fn test_update_profile_validation() {
        let service = create_test_service().await;
        let user = service.register(input("val@example.com")).await.unwrap().user;

        for update in [
            ProfileUpdate { name: Some("   ".to_string()), username: None },
            ProfileUpdate { name: None, username: Some("".to_string()) },
            ProfileUpdate { name: None, username: Some("u".repeat(51)) },
            ProfileUpdate { name: Some("n".repeat(101)), username: None },
        ] {
            let err = service.update_profile(&user, update).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }

        let unchanged = service.get_by_id(user.id).await.unwrap();
        assert_eq!(unchanged.name, "Test User");
        assert_eq!(unchanged.username, "val");

        let mut ghost = user.clone();
        ghost.id = 9999;
        let err = service.update_profile(&ghost, ProfileUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[tokio::test]
    async fn test_set_user_status_rules() {
        let service = create_test_service().await;
        let admin = service.ensure_admin("root@example.com", "rootpass", "Root").await.unwrap();
        let user = service.register(input("plain@example.com")).await.unwrap().user;

        let err = service
            .set_user_status(&user, admin.id, UserStatus::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let err = service
            .set_user_status(&admin, admin.id, UserStatus::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service
            .set_user_status(&admin, 9999, UserStatus::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ensure_admin_promotes_existing() {
        let service = create_test_service().await;
        let user = service.register(input("boss@example.com")).await.unwrap().user;

        let admin = service.ensure_admin("boss@example.com", "ignored", "Boss").await.unwrap();
        assert_eq!(admin.id, user.id);
        assert!(admin.is_admin());

        let again = service.ensure_admin("boss@example.com", "ignored", "Boss").await.unwrap();
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    async fn test_hooks_fire() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let hooks = Arc::new(HookManager::new());
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        hooks.register(
            hook_names::USER_LOGIN_FAILED,
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                None
            },
            0,
            None,
        );
        let profiles = Arc::new(AtomicUsize::new(0));
        let counter = profiles.clone();
        hooks.register(
            hook_names::USER_PROFILE_UPDATED,
            move |data| {
                assert_eq!(data["name"], "Renamed");
                counter.fetch_add(1, Ordering::SeqCst);
                None
            },
            0,
            None,
        );
        let service = UserService::with_hooks(
            SqlxUserRepository::boxed(pool),
            Arc::new(TokenIssuer::with_days("test-secret", 7)),
            hooks,
        );

        let _ = service.login("nobody@example.com", "whatever").await;
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let user = service.register(input("hooked@example.com")).await.unwrap().user;
        let update = ProfileUpdate { name: Some("Renamed".to_string()), username: None };
        service.update_profile(&user, update).await.unwrap();
        assert_eq!(profiles.load(Ordering::SeqCst), 1);
    }
}

//! Registration, login, profile and password reset

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use uuid::Uuid;
use validator::Validate;

use super::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    Role, UpdateProfileRequest, User, UserProfile,
};
use super::password::{hash_password, verify_password};
use super::token::{AuthUser, TokenIssuer};
use super::validation::{
    from_validation_errors, normalize_email, normalize_phone, required, validate_password,
};
use crate::core_types::UserId;
use crate::error::ServiceError;
use crate::notify::ResetNotifier;
use crate::store::Store;

/// Validate a registration and build the row, password hashed
fn new_user(req: RegisterRequest) -> Result<User, ServiceError> {
    req.validate()
        .map_err(|e| ServiceError::from(from_validation_errors(&e)))?;

    let now = Utc::now();
    Ok(User {
        id: Uuid::new_v4(),
        first_name: required(&req.first_name, "first_name")?,
        last_name: required(&req.last_name, "last_name")?,
        email: normalize_email(&req.email)?,
        password_hash: hash_password(&req.password)?,
        address: trimmed(req.address),
        city: trimmed(req.city),
        postal_code: trimmed(req.postal_code),
        location: trimmed(req.location),
        phone_number: normalize_phone(&req.phone_number)?,
        role: req.role,
        is_active: true,
        reset_code: None,
        reset_code_expires_at: None,
        reset_attempts: 0,
        created_at: now,
        updated_at: now,
    })
}

/// Wrong reset codes tolerated before the code is dropped
pub const MAX_RESET_ATTEMPTS: i32 = 5;

pub struct UserService {
    store: Arc<dyn Store>,
    tokens: Arc<TokenIssuer>,
    notifier: Arc<dyn ResetNotifier>,
    reset_code_ttl: Duration,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        tokens: Arc<TokenIssuer>,
        notifier: Arc<dyn ResetNotifier>,
        reset_code_ttl_minutes: i64,
    ) -> Self {
        Self {
            store,
            tokens,
            notifier,
            reset_code_ttl: Duration::minutes(reset_code_ttl_minutes),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Resolve a bearer/cookie token to the caller identity
    pub fn authenticate(&self, token: &str) -> Result<AuthUser, ServiceError> {
        Ok(self.tokens.verify(token)?)
    }

    /// Register a new customer or seller. 409 when the email or the
    /// (phone, role) pair exists. Admins come from promotion or the
    /// configured bootstrap account only.
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, ServiceError> {
        if req.role == Role::Admin {
            return Err(ServiceError::forbidden("admin accounts cannot self-register"));
        }
        let user = new_user(req)?;
        self.store.insert_user(&user).await?;
        tracing::info!("User registered: {} ({})", user.id, user.role);
        Ok(user.into())
    }

    /// Create the bootstrap admin unless an admin with that phone exists
    pub async fn ensure_admin(&self, mut req: RegisterRequest) -> Result<UserProfile, ServiceError> {
        let phone = normalize_phone(&req.phone_number)?;
        if let Some(existing) = self.store.find_user_by_phone(&phone, Role::Admin).await? {
            return Ok(existing.into());
        }
        req.role = Role::Admin;
        let user = new_user(req)?;
        self.store.insert_user(&user).await?;
        tracing::info!("Bootstrap admin created: {}", user.id);
        Ok(user.into())
    }

    /// Phone + password + role. Unknown account is 404, wrong password 401.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let phone = normalize_phone(&req.phone_number)?;
        let user = self
            .store
            .find_user_by_phone(&phone, req.role)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        if !verify_password(&req.password, &user.password_hash)? {
            tracing::warn!("Login failed for user {}: wrong password", user.id);
            return Err(ServiceError::unauthorized("invalid credentials"));
        }
        if !user.is_active {
            return Err(ServiceError::forbidden("account disabled"));
        }

        let (token, expires_at) = self.tokens.issue(user.id, user.role)?;
        Ok(AuthResponse {
            token,
            expires_at,
            user: user.into(),
        })
    }

    /// Revoke the caller's token until it would have expired
    pub fn logout(&self, caller: &AuthUser) {
        self.tokens.revoke(&caller.token_id, caller.expires_at);
        tracing::info!("User {} logged out", caller.user_id);
    }

    pub async fn profile(&self, caller: &AuthUser) -> Result<UserProfile, ServiceError> {
        Ok(self.load(caller.user_id).await?.into())
    }

    /// Apply any subset of fields; email and phone are re-validated
    pub async fn update_profile(
        &self,
        caller: &AuthUser,
        req: UpdateProfileRequest,
    ) -> Result<UserProfile, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::from(from_validation_errors(&e)))?;

        let mut user = self.load(caller.user_id).await?;
        if let Some(first_name) = req.first_name {
            user.first_name = required(&first_name, "first_name")?;
        }
        if let Some(last_name) = req.last_name {
            user.last_name = required(&last_name, "last_name")?;
        }
        if let Some(email) = req.email {
            user.email = normalize_email(&email)?;
        }
        if let Some(phone) = req.phone_number {
            user.phone_number = normalize_phone(&phone)?;
        }
        if req.address.is_some() {
            user.address = trimmed(req.address);
        }
        if req.city.is_some() {
            user.city = trimmed(req.city);
        }
        if req.postal_code.is_some() {
            user.postal_code = trimmed(req.postal_code);
        }
        if req.location.is_some() {
            user.location = trimmed(req.location);
        }
        if let Some(password) = req.password {
            validate_password(&password)?;
            user.password_hash = hash_password(&password)?;
        }
        user.updated_at = Utc::now();

        self.store.save_user(&user).await?;
        Ok(user.into())
    }

    /// Admin only
    pub async fn list_users(&self, caller: &AuthUser) -> Result<Vec<UserProfile>, ServiceError> {
        require_admin(caller)?;
        let users = self.store.list_users().await?;
        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    /// Admin only. Sets the target's role to admin.
    pub async fn promote_to_admin(
        &self,
        caller: &AuthUser,
        target: UserId,
    ) -> Result<UserProfile, ServiceError> {
        require_admin(caller)?;
        let mut user = self.load(target).await?;
        if user.role != Role::Admin {
            user.role = Role::Admin;
            user.updated_at = Utc::now();
            self.store.save_user(&user).await?;
            tracing::info!("User {} promoted to admin by {}", target, caller.user_id);
        }
        Ok(user.into())
    }

    /// Store a 4-digit code and hand it to the notifier without waiting
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<(), ServiceError> {
        let email = normalize_email(&req.email)?;
        let phone = normalize_phone(&req.phone_number)?;
        let mut user = self
            .store
            .find_user_by_contact(&email, &phone)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        let code = generate_reset_code();
        let now = Utc::now();
        user.reset_code = Some(code.clone());
        user.reset_code_expires_at = Some(now + self.reset_code_ttl);
        user.reset_attempts = 0;
        user.updated_at = now;
        self.store.save_user(&user).await?;

        let notifier = self.notifier.clone();
        let (email, first_name) = (user.email, user.first_name);
        tokio::spawn(async move {
            if let Err(e) = notifier.send_reset_code(&email, &first_name, &code).await {
                tracing::error!("Failed to send reset code to {}: {:?}", email, e);
            }
        });
        Ok(())
    }

    /// A wrong or expired code is a 400 and leaves the password unchanged
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), ServiceError> {
        let email = normalize_email(&req.email)?;
        let phone = normalize_phone(&req.phone_number)?;
        validate_password(&req.new_password)?;

        let mut user = self
            .store
            .find_user_by_contact(&email, &phone)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))?;

        let now = Utc::now();
        let matched = self
            .store
            .verify_reset_code(user.id, req.code.trim(), now, MAX_RESET_ATTEMPTS)
            .await?;
        if !matched {
            tracing::warn!("Rejected reset code for user {}", user.id);
            return Err(ServiceError::validation("invalid or expired reset code"));
        }

        user.password_hash = hash_password(&req.new_password)?;
        user.clear_reset_code();
        user.updated_at = now;
        self.store.save_user(&user).await?;
        tracing::info!("Password reset for user {}", user.id);
        Ok(())
    }

    async fn load(&self, id: UserId) -> Result<User, ServiceError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("user not found"))
    }
}

pub fn require_admin(caller: &AuthUser) -> Result<(), ServiceError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden("admin access required"))
    }
}

/// Four digits, leading zeros kept
fn generate_reset_code() -> String {
    format!("{:04}", rand::thread_rng().gen_range(0..10_000))
}

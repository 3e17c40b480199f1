use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use super::password::{hash_password, verify_password, HashError};
use super::repo::UserRepository;
use super::repo_types::{Address, NewAddress, NewUser, Role, User};
use crate::clock::Clock;
use crate::config::SeedAdminConfig;
use crate::error::{AppError, RepoError};
use crate::mailer::Mailer;
use crate::state::AppState;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub const MIN_PASSWORD_LEN: usize = 8;

/// Counts characters, not bytes.
pub(crate) fn is_too_short(password: &str) -> bool {
    password.chars().count() < MIN_PASSWORD_LEN
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email address before logging in.")]
    EmailNotVerified,

    #[error("Invalid or expired verification link")]
    InvalidVerificationToken,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Repository(#[from] RepoError),

    #[error(transparent)]
    Password(#[from] HashError),

    #[error(transparent)]
    Signing(#[from] TokenError),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::EmailTaken => AppError::Conflict(e.to_string()),
            AuthError::InvalidCredentials
            | AuthError::InvalidRefreshToken
            | AuthError::UserNotFound => AppError::Unauthorized(e.to_string()),
            AuthError::EmailNotVerified => AppError::Forbidden(e.to_string()),
            AuthError::InvalidVerificationToken | AuthError::AlreadyVerified => {
                AppError::Validation(e.to_string())
            }
            AuthError::Repository(e) => AppError::Repository(e),
            AuthError::Password(e) => AppError::Internal(e.to_string()),
            AuthError::Signing(e) => AppError::Internal(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Signed token pair plus the user it was issued to.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    keys: JwtKeys,
    verification_ttl: Duration,
    public_base_url: String,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.mailer.clone(),
            state.clock.clone(),
            JwtKeys::from_ref(state),
            Duration::hours(state.config.verification_ttl_hours),
            state.config.public_base_url.clone(),
        )
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        keys: JwtKeys,
        verification_ttl: Duration,
        public_base_url: String,
    ) -> Self {
        Self {
            users,
            mailer,
            clock,
            keys,
            verification_ttl,
            public_base_url,
        }
    }

    fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/api/v1/auth/verify-email?token={}",
            self.public_base_url.trim_end_matches('/'),
            token
        )
    }

    fn issue_tokens(&self, user: User) -> Result<SessionTokens, AuthError> {
        let pair = self.keys.sign_pair(user.id, user.role)?;
        Ok(SessionTokens {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user,
        })
    }

    /// Sends the verification mail. A failure is logged and otherwise ignored;
    /// the user can ask for a new link.
    async fn send_verification(&self, user: &User) {
        let Some(token) = user.verification_token.as_deref() else {
            return;
        };
        let link = self.verification_link(token);
        if let Err(e) = self.mailer.send_verification_email(&user.email, &link).await {
            error!(user_id = %user.id, error = %e, "verification email failed");
        }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: Registration) -> Result<User, AuthError> {
        let email = normalize_email(&input.email);
        let full_name = input.full_name.trim().to_string();

        if full_name.is_empty() {
            return Err(AuthError::Validation("Full name is required".into()));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("Invalid email".into()));
        }
        if is_too_short(&input.password) {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::EmailTaken);
        }

        let now = self.clock.now();
        let new_user = NewUser {
            full_name,
            email,
            password_hash: hash_password(&input.password)?,
            phone: input
                .phone
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
            role: Role::User,
            email_verified: false,
            verification_token: Some(Uuid::new_v4().to_string()),
            verification_expires_at: Some(now + self.verification_ttl),
        };

        let user = match self.users.create(new_user).await {
            Ok(user) => user,
            Err(e) if e.is_unique_violation() => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.into()),
        };

        self.send_verification(&user).await;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, token))]
    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let Some(mut user) = self.users.find_by_verification_token(token).await? else {
            return Err(AuthError::InvalidVerificationToken);
        };
        let expired = user
            .verification_expires_at
            .map_or(true, |at| self.clock.now() > at);
        if expired {
            warn!(user_id = %user.id, "verification link expired");
            return Err(AuthError::InvalidVerificationToken);
        }

        user.email_verified = true;
        user.verification_token = None;
        user.verification_expires_at = None;
        self.users.update(&user).await?;

        info!(user_id = %user.id, "email verified");
        Ok(user)
    }

    /// Unknown addresses succeed silently so the endpoint does not reveal
    /// which emails are registered.
    #[instrument(skip(self))]
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let Some(mut user) = self.users.find_by_email(&normalize_email(email)).await? else {
            info!("verification resend for unknown email");
            return Ok(());
        };
        if user.email_verified {
            return Err(AuthError::AlreadyVerified);
        }

        user.verification_token = Some(Uuid::new_v4().to_string());
        user.verification_expires_at = Some(self.clock.now() + self.verification_ttl);
        self.users.update(&user).await?;
        self.send_verification(&user).await;
        Ok(())
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.email_verified {
            warn!(user_id = %user.id, "login before email verification");
            return Err(AuthError::EmailNotVerified);
        }

        info!(user_id = %user.id, "user logged in");
        self.issue_tokens(user)
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        let claims = self.keys.verify_refresh(refresh_token).map_err(|e| {
            warn!(error = %e, "refresh rejected");
            AuthError::InvalidRefreshToken
        })?;
        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        self.issue_tokens(user)
    }

    pub async fn me(&self, user_id: i64) -> Result<User, AuthError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, AuthError> {
        Ok(self.users.list_addresses(user_id).await?)
    }

    #[instrument(skip(self, address))]
    pub async fn add_address(
        &self,
        user_id: i64,
        address: NewAddress,
    ) -> Result<Address, AuthError> {
        let address = NewAddress {
            line1: address.line1.trim().to_string(),
            city: address.city.trim().to_string(),
            postal_code: address.postal_code.trim().to_string(),
            country: address.country.trim().to_string(),
        };
        if [&address.line1, &address.city, &address.postal_code, &address.country]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(AuthError::Validation("All address fields are required".into()));
        }
        self.me(user_id).await?;
        Ok(self.users.add_address(user_id, address).await?)
    }

    /// Creates the configured admin account unless that email is already
    /// taken. Returns whether a user was created.
    pub async fn ensure_seed_admin(&self, seed: &SeedAdminConfig) -> Result<bool, AuthError> {
        let email = normalize_email(&seed.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Ok(false);
        }
        let admin = self
            .users
            .create(NewUser {
                full_name: "Administrator".into(),
                email,
                password_hash: hash_password(&seed.password)?,
                phone: None,
                role: Role::Admin,
                email_verified: true,
                verification_token: None,
                verification_expires_at: None,
            })
            .await?;
        info!(user_id = %admin.id, "seed admin created");
        Ok(true)
    }
}

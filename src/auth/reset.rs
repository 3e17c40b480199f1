//! Forgot-password flow.
//!
//! A user moves `Idle -> OtpSent -> OtpVerified -> Idle`. The state lives on
//! the user row as a [`ResetSecret`] plus its expiry and the time the last
//! code was sent. Every operation is a single read-modify-write of that row;
//! concurrent calls for the same user race and the last writer wins.
//!
//! Expected failures (cooldown, wrong code, expiry...) are returned as
//! [`ResetRejection`] inside an `Ok`; only infrastructure failures use the
//! outer error.

use std::sync::Arc;

use axum::extract::FromRef;
use rand::Rng;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::password::hash_password;
use super::repo::UserRepository;
use super::repo_types::{ResetSecret, User};
use super::services::normalize_email;
use crate::clock::Clock;
use crate::config::OtpConfig;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetRejection {
    #[error("No account found with this email address.")]
    AccountNotFound,

    #[error("Please verify your email address before resetting your password.")]
    EmailNotVerified,

    #[error("Please wait {wait_seconds} seconds before requesting a new code.")]
    Cooldown { wait_seconds: i64 },

    #[error("Failed to send the verification code. Please try again.")]
    SendFailed,

    #[error("Invalid request.")]
    InvalidRequest,

    #[error("Invalid OTP.")]
    InvalidOtp,

    #[error("OTP has expired. Please request a new one.")]
    OtpExpired,

    #[error("Invalid or expired reset token.")]
    InvalidResetToken,

    #[error("Reset token has expired. Please restart the password reset process.")]
    ResetTokenExpired,

    #[error("Passwords do not match.")]
    PasswordMismatch,
}

impl ResetRejection {
    pub fn wait_time_seconds(&self) -> Option<i64> {
        match self {
            Self::Cooldown { wait_seconds } => Some(*wait_seconds),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpSent {
    pub masked_email: String,
}

#[derive(Debug, Clone)]
pub struct OtpVerified {
    pub reset_token: String,
}

pub type ResetOutcome<T> = Result<Result<T, ResetRejection>, AppError>;

pub struct PasswordResetService {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    policy: OtpConfig,
}

impl FromRef<AppState> for PasswordResetService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.mailer.clone(),
            state.clock.clone(),
            state.config.otp.clone(),
        )
    }
}

/// Six decimal digits, `100000..=999999`.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

fn is_expired(expires_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
    match expires_at {
        Some(at) => now > at,
        None => true,
    }
}

/// Whole seconds, rounded up so a client countdown never ends early.
fn ceil_seconds(d: Duration) -> i64 {
    let secs = d.whole_seconds();
    if d.subsec_nanoseconds() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// `jonathan@example.com` -> `jo******@example.com`. Local parts of one or two
/// characters reveal only the first one.
pub fn mask_email(email: &str) -> String {
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => (email, ""),
    };
    let len = local.chars().count();
    let reveal = if len > 2 { 2 } else { 1 };
    let mut masked: String = local.chars().take(reveal).collect();
    masked.extend(std::iter::repeat('*').take(len.saturating_sub(reveal)));
    if !domain.is_empty() {
        masked.push('@');
        masked.push_str(domain);
    }
    masked
}

impl PasswordResetService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        policy: OtpConfig,
    ) -> Self {
        Self {
            users,
            mailer,
            clock,
            policy,
        }
    }

    #[instrument(skip(self))]
    pub async fn request_reset(&self, email: &str) -> ResetOutcome<OtpSent> {
        let user = match self.eligible_user(email).await? {
            Ok(user) => user,
            Err(rejection) => return Ok(Err(rejection)),
        };
        self.issue_code(user).await
    }

    /// Same checks and side effects as [`Self::request_reset`].
    #[instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str) -> ResetOutcome<OtpSent> {
        let user = match self.eligible_user(email).await? {
            Ok(user) => user,
            Err(rejection) => return Ok(Err(rejection)),
        };
        info!(user_id = %user.id, "otp resend requested");
        self.issue_code(user).await
    }

    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> ResetOutcome<OtpVerified> {
        let Some(mut user) = self.users.find_by_email(&normalize_email(email)).await? else {
            return Ok(Err(ResetRejection::InvalidRequest));
        };

        match &user.reset_secret {
            ResetSecret::Code(code) if code == otp => {}
            _ => {
                warn!(user_id = %user.id, "otp mismatch");
                return Ok(Err(ResetRejection::InvalidOtp));
            }
        }

        let now = self.clock.now();
        if is_expired(user.reset_expires_at, now) {
            return Ok(Err(ResetRejection::OtpExpired));
        }

        let reset_token = Uuid::new_v4().to_string();
        user.reset_secret = ResetSecret::ResetToken(reset_token.clone());
        user.reset_expires_at = Some(now + Duration::minutes(self.policy.reset_token_ttl_minutes));
        self.users.update(&user).await?;

        info!(user_id = %user.id, "otp verified");
        Ok(Ok(OtpVerified { reset_token }))
    }

    #[instrument(skip(self, reset_token, new_password, confirm_password))]
    pub async fn reset_password(
        &self,
        email: &str,
        reset_token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> ResetOutcome<()> {
        if new_password != confirm_password {
            return Ok(Err(ResetRejection::PasswordMismatch));
        }

        let Some(mut user) = self.users.find_by_email(&normalize_email(email)).await? else {
            return Ok(Err(ResetRejection::InvalidRequest));
        };

        match &user.reset_secret {
            ResetSecret::ResetToken(token) if token == reset_token => {}
            _ => {
                warn!(user_id = %user.id, "reset token mismatch");
                return Ok(Err(ResetRejection::InvalidResetToken));
            }
        }

        if is_expired(user.reset_expires_at, self.clock.now()) {
            return Ok(Err(ResetRejection::ResetTokenExpired));
        }

        user.password_hash = hash_password(new_password)?;
        user.clear_reset_state();
        self.users.update(&user).await?;

        info!(user_id = %user.id, "password reset");
        Ok(Ok(()))
    }

    async fn eligible_user(&self, email: &str) -> Result<Result<User, ResetRejection>, AppError> {
        match self.users.find_by_email(&normalize_email(email)).await? {
            None => Ok(Err(ResetRejection::AccountNotFound)),
            Some(user) if !user.email_verified => {
                warn!(user_id = %user.id, "reset requested for unverified email");
                Ok(Err(ResetRejection::EmailNotVerified))
            }
            Some(user) => Ok(Ok(user)),
        }
    }

    /// Cooldown check, then persist a fresh code before handing it to the
    /// mailer. A failed send leaves the persisted code in place.
    async fn issue_code(&self, mut user: User) -> ResetOutcome<OtpSent> {
        let now = self.clock.now();
        let cooldown = Duration::seconds(self.policy.cooldown_seconds);

        if let Some(last_sent) = user.last_otp_sent_at {
            let elapsed = now - last_sent;
            if elapsed < cooldown {
                let wait_seconds = ceil_seconds(cooldown - elapsed);
                info!(user_id = %user.id, wait_seconds, "otp cooldown active");
                return Ok(Err(ResetRejection::Cooldown { wait_seconds }));
            }
        }

        let code = generate_code();
        user.reset_secret = ResetSecret::Code(code.clone());
        user.reset_expires_at = Some(now + Duration::minutes(self.policy.code_ttl_minutes));
        user.last_otp_sent_at = Some(now);
        self.users.update(&user).await?;

        if let Err(e) = self.mailer.send_otp_email(&user.email, &code).await {
            error!(user_id = %user.id, error = %e, "otp email failed; code stays active");
            return Ok(Err(ResetRejection::SendFailed));
        }

        info!(user_id = %user.id, "otp sent");
        Ok(Ok(OtpSent {
            masked_email: mask_email(&user.email),
        }))
    }
}

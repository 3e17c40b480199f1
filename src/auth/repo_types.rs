use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::error::RepoError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, RepoError> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(RepoError::Corrupt(format!("unknown role {other:?}"))),
        }
    }
}

/// The one live secret of the forgot-password flow.
///
/// A user is `Idle` with `None`, `OtpSent` while holding a `Code` and
/// `OtpVerified` while holding a `ResetToken`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResetSecret {
    #[default]
    None,
    Code(String),
    ResetToken(String),
}

impl ResetSecret {
    pub(crate) fn from_columns(
        value: Option<String>,
        kind: Option<String>,
    ) -> Result<Self, RepoError> {
        match (value, kind.as_deref()) {
            (None, _) => Ok(ResetSecret::None),
            (Some(v), Some("otp")) => Ok(ResetSecret::Code(v)),
            (Some(v), Some("reset_token")) => Ok(ResetSecret::ResetToken(v)),
            (Some(_), other) => Err(RepoError::Corrupt(format!(
                "reset secret with kind {other:?}"
            ))),
        }
    }

    pub(crate) fn to_columns(&self) -> (Option<&str>, Option<&'static str>) {
        match self {
            ResetSecret::None => (None, None),
            ResetSecret::Code(v) => (Some(v.as_str()), Some("otp")),
            ResetSecret::ResetToken(v) => (Some(v.as_str()), Some("reset_token")),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String, // Argon2 hash
    pub phone: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<OffsetDateTime>,
    pub reset_secret: ResetSecret,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub last_otp_sent_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Drops every trace of a pending password reset.
    pub fn clear_reset_state(&mut self) {
        self.reset_secret = ResetSecret::None;
        self.reset_expires_at = None;
        self.last_otp_sent_at = None;
    }
}

/// Raw `users` row; converted into [`User`] once the enum columns are checked.
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: i64,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<OffsetDateTime>,
    pub reset_secret: Option<String>,
    pub reset_secret_kind: Option<String>,
    pub reset_expires_at: Option<OffsetDateTime>,
    pub last_otp_sent_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = RepoError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            password_hash: r.password_hash,
            phone: r.phone,
            role: Role::parse(&r.role)?,
            email_verified: r.email_verified,
            verification_token: r.verification_token,
            verification_expires_at: r.verification_expires_at,
            reset_secret: ResetSecret::from_columns(r.reset_secret, r.reset_secret_kind)?,
            reset_expires_at: r.reset_expires_at,
            last_otp_sent_at: r.last_otp_sent_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    /// Single-line form stored on orders.
    pub fn one_line(&self) -> String {
        format!(
            "{}, {} {}, {}",
            self.line1, self.postal_code, self.city, self.country
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

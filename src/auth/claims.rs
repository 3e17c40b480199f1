use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::repo_types::Role;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT payload. `sub` is the numeric user id and `role` is the role the user
/// had when the token was issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn new(
        user_id: i64,
        role: Role,
        kind: TokenKind,
        issued_at: OffsetDateTime,
        ttl: Duration,
        issuer: &str,
        audience: &str,
    ) -> Self {
        Self {
            sub: user_id,
            role,
            kind,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + ttl).unix_timestamp(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn expiry_is_issue_time_plus_ttl() {
        let at = datetime!(2024-03-01 12:00:00 UTC);
        let c = Claims::new(5, Role::User, TokenKind::Access, at, Duration::minutes(15), "i", "a");
        assert_eq!(c.exp - c.iat, 15 * 60);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["kind"], "access");
        assert_eq!(json["role"], "user");
    }
}

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Timing rules of the forgot-password flow.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    pub cooldown_seconds: i64,
    pub code_ttl_minutes: i64,
    pub reset_token_ttl_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: 180,
            code_ttl_minutes: 10,
            reset_token_ttl_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// Admin account created at startup when it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedAdminConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub verification_ttl_hours: i64,
    pub public_base_url: String,
    pub smtp: Option<SmtpConfig>,
    pub seed_admin: Option<SeedAdminConfig>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "bookstore".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "bookstore-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let defaults = OtpConfig::default();
        let otp = OtpConfig {
            cooldown_seconds: env_or("OTP_COOLDOWN_SECONDS", defaults.cooldown_seconds),
            code_ttl_minutes: env_or("OTP_TTL_MINUTES", defaults.code_ttl_minutes),
            reset_token_ttl_minutes: env_or(
                "RESET_TOKEN_TTL_MINUTES",
                defaults.reset_token_ttl_minutes,
            ),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) if !host.trim().is_empty() => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_address: std::env::var("SMTP_FROM")
                    .unwrap_or_else(|_| "Bookstore <no-reply@bookstore.local>".into()),
            }),
            _ => None,
        };

        let seed_admin = match (
            std::env::var("SEED_ADMIN_EMAIL"),
            std::env::var("SEED_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some(SeedAdminConfig { email, password })
            }
            _ => None,
        };

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt,
            otp,
            verification_ttl_hours: env_or("EMAIL_VERIFICATION_TTL_HOURS", 24),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            smtp,
            seed_admin,
        })
    }
}

use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{Address, NewAddress, NewUser, User, UserRow};
use crate::error::RepoError;

const USER_COLUMNS: &str = r#"
    id, full_name, email, password_hash, phone, role, email_verified,
    verification_token, verification_expires_at,
    reset_secret, reset_secret_kind, reset_expires_at, last_otp_sent_at,
    created_at, updated_at
"#;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;
    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, RepoError>;
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
    /// Plain read-modify-write: last writer wins.
    async fn update(&self, user: &User) -> Result<(), RepoError>;
    async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, RepoError>;
    async fn add_address(&self, user_id: i64, address: NewAddress) -> Result<Address, RepoError>;

    /// Address used when shipping an order: the oldest one on file.
    async fn primary_address(&self, user_id: i64) -> Result<Option<Address>, RepoError> {
        Ok(self.list_addresses(user_id).await?.into_iter().next())
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        self.fetch_one_by("email", email).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_by_verification_token(&self, token: &str) -> Result<Option<User>, RepoError> {
        self.fetch_one_by("verification_token", token).await
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            r#"
            INSERT INTO users (full_name, email, password_hash, phone, role, email_verified,
                               verification_token, verification_expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.phone)
            .bind(user.role.as_str())
            .bind(user.email_verified)
            .bind(&user.verification_token)
            .bind(user.verification_expires_at)
            .fetch_one(&self.db)
            .await?;
        User::try_from(row)
    }

    async fn update(&self, user: &User) -> Result<(), RepoError> {
        let (secret, kind) = user.reset_secret.to_columns();
        sqlx::query(
            r#"
            UPDATE users
               SET full_name = $2,
                   password_hash = $3,
                   phone = $4,
                   role = $5,
                   email_verified = $6,
                   verification_token = $7,
                   verification_expires_at = $8,
                   reset_secret = $9,
                   reset_secret_kind = $10,
                   reset_expires_at = $11,
                   last_otp_sent_at = $12,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.password_hash)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.email_verified)
        .bind(&user.verification_token)
        .bind(user.verification_expires_at)
        .bind(secret)
        .bind(kind)
        .bind(user.reset_expires_at)
        .bind(user.last_otp_sent_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn list_addresses(&self, user_id: i64) -> Result<Vec<Address>, RepoError> {
        let rows = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, line1, city, postal_code, country
              FROM addresses
             WHERE user_id = $1
             ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn add_address(&self, user_id: i64, address: NewAddress) -> Result<Address, RepoError> {
        let row = sqlx::query_as::<_, Address>(
            r#"
            INSERT INTO addresses (user_id, line1, city, postal_code, country)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, line1, city, postal_code, country
            "#,
        )
        .bind(user_id)
        .bind(&address.line1)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.country)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn primary_address(&self, user_id: i64) -> Result<Option<Address>, RepoError> {
        let row = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, line1, city, postal_code, country
              FROM addresses
             WHERE user_id = $1
             ORDER BY id ASC
             LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }
}

//! Outgoing notifications: email verification links and password-reset codes.
//!
//! Delivery goes through SMTP when configured and through the log otherwise.

use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::{authentication::Credentials, Error as SmtpError},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("smtp error: {0}")]
    Smtp(#[from] SmtpError),

    #[error("failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), MailError>;
    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();
        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }

    async fn send_text(&self, to: &str, subject: &str, body: String) -> Result<(), MailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| MailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(email).await?;
        info!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp_email(&self, to: &str, code: &str) -> Result<(), MailError> {
        let body = format!(
            "Your password reset code is {code}.\n\nIt expires in a few minutes. \
             If you did not ask to reset your password you can ignore this email."
        );
        self.send_text(to, "Your password reset code", body).await
    }

    async fn send_verification_email(&self, to: &str, link: &str) -> Result<(), MailError> {
        let body = format!("Welcome to the bookstore!\n\nConfirm your email address: {link}");
        self.send_text(to, "Verify your email address", body).await
    }
}

/// Used when no SMTP relay is configured. Never prints the secret itself.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp_email(&self, to: &str, _code: &str) -> Result<(), MailError> {
        info!(to = %to, "smtp not configured; otp email dropped");
        Ok(())
    }

    async fn send_verification_email(&self, to: &str, _link: &str) -> Result<(), MailError> {
        info!(to = %to, "smtp not configured; verification email dropped");
        Ok(())
    }
}

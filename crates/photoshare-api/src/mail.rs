//! Outbound email
//!
//! The account lifecycle only ever sends one kind of mail, the email
//! confirmation link. Delivery goes through the [`Mailer`] trait so tests can
//! record messages instead of talking SMTP.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use photoshare_core::MailConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Trait for mail delivery backends
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one message
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;

    /// Whether messages actually leave the process
    fn is_enabled(&self) -> bool;
}

/// Confirmation mail carrying the link to `/api/auth/confirmed_email/{token}`
pub fn confirmation_mail(public_url: &str, to: &str, username: &str, token: &str) -> OutgoingMail {
    let link = format!(
        "{}/api/auth/confirmed_email/{token}",
        public_url.trim_end_matches('/')
    );

    let text = format!(
        "Hi {username},\n\n\
         Please confirm your email address for PhotoShare by opening the link below:\n\n\
         {link}\n\n\
         If you did not sign up, you can ignore this message.\n"
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: sans-serif; color: #222;">
  <p>Hi {username},</p>
  <p>Please confirm your email address for PhotoShare.</p>
  <p><a href="{link}" style="display: inline-block; padding: 10px 18px; background: #2563eb; color: #fff; text-decoration: none; border-radius: 4px;">Confirm email</a></p>
  <p style="font-size: 12px; color: #666;">If the button does not work, copy this link into your browser:<br>{link}</p>
</body>
</html>"#
    );

    OutgoingMail {
        to: to.to_string(),
        subject: "Confirm your email".to_string(),
        text,
        html,
    }
}

/// SMTP delivery through lettre
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, from_address: &str, mail: &OutgoingMail) -> Result<Message, MailError> {
        let from = format!("{} <{}>", self.config.from_name, from_address);
        let from: Mailbox = from.parse().map_err(|e: lettre::address::AddressError| {
            MailError::InvalidAddress {
                address: from_address.to_string(),
                message: e.to_string(),
            }
        })?;
        let to: Mailbox = mail.to.parse().map_err(|e: lettre::address::AddressError| {
            MailError::InvalidAddress {
                address: mail.to.clone(),
                message: e.to_string(),
            }
        })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html.clone()),
                    ),
            )
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let (Some(smtp_host), Some(from_address)) =
            (&self.config.smtp_host, &self.config.from_address)
        else {
            tracing::warn!(to = %mail.to, "Email not configured, skipping delivery");
            return Ok(());
        };

        let message = self.build_message(from_address, &mail)?;

        let transport = if self.config.smtp_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map_err(|e| MailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host)
        }
        .port(self.config.smtp_port);

        let transport = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            transport.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            transport
        };

        transport
            .build()
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::info!(to = %mail.to, subject = %mail.subject, "Email sent");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.config.is_configured()
    }
}

/// Mailer that keeps every message in memory
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<OutgoingMail>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// Token from the newest confirmation link sent to `to`
    pub fn last_token_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|mail| mail.to == to)
            .and_then(|mail| {
                let (_, token) = mail.text.split_once("/confirmed_email/")?;
                token.split_whitespace().next().map(str::to_string)
            })
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

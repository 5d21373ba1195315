//! SMTP delivery using lettre

use std::fmt;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::NotifyError;
use crate::traits::Notifier;

/// SMTP relay settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpSettings {
    /// Relay host name
    pub server: String,
    /// Relay port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user, if the relay requires authentication
    #[serde(default)]
    pub username: Option<String>,
    /// Login password
    #[serde(default)]
    pub password: Option<String>,
    /// From address
    pub sender: String,
    /// Default recipients
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Upgrade the connection with STARTTLS
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .field("starttls", &self.starttls)
            .finish()
    }
}

/// Notifier backed by an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
    server: String,
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("server", &self.server)
            .field("sender", &self.sender.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Build a notifier from relay settings
    ///
    /// # Errors
    /// Returns `NotifyError::InvalidAddress` for a malformed sender and
    /// `NotifyError::ConfigError` if the relay cannot be configured
    pub fn new(settings: &SmtpSettings) -> Result<Self, NotifyError> {
        let sender = parse_mailbox(&settings.sender)?;

        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server)
                .map_err(|e| NotifyError::ConfigError(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server)
        };

        let mut builder = builder.port(settings.port);
        if let (Some(user), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
            server: settings.server.clone(),
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse::<Mailbox>()
        .map_err(|e| NotifyError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

/// Assemble a plain-text message
///
/// # Errors
/// Returns `NotifyError::NoRecipients` for an empty list and
/// `NotifyError::InvalidAddress` for a malformed recipient
pub fn build_message(
    sender: &Mailbox,
    subject: &str,
    body: &str,
    recipients: &[String],
) -> Result<Message, NotifyError> {
    if recipients.is_empty() {
        return Err(NotifyError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(sender.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);
    for recipient in recipients {
        builder = builder.to(parse_mailbox(recipient)?);
    }

    builder
        .body(body.to_string())
        .map_err(|e| NotifyError::MessageBuild(e.to_string()))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, body), fields(server = %self.server))]
    async fn send(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<(), NotifyError> {
        let message = build_message(&self.sender, subject, body, recipients)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(recipients = recipients.len(), "notification sent");
        Ok(())
    }

    fn transport(&self) -> &'static str {
        "smtp"
    }
}

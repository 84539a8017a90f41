//! SMTP transport adapter: one authenticated delivery attempt per call,
//! transport failures wrapped into a single mail-failure error carrying the
//! original message text.
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::SmtpSettings;
use crate::mailer::OutgoingMessage;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unable to send mail: {0}")]
    Send(String),
}

/// The raw SMTP session underneath the adapter. Tests substitute a failing
/// or recording implementation.
#[async_trait]
pub trait SmtpRelay: Send + Sync {
    async fn deliver(&self, message: &OutgoingMessage, config: &SmtpSettings) -> Result<()>;
}

/// lettre-backed relay: login authentication, TLS per the ssl flag.
#[derive(Debug, Default)]
pub struct LettreRelay;

#[async_trait]
impl SmtpRelay for LettreRelay {
    async fn deliver(&self, message: &OutgoingMessage, config: &SmtpSettings) -> Result<()> {
        let mail = build_message(message)?;
        let mailer = build_transport(config)?;
        mailer
            .send(mail)
            .await
            .with_context(|| format!("smtp delivery via {}:{} failed", config.host, config.port))?;
        info!(host = %config.host, "smtp message delivered");
        Ok(())
    }
}

/// Wraps a relay and converts any underlying failure into `MailError::Send`
/// with the original error text. At most one delivery attempt per call.
pub struct SmtpTransport {
    relay: Arc<dyn SmtpRelay>,
}

impl SmtpTransport {
    pub fn new() -> Self {
        Self {
            relay: Arc::new(LettreRelay),
        }
    }

    pub fn with_relay(relay: Arc<dyn SmtpRelay>) -> Self {
        Self { relay }
    }

    pub async fn send_smtp_message(
        &self,
        message: &OutgoingMessage,
        config: &SmtpSettings,
    ) -> Result<(), MailError> {
        self.relay
            .deliver(message, config)
            .await
            .map_err(|e| MailError::Send(e.to_string()))
    }
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn build_message(message: &OutgoingMessage) -> Result<Message> {
    let from: Mailbox = message
        .from
        .parse()
        .with_context(|| format!("invalid from address '{}'", message.from))?;

    let mut builder = Message::builder().from(from).subject(message.subject.clone());

    for to in &message.to {
        let mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("invalid to address '{to}'"))?;
        builder = builder.to(mailbox);
    }
    if let Some(reply_to) = &message.reply_to {
        let mailbox: Mailbox = reply_to
            .parse()
            .with_context(|| format!("invalid reply-to address '{reply_to}'"))?;
        builder = builder.reply_to(mailbox);
    }
    // The Sender header drives the SMTP envelope sender (return path).
    if let Some(sender) = &message.sender {
        let mailbox: Mailbox = sender
            .parse()
            .with_context(|| format!("invalid envelope sender '{sender}'"))?;
        builder = builder.sender(mailbox);
    }

    builder
        .body(message.body.clone())
        .context("failed to build mail message")
}

fn build_transport(config: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let credentials = Credentials::new(config.username.clone(), config.password.clone());
    let builder = match config.ssl.as_str() {
        "ssl" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .with_context(|| format!("invalid smtp host '{}'", config.host))?,
        "tls" => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("invalid smtp host '{}'", config.host))?,
        _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str()),
    };
    Ok(builder.credentials(credentials).port(config.port).build())
}

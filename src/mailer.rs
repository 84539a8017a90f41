//! Outgoing-message routing: decide per message whether to relay through
//! Mailjet SMTP or fall through to the host's default mail path.
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, Sending};
use crate::smtp::{MailError, SmtpTransport};

/// Normalized outgoing mail message. Addresses are plain RFC 5321 strings;
/// `sender` is the SMTP envelope sender (return path), distinct from the
/// visible From header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub reply_to: Option<String>,
    pub sender: Option<String>,
    pub subject: String,
    pub body: String,
}

/// Envelope-sender policy resolved from host scope configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnPathPolicy {
    /// Leave the envelope sender alone.
    Unset,
    /// Copy the From address into the envelope sender.
    UseFrom,
    /// Use a fixed configured address.
    Specified(String),
}

impl ReturnPathPolicy {
    /// Map the host's integer flag: 1 = use From, 2 = configured address.
    /// A configured-address policy without an address degrades to `Unset`.
    pub fn from_settings(sending: &Sending) -> Self {
        match sending.set_return_path {
            2 if !sending.return_path_email.trim().is_empty() => {
                ReturnPathPolicy::Specified(sending.return_path_email.clone())
            }
            1 => ReturnPathPolicy::UseFrom,
            _ => ReturnPathPolicy::Unset,
        }
    }

    pub fn apply(&self, message: &mut OutgoingMessage) {
        match self {
            ReturnPathPolicy::Unset => {}
            ReturnPathPolicy::UseFrom => {
                if !message.from.is_empty() {
                    message.sender = Some(message.from.clone());
                }
            }
            ReturnPathPolicy::Specified(address) => {
                message.sender = Some(address.clone());
            }
        }
    }
}

/// The host application's own mail pipeline, invoked unchanged whenever the
/// Mailjet SMTP path is not active for the store.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailError>;
}

/// Stand-in for the host's default pipeline: logs the message and succeeds.
#[derive(Debug, Default)]
pub struct DefaultSender;

#[async_trait]
impl MailSender for DefaultSender {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailError> {
        info!(
            to = ?message.to,
            subject = %message.subject,
            "delivering via default mail path"
        );
        Ok(())
    }
}

/// Per-message routing between the Mailjet SMTP relay and the default path.
pub struct MailRouter {
    default: Arc<dyn MailSender>,
    smtp: SmtpTransport,
}

impl MailRouter {
    pub fn new(default: Arc<dyn MailSender>, smtp: SmtpTransport) -> Self {
        Self { default, smtp }
    }

    /// Route one message for a store. The SMTP path is taken only when both
    /// the module flag and the SMTP flag are set for that store; otherwise
    /// the default path runs unchanged.
    pub async fn send(
        &self,
        cfg: &Config,
        store_id: u32,
        message: &OutgoingMessage,
    ) -> Result<(), MailError> {
        match cfg.store(store_id) {
            Some(store) if store.active && store.smtp.active => {
                let mut routed = message.clone();
                ReturnPathPolicy::from_settings(&cfg.sending).apply(&mut routed);
                info!(store_id, "routing message through Mailjet SMTP");
                self.smtp.send_smtp_message(&routed, &store.smtp).await
            }
            _ => self.default.send(message).await,
        }
    }
}

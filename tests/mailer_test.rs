use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use mailjet_sync::config::{self, Config, SmtpSettings};
use mailjet_sync::mailer::{MailRouter, MailSender, OutgoingMessage};
use mailjet_sync::smtp::{MailError, SmtpRelay, SmtpTransport};

#[derive(Default)]
struct CountingSender {
    sent: Arc<Mutex<Vec<OutgoingMessage>>>,
}

#[async_trait]
impl MailSender for CountingSender {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingRelay {
    delivered: Arc<Mutex<Vec<(OutgoingMessage, SmtpSettings)>>>,
    fail_with: Option<String>,
}

#[async_trait]
impl SmtpRelay for RecordingRelay {
    async fn deliver(&self, message: &OutgoingMessage, config: &SmtpSettings) -> Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((message.clone(), config.clone()));
        match &self.fail_with {
            Some(text) => Err(anyhow!("{text}")),
            None => Ok(()),
        }
    }
}

fn base_config() -> Config {
    serde_yaml::from_str(config::example()).unwrap()
}

fn message() -> OutgoingMessage {
    OutgoingMessage {
        from: "shop@example.com".into(),
        to: vec!["customer@example.com".into()],
        reply_to: None,
        sender: None,
        subject: "Your order".into(),
        body: "Thanks.".into(),
    }
}

#[tokio::test]
async fn inactive_smtp_falls_through_to_default_path() {
    let mut cfg = base_config();
    cfg.stores[0].smtp.active = false;

    let default = Arc::new(CountingSender::default());
    let relay = Arc::new(RecordingRelay::default());
    let router = MailRouter::new(
        Arc::clone(&default) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    router.send(&cfg, 1, &message()).await.unwrap();

    assert_eq!(default.sent.lock().unwrap().len(), 1);
    assert!(relay.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn inactive_module_falls_through_even_with_smtp_enabled() {
    let mut cfg = base_config();
    cfg.stores[0].active = false;

    let default = Arc::new(CountingSender::default());
    let relay = Arc::new(RecordingRelay::default());
    let router = MailRouter::new(
        Arc::clone(&default) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    router.send(&cfg, 1, &message()).await.unwrap();

    assert_eq!(default.sent.lock().unwrap().len(), 1);
    assert!(relay.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn active_smtp_routes_through_relay_with_store_settings() {
    let cfg = base_config();

    let default = Arc::new(CountingSender::default());
    let relay = Arc::new(RecordingRelay::default());
    let router = MailRouter::new(
        Arc::clone(&default) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    router.send(&cfg, 1, &message()).await.unwrap();

    assert!(default.sent.lock().unwrap().is_empty());
    let delivered = relay.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let (_, settings) = &delivered[0];
    assert_eq!(settings.host, "in-v3.mailjet.com");
    assert_eq!(settings.port, 587);
    assert_eq!(settings.ssl, "tls");
}

#[tokio::test]
async fn return_path_policy_adjusts_envelope_sender() {
    let mut cfg = base_config();
    cfg.sending.set_return_path = 2;
    cfg.sending.return_path_email = "bounces@example.com".into();

    let relay = Arc::new(RecordingRelay::default());
    let router = MailRouter::new(
        Arc::new(CountingSender::default()) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    router.send(&cfg, 1, &message()).await.unwrap();

    let delivered = relay.delivered.lock().unwrap();
    assert_eq!(delivered[0].0.sender.as_deref(), Some("bounces@example.com"));

    drop(delivered);
    relay.delivered.lock().unwrap().clear();
    cfg.sending.set_return_path = 1;
    router.send(&cfg, 1, &message()).await.unwrap();
    let delivered = relay.delivered.lock().unwrap();
    assert_eq!(delivered[0].0.sender.as_deref(), Some("shop@example.com"));
}

#[tokio::test]
async fn relay_failure_surfaces_as_mail_error_with_original_text() {
    let cfg = base_config();
    let relay = Arc::new(RecordingRelay {
        delivered: Arc::new(Mutex::new(Vec::new())),
        fail_with: Some("550 mailbox unavailable".into()),
    });
    let router = MailRouter::new(
        Arc::new(CountingSender::default()) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    let err = router.send(&cfg, 1, &message()).await.unwrap_err();
    let MailError::Send(text) = err;
    assert_eq!(text, "550 mailbox unavailable");
}

#[tokio::test]
async fn unknown_store_uses_default_path() {
    let cfg = base_config();
    let default = Arc::new(CountingSender::default());
    let relay = Arc::new(RecordingRelay::default());
    let router = MailRouter::new(
        Arc::clone(&default) as Arc<dyn MailSender>,
        SmtpTransport::with_relay(Arc::clone(&relay) as Arc<dyn SmtpRelay>),
    );

    router.send(&cfg, 77, &message()).await.unwrap();
    assert_eq!(default.sent.lock().unwrap().len(), 1);
    assert!(relay.delivered.lock().unwrap().is_empty());
}

//! Keeps a merchant host application's per-store settings in sync with a
//! Mailjet account (webhooks, contact properties, segments, templates) and
//! relays outgoing transactional mail through Mailjet SMTP when enabled.
pub mod catalog;
pub mod config;
pub mod connection;
pub mod mailer;
pub mod mailjet;
pub mod reconcile;
pub mod smtp;
pub mod sync;

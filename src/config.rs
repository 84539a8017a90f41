//! Configuration loader and validator for the Mailjet sync tool.
//!
//! The YAML file stands in for the host application's configuration store:
//! per-store credentials and flags are read from it, and template remote ids
//! are written back to it (store scope and default scope).
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub account: Account,
    #[serde(default)]
    pub sending: Sending,
    pub stores: Vec<StoreSettings>,
    /// Default-scope values shared by all stores (template remote ids).
    #[serde(default)]
    pub defaults: Defaults,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub templates_dir: String,
    pub callback_base_url: String,
}

/// Global fallback API credentials, used when a store carries none of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Envelope-sender policy for outgoing mail, host scope.
///
/// `set_return_path`: 0 = leave unset, 1 = copy the From address,
/// 2 = use `return_path_email`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sending {
    #[serde(default)]
    pub set_return_path: u8,
    #[serde(default)]
    pub return_path_email: String,
}

/// Per-store settings read from the host configuration store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreSettings {
    pub store_id: u32,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub ecommerce_data: bool,
    /// Event name -> enabled flag; absent events count as disabled.
    #[serde(default)]
    pub events: BTreeMap<String, bool>,
    #[serde(default)]
    pub smtp: SmtpSettings,
    /// Template key -> remote template id, store scope.
    #[serde(default)]
    pub templates: BTreeMap<String, u64>,
}

/// SMTP relay settings for one store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmtpSettings {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// "ssl", "tls" or "" (plaintext).
    #[serde(default)]
    pub ssl: String,
}

/// Default-scope storage (store id 0 in the host's terms).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    #[serde(default)]
    pub templates: BTreeMap<String, u64>,
}

impl StoreSettings {
    /// Enabled flag for one webhook event; unknown events are disabled.
    pub fn event_enabled(&self, event: &str) -> bool {
        self.events.get(event).copied().unwrap_or(false)
    }

    /// Stored remote template id for `key`, if any.
    pub fn template_id(&self, key: &str) -> Option<u64> {
        self.templates.get(key).copied()
    }
}

impl Config {
    /// Settings for one store, if configured.
    pub fn store(&self, store_id: u32) -> Option<&StoreSettings> {
        self.stores.iter().find(|s| s.store_id == store_id)
    }

    /// All stores, deduplicated by credential pair (one reconciliation pass
    /// per remote account is enough).
    pub fn unique_event_stores(&self) -> Vec<&StoreSettings> {
        dedup_by_credentials(self.stores.iter())
    }

    /// Ecommerce-enabled stores, deduplicated by credential pair.
    pub fn unique_ecommerce_stores(&self) -> Vec<&StoreSettings> {
        dedup_by_credentials(self.stores.iter().filter(|s| s.ecommerce_data))
    }

    /// Canonical webhook callback URL for one event type.
    pub fn callback_url(&self, event: &str) -> String {
        format!(
            "{}/mailjet/event/{}",
            self.app.callback_base_url.trim_end_matches('/'),
            event
        )
    }

    /// Record a remote template id under the store scope and the default
    /// scope (the host keeps both so new stores inherit the id).
    pub fn set_template_id(&mut self, store_id: u32, key: &str, id: u64) {
        if let Some(store) = self.stores.iter_mut().find(|s| s.store_id == store_id) {
            store.templates.insert(key.to_string(), id);
        }
        self.defaults.templates.insert(key.to_string(), id);
    }

    /// Write the configuration back to disk atomically (temp file + rename).
    pub fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn dedup_by_credentials<'a>(
    stores: impl Iterator<Item = &'a StoreSettings>,
) -> Vec<&'a StoreSettings> {
    let mut seen: Vec<(&str, &str)> = Vec::new();
    let mut out = Vec::new();
    for store in stores {
        let pair = (store.api_key.as_str(), store.secret_key.as_str());
        if !seen.contains(&pair) {
            seen.push(pair);
            out.push(store);
        }
    }
    out
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.templates_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.templates_dir must be non-empty"));
    }
    if cfg.app.callback_base_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.callback_base_url must be non-empty",
        ));
    }

    if cfg.sending.set_return_path > 2 {
        return Err(ConfigError::Invalid(
            "sending.set_return_path must be 0, 1 or 2",
        ));
    }

    let mut seen_ids = Vec::new();
    for store in &cfg.stores {
        if seen_ids.contains(&store.store_id) {
            return Err(ConfigError::Invalid("stores: duplicate store_id"));
        }
        seen_ids.push(store.store_id);

        if store.smtp.active {
            if store.smtp.host.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "stores: smtp.host must be non-empty when smtp.active",
                ));
            }
            if store.smtp.port == 0 {
                return Err(ConfigError::Invalid(
                    "stores: smtp.port must be > 0 when smtp.active",
                ));
            }
        }
    }

    Ok(())
}

/// Example YAML used by tests and `print-example`.
pub fn example() -> &'static str {
    r#"app:
  templates_dir: "./templates"
  callback_base_url: "https://shop.example.com"

account:
  api_key: "GLOBAL_API_KEY"
  secret_key: "GLOBAL_SECRET_KEY"

sending:
  set_return_path: 0
  return_path_email: ""

stores:
  - store_id: 1
    active: true
    api_key: "STORE_API_KEY"
    secret_key: "STORE_SECRET_KEY"
    ecommerce_data: true
    events:
      open: true
      click: true
      bounce: true
      spam: true
      blocked: true
      unsub: true
      sent: false
    smtp:
      active: true
      host: "in-v3.mailjet.com"
      port: 587
      username: "STORE_API_KEY"
      password: "STORE_SECRET_KEY"
      ssl: "tls"
    templates: {}

defaults:
  templates: {}
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.stores.len(), 1);
        assert!(cfg.stores[0].event_enabled("open"));
        assert!(!cfg.stores[0].event_enabled("sent"));
        assert!(!cfg.stores[0].event_enabled("no-such-event"));
    }

    #[test]
    fn invalid_callback_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.callback_base_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("callback_base_url")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_smtp_settings() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.stores[0].smtp.host = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.stores[0].smtp.port = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        // inactive smtp does not need host/port
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.stores[0].smtp = SmtpSettings::default();
        validate(&cfg).unwrap();
    }

    #[test]
    fn duplicate_store_ids_rejected() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        let dup = cfg.stores[0].clone();
        cfg.stores.push(dup);
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("duplicate")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn callback_url_joins_cleanly() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.callback_base_url = "https://shop.example.com/".into();
        assert_eq!(
            cfg.callback_url("open"),
            "https://shop.example.com/mailjet/event/open"
        );
    }

    #[test]
    fn unique_stores_dedup_by_credentials() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        let mut second = cfg.stores[0].clone();
        second.store_id = 2;
        let mut third = cfg.stores[0].clone();
        third.store_id = 3;
        third.api_key = "OTHER_KEY".into();
        third.ecommerce_data = false;
        cfg.stores.push(second);
        cfg.stores.push(third);

        let event_stores = cfg.unique_event_stores();
        assert_eq!(
            event_stores.iter().map(|s| s.store_id).collect::<Vec<_>>(),
            vec![1, 3]
        );

        let ecommerce = cfg.unique_ecommerce_stores();
        assert_eq!(
            ecommerce.iter().map(|s| s.store_id).collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn set_template_id_writes_both_scopes() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.set_template_id(1, "order_confirmation", 424242);
        assert_eq!(
            cfg.stores[0].template_id("order_confirmation"),
            Some(424242)
        );
        assert_eq!(
            cfg.defaults.templates.get("order_confirmation").copied(),
            Some(424242)
        );
    }

    #[test]
    fn persist_and_reload_round_trip() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.set_template_id(1, "order_confirmation", 7);
        cfg.persist(&p).unwrap();
        let reloaded = load(Some(&p)).unwrap();
        assert_eq!(reloaded, cfg);
    }
}

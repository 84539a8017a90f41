//! Credential resolution and the per-credential client cache.
//!
//! One `MailjetClient` per distinct (api key, secret) pair, cached in an
//! explicit pool object scoped to the invocation; there is no global state
//! and no eviction.
use reqwest::Url;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Config, StoreSettings};
use crate::mailjet::{MailjetClient, MailjetService};

/// Hands out a remote service handle for a store. The reconciliation
/// service only depends on this seam, so tests can substitute a recording
/// implementation.
pub trait Connect {
    fn connect(&mut self, cfg: &Config, store: &StoreSettings) -> Arc<dyn MailjetService>;
}

/// Invocation-scoped cache of API clients keyed by credential fingerprint.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    base_url: Option<Url>,
    connections: HashMap<[u8; 32], Arc<MailjetClient>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point every client at a non-default API endpoint (tests).
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url: Some(base_url),
            connections: HashMap::new(),
        }
    }

    /// Client for an explicit credential pair. Cache hits return the same
    /// instance.
    pub fn connection_for(&mut self, api_key: &str, secret_key: &str) -> Arc<MailjetClient> {
        let key = fingerprint(api_key, secret_key);
        if let Some(existing) = self.connections.get(&key) {
            return Arc::clone(existing);
        }
        let client = match &self.base_url {
            Some(url) => {
                MailjetClient::with_base_url(api_key.into(), secret_key.into(), url.clone())
            }
            None => MailjetClient::new(api_key.into(), secret_key.into()),
        };
        let client = Arc::new(client);
        self.connections.insert(key, Arc::clone(&client));
        client
    }

    /// Client for a store, resolving credentials from the store's own pair
    /// or the global account fallback.
    pub fn connection(&mut self, cfg: &Config, store: &StoreSettings) -> Arc<MailjetClient> {
        let (api_key, secret_key) = resolve_credentials(cfg, store);
        self.connection_for(&api_key, &secret_key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.connections.len()
    }
}

impl Connect for ConnectionPool {
    fn connect(&mut self, cfg: &Config, store: &StoreSettings) -> Arc<dyn MailjetService> {
        self.connection(cfg, store)
    }
}

/// Store pair when complete, else the global account pair, else empty
/// credentials. Empty credentials produce a client that fails every remote
/// call — not an error at this layer.
pub fn resolve_credentials(cfg: &Config, store: &StoreSettings) -> (String, String) {
    let (api_key, secret_key) = if !store.api_key.is_empty() && !store.secret_key.is_empty() {
        (store.api_key.clone(), store.secret_key.clone())
    } else {
        (cfg.account.api_key.clone(), cfg.account.secret_key.clone())
    };

    if api_key.is_empty() || secret_key.is_empty() {
        (String::new(), String::new())
    } else {
        (api_key, secret_key)
    }
}

fn fingerprint(api_key: &str, secret_key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hasher.update(secret_key.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;

    fn sample_config() -> Config {
        serde_yaml::from_str(config::example()).unwrap()
    }

    #[test]
    fn same_pair_returns_same_instance() {
        let mut pool = ConnectionPool::new();
        let a = pool.connection_for("key", "secret");
        let b = pool.connection_for("key", "secret");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);

        let c = pool.connection_for("key", "other");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn store_pair_wins_over_account_fallback() {
        let cfg = sample_config();
        let (key, secret) = resolve_credentials(&cfg, &cfg.stores[0]);
        assert_eq!(key, "STORE_API_KEY");
        assert_eq!(secret, "STORE_SECRET_KEY");
    }

    #[test]
    fn incomplete_store_pair_falls_back_to_account() {
        let mut cfg = sample_config();
        cfg.stores[0].secret_key = String::new();
        let (key, secret) = resolve_credentials(&cfg, &cfg.stores[0]);
        assert_eq!(key, "GLOBAL_API_KEY");
        assert_eq!(secret, "GLOBAL_SECRET_KEY");
    }

    #[test]
    fn unresolvable_pair_degrades_to_empty() {
        let mut cfg = sample_config();
        cfg.stores[0].api_key = String::new();
        cfg.stores[0].secret_key = String::new();
        cfg.account.secret_key = String::new();
        let (key, secret) = resolve_credentials(&cfg, &cfg.stores[0]);
        assert_eq!(key, "");
        assert_eq!(secret, "");
    }
}

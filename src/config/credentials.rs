//! API credential collaborator.
//!
//! [`CredentialProvider`] exposes the current API key and a change
//! notification.  An empty string means "no key configured".
//!
//! [`SharedCredentials`] is the in-process implementation, backed by a
//! `tokio::sync::watch` channel so any number of subscribers see updates.

use tokio::sync::watch;

use super::ApiConfig;

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Source of the bearer token sent to the speech API.
pub trait CredentialProvider: Send + Sync {
    /// Current API key; empty when absent.
    fn api_key(&self) -> String;

    /// Receiver that is notified whenever the key changes.
    fn subscribe(&self) -> watch::Receiver<String>;

    fn has_api_key(&self) -> bool {
        !self.api_key().trim().is_empty()
    }
}

/// Thread-safe, observable API key holder.
#[derive(Debug)]
pub struct SharedCredentials {
    tx: watch::Sender<String>,
}

impl SharedCredentials {
    pub fn new(api_key: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(api_key.into());
        Self { tx }
    }

    /// Resolve the key from `OPENAI_API_KEY`, then the stored config value.
    pub fn from_config(api: &ApiConfig) -> Self {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| api.api_key.clone())
            .unwrap_or_default();
        Self::new(key)
    }

    /// Replace the key and notify subscribers (only when it actually changed).
    pub fn set_api_key(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        self.tx.send_if_modified(|current| {
            if *current == api_key {
                false
            } else {
                *current = api_key;
                true
            }
        });
    }

    pub fn clear(&self) {
        self.set_api_key(String::new());
    }
}

impl CredentialProvider for SharedCredentials {
    fn api_key(&self) -> String {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

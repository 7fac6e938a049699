use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::constants::{CREDENTIAL_ENV_PREFIX, KISMET_PASSWORD_KEY, KISMET_USERNAME_KEY};

/// Source of secrets for the bridge. Implementations may be backed by an OS keychain;
/// the bridge only needs this capability.
pub trait CredentialProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> bool;

    fn delete(&self, key: &str) -> bool;

    /// Username and password for the source API, only when both are present.
    fn kismet_credentials(&self) -> Option<(String, String)> {
        let username = self.get(KISMET_USERNAME_KEY)?;
        let password = self.get(KISMET_PASSWORD_KEY)?;
        Some((username, password))
    }
}

/// Environment variable name a credential key is read from.
pub fn env_var_name(key: &str) -> String {
    format!("{}{}", CREDENTIAL_ENV_PREFIX, key.to_uppercase())
}

/// Process-scoped store: values set at runtime take precedence, reads fall back to
/// `KISMET_BRIDGE_<KEY>` environment variables. Nothing is written to disk.
#[derive(Debug, Default)]
pub struct EnvCredentialStore {
    overlay: Mutex<HashMap<String, String>>,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialProvider for EnvCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        if key.is_empty() {
            return None;
        }
        if let Ok(overlay) = self.overlay.lock() {
            if let Some(value) = overlay.get(key) {
                debug!(key, "Credential retrieved from process store");
                return Some(value.clone());
            }
        }
        match std::env::var(env_var_name(key)) {
            Ok(value) if !value.is_empty() => {
                debug!(key, "Credential retrieved from environment");
                Some(value)
            }
            _ => {
                warn!(key, "Credential not found");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if key.is_empty() || value.is_empty() {
            error!("Cannot store empty credential");
            return false;
        }
        match self.overlay.lock() {
            Ok(mut overlay) => {
                overlay.insert(key.to_string(), value.to_string());
                info!(key, "Credential stored for this process; export {} to persist it", env_var_name(key));
                true
            }
            Err(e) => {
                error!("Failed to store credential: {}", e);
                false
            }
        }
    }

    fn delete(&self, key: &str) -> bool {
        match self.overlay.lock() {
            Ok(mut overlay) => {
                let removed = overlay.remove(key).is_some();
                if removed {
                    info!(key, "Credential deleted");
                } else {
                    warn!(key, "Credential not in process store, nothing deleted");
                }
                removed
            }
            Err(e) => {
                error!("Failed to delete credential: {}", e);
                false
            }
        }
    }
}

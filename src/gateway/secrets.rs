//! Secret lookup for endpoints and credentials.

use std::collections::HashMap;

use crate::gateway::GatewayError;

/// Named-secret lookup.  A secret that is set but blank counts as missing.
pub trait SecretStore: Send + Sync {
    fn get_secret(&self, name: &str) -> Result<String, GatewayError>;
}

/// Reads secrets from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, name: &str) -> Result<String, GatewayError> {
        std::env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| GatewayError::SecretMissing(name.to_string()))
    }
}

/// Fixed in-memory secrets.
#[derive(Debug, Clone, Default)]
pub struct MapSecretStore {
    secrets: HashMap<String, String>,
}

impl MapSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretStore for MapSecretStore {
    fn get_secret(&self, name: &str) -> Result<String, GatewayError> {
        self.secrets
            .get(name)
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .ok_or_else(|| GatewayError::SecretMissing(name.to_string()))
    }
}

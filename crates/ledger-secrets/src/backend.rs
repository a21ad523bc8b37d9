use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// The JSON shape stored at `bootstrap_secret_ref` in the backing secret
/// manager: the active key id/token, and optionally the previous pair kept
/// around for a rotation grace window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub kid: String,
    pub token: String,
    #[serde(default)]
    pub prev_kid: Option<String>,
    #[serde(default)]
    pub prev_token: Option<String>,
}

/// The pluggable interface onto whatever secret manager actually holds
/// `bootstrap_secret_ref → SecretRecord`. The concrete backend (AWS
/// Secrets Manager, Vault, a config file) is deployment-specific and out of
/// scope; this crate ships only an in-memory reference implementation for
/// tests and standalone operation.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn fetch(&self, bootstrap_secret_ref: &str) -> Result<Option<SecretRecord>, String>;
}

/// A `SecretBackend` backed by an in-process map, seeded up front. Useful
/// for tests and for deployments that provision secrets via config rather
/// than a remote manager.
#[derive(Default)]
pub struct InMemorySecretBackend {
    records: RwLock<HashMap<String, SecretRecord>>,
}

impl InMemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, bootstrap_secret_ref: impl Into<String>, record: SecretRecord) {
        self.records
            .write()
            .expect("secret backend lock poisoned")
            .insert(bootstrap_secret_ref.into(), record);
    }
}

#[async_trait]
impl SecretBackend for InMemorySecretBackend {
    async fn fetch(&self, bootstrap_secret_ref: &str) -> Result<Option<SecretRecord>, String> {
        Ok(self
            .records
            .read()
            .expect("secret backend lock poisoned")
            .get(bootstrap_secret_ref)
            .cloned())
    }
}

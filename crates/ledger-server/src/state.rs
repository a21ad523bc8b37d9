//! Shared application state threaded through every axum handler.

use ledger_common::LedgerConfig;
use ledger_registry::{HeartbeatService, ReadPaths, RegistrationService};
use ledger_secrets::{InMemorySecretBackend, SecretStore};
use ledger_store::{Database, NonceStore, ServiceRepository};
use std::sync::Arc;

/// Everything a handler needs, cloned cheaply behind `Arc`s.
///
/// The secret backend is the in-memory reference implementation: this
/// service ships without a concrete integration for a remote secret
/// manager (AWS Secrets Manager, Vault), matching the upstream design's own
/// pluggable `SecretBackend` seam. A real deployment supplies its own
/// `SecretBackend` and swaps it in here.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<LedgerConfig>,
    pub repository: Arc<ServiceRepository>,
    pub secrets: Arc<SecretStore<InMemorySecretBackend>>,
    pub nonces: Arc<NonceStore>,
    pub registration: Arc<RegistrationService>,
    pub heartbeat: Arc<HeartbeatService<InMemorySecretBackend>>,
    pub reads: Arc<ReadPaths>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: LedgerConfig, db: Database, secrets_backend: InMemorySecretBackend) -> Self {
        let repository = Arc::new(ServiceRepository::new(db.clone()));
        let secrets = Arc::new(SecretStore::new(secrets_backend));
        let nonces = Arc::new(NonceStore::new(db));

        let registration = Arc::new(RegistrationService::new(
            nonces.clone(),
            repository.clone(),
            config.bootstrap_ts_window_secs as i64,
        ));
        let heartbeat = Arc::new(HeartbeatService::new(
            secrets.clone(),
            nonces.clone(),
            repository.clone(),
            config.instance_ts_window_secs as i64,
            config.default_ttl_s as i64,
        ));
        let reads = Arc::new(ReadPaths::new(repository.clone()));

        Self {
            config: Arc::new(config),
            repository,
            secrets,
            nonces,
            registration,
            heartbeat,
            reads,
            http: reqwest::Client::new(),
        }
    }

    pub fn debug(&self) -> bool {
        self.config.debug
    }
}

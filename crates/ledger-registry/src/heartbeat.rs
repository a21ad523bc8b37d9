use ledger_auth::verify_instance;
use ledger_common::{AuthError, BaseError, Result};
use ledger_core::{Clock, SystemClock};
use ledger_secrets::{SecretBackend, SecretStore};
use ledger_store::{NonceStore, ServiceInstance, ServiceRepository};
use std::sync::Arc;

/// A heartbeat call from an already-registered instance, verified the same
/// way any other instance-signed request is: current or previous key by
/// `kid`, anti-replay nonce, timestamp window.
pub struct HeartbeatRequest {
    pub instance_id: String,
    pub path_with_query: String,
    pub ts: Option<String>,
    pub nonce: Option<String>,
    pub kid: Option<String>,
    pub signature: Option<String>,
    pub raw_body: Vec<u8>,
}

pub struct HeartbeatService<B: SecretBackend> {
    secrets: Arc<SecretStore<B>>,
    nonces: Arc<NonceStore>,
    repository: Arc<ServiceRepository>,
    clock: Arc<dyn Clock>,
    instance_ts_window_secs: i64,
    default_secret_ttl_s: i64,
}

impl<B: SecretBackend> HeartbeatService<B> {
    pub fn new(
        secrets: Arc<SecretStore<B>>,
        nonces: Arc<NonceStore>,
        repository: Arc<ServiceRepository>,
        instance_ts_window_secs: i64,
        default_secret_ttl_s: i64,
    ) -> Self {
        Self {
            secrets,
            nonces,
            repository,
            clock: Arc::new(SystemClock),
            instance_ts_window_secs,
            default_secret_ttl_s,
        }
    }

    pub async fn heartbeat(&self, req: HeartbeatRequest) -> Result<ServiceInstance> {
        self.verify("POST", &req).await?;
        self.repository.record_heartbeat(&req.instance_id).await
    }

    /// Verifies an instance-signed request without recording a heartbeat,
    /// for read endpoints (e.g. the snapshot pull route) that want the same
    /// authentication without the side effect.
    pub async fn verify_only(&self, req: HeartbeatRequest) -> Result<()> {
        self.verify("GET", &req).await
    }

    async fn verify(&self, method: &str, req: &HeartbeatRequest) -> Result<()> {
        let instance = self
            .repository
            .get_instance(&req.instance_id)
            .await?
            .ok_or(AuthError::InstanceNotFound)
            .map_err(BaseError::Auth)?;

        let service = self
            .repository
            .list_services()
            .await?
            .into_iter()
            .find(|s| s.service_id == instance.service_id)
            .ok_or(AuthError::InstanceNotFound)
            .map_err(BaseError::Auth)?;

        verify_instance(
            self.clock.as_ref(),
            self.secrets.as_ref(),
            self.nonces.as_ref(),
            self.instance_ts_window_secs,
            &service.bootstrap_secret_ref,
            self.default_secret_ttl_s,
            &req.instance_id,
            method,
            &req.path_with_query,
            req.ts.as_deref(),
            req.nonce.as_deref(),
            req.kid.as_deref(),
            req.signature.as_deref(),
            &req.raw_body,
        )
        .await
        .map_err(BaseError::Auth)
    }

    /// Sweeps every instance for lapsed heartbeats, flipping `UP -> DOWN`
    /// after three consecutive misses. Intended to run on a fixed interval
    /// from the server's background task set.
    pub async fn sweep(&self) -> Result<usize> {
        self.repository.sweep_missed_heartbeats().await
    }
}

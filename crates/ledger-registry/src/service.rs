use ledger_auth::verify_bootstrap;
use ledger_common::{AuthError, BaseError, Result};
use ledger_core::{Clock, SystemClock};
use ledger_store::{NonceStore, RegisterInput, RegisterOutcome, ServiceRepository};
use std::sync::Arc;

/// The inbound registration request as received over the wire, already
/// decoded but not yet verified.
pub struct BootstrapRequest {
    pub service_name: String,
    pub bootstrap_secret_ref: String,
    /// Raw bearer token from the caller's `Authorization: Bearer <token>`
    /// header — the pre-shared service token bootstrap verification is
    /// keyed on. Not to be confused with `bootstrap_secret_ref`, which is
    /// only stored on the service for later per-instance key derivation.
    pub token: Option<String>,
    pub node_id: Option<String>,
    pub task_slot: Option<i64>,
    pub boot_id: Option<String>,
    pub base_url: String,
    pub health_url: Option<String>,
    pub heartbeat_interval_sec: Option<i64>,
    pub meta: Option<serde_json::Value>,
    pub ts: Option<String>,
    pub nonce: Option<String>,
    pub signature: Option<String>,
    pub raw_body: Vec<u8>,
}

/// The response shape handed back to the caller on a successful
/// registration: enough for the instance to start heartbeating and
/// verifying inbound pushes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RegisterResponse {
    pub service_id: String,
    pub instance_id: String,
    pub push_kid: String,
    pub lease_ttl_sec: i64,
    pub registry_version: i64,
}

impl From<RegisterOutcome> for RegisterResponse {
    fn from(outcome: RegisterOutcome) -> Self {
        Self {
            service_id: outcome.service.service_id,
            instance_id: outcome.instance.instance_id.clone(),
            push_kid: outcome.instance.push_kid.clone(),
            lease_ttl_sec: outcome.instance.lease_ttl_sec(),
            registry_version: outcome.registry_version,
        }
    }
}

/// Orchestrates the full registration flow: bootstrap verification, then
/// the transactional upsert in [`ServiceRepository`]. Bootstrap verification
/// has no secret-store dependency of its own — it checks the caller's
/// presented token directly, unlike the key-rotation-aware instance flow.
pub struct RegistrationService {
    nonces: Arc<NonceStore>,
    repository: Arc<ServiceRepository>,
    clock: Arc<dyn Clock>,
    bootstrap_ts_window_secs: i64,
}

impl RegistrationService {
    pub fn new(
        nonces: Arc<NonceStore>,
        repository: Arc<ServiceRepository>,
        bootstrap_ts_window_secs: i64,
    ) -> Self {
        Self {
            nonces,
            repository,
            clock: Arc::new(SystemClock),
            bootstrap_ts_window_secs,
        }
    }

    pub async fn register(&self, req: BootstrapRequest) -> Result<RegisterResponse> {
        verify_bootstrap(
            self.clock.as_ref(),
            self.nonces.as_ref(),
            self.bootstrap_ts_window_secs,
            &req.service_name,
            req.token.as_deref(),
            req.ts.as_deref(),
            req.nonce.as_deref(),
            req.signature.as_deref(),
            &req.raw_body,
        )
        .await
        .map_err(BaseError::Auth)?;

        let input = RegisterInput {
            service_name: req.service_name,
            bootstrap_secret_ref: req.bootstrap_secret_ref,
            node_id: req.node_id,
            task_slot: req.task_slot,
            boot_id: req.boot_id,
            base_url: req.base_url,
            health_url: req.health_url,
            heartbeat_interval_sec: req.heartbeat_interval_sec,
            meta: req.meta,
        };

        let outcome = self.repository.register(input).await?;
        Ok(outcome.into())
    }
}

/// Errors surfaced straight from [`ledger_auth::verify_bootstrap`] already
/// carry the wire code via [`AuthError::code`]; re-exported here so callers
/// don't need to reach into `ledger_common` just to format a response.
pub fn auth_error_code(err: &AuthError) -> &'static str {
    err.code()
}

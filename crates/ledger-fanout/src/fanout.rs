use crate::snapshot::RegistrySnapshot;
use ledger_auth::{SigningContext, signed_headers};
use ledger_common::Result;
use ledger_core::{Clock, SystemClock};
use ledger_secrets::{SecretBackend, SecretStore};
use ledger_store::{ServiceInstance, ServiceRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const FANOUT_PATH: &str = "/flume/registry";
const FANOUT_TIMEOUT: Duration = Duration::from_secs(10);

/// The per-target result of one fanout attempt. `http_status == 0` marks a
/// transport-level failure (timeout, connection refused, DNS) rather than
/// a rejected push.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PushOutcome {
    pub instance_id: String,
    pub http_status: u16,
    pub error_message: Option<String>,
}

impl PushOutcome {
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct FanoutReport {
    pub total_targets: usize,
    pub ok_count: usize,
    pub failures: Vec<PushOutcome>,
}

/// Pushes `snapshot` to every currently-`UP` instance, concurrently, using
/// per-target signed headers derived from that instance's owning service.
/// Never returns an `Err` for a single target's failure — those land in
/// [`FanoutReport::failures`] instead; only a repository or secret-store
/// read failure short-circuits the whole fanout.
pub async fn fanout_snapshot<B: SecretBackend>(
    repository: &Arc<ServiceRepository>,
    secrets: &Arc<SecretStore<B>>,
    http: &reqwest::Client,
    snapshot: &RegistrySnapshot,
) -> Result<FanoutReport> {
    let instances = repository.list_up_instances().await?;
    let services = repository.list_services().await?;
    let body = Arc::new(snapshot.to_bytes());

    let mut tasks = Vec::with_capacity(instances.len());
    for instance in instances {
        let Some(service) = services.iter().find(|s| s.service_id == instance.service_id).cloned() else {
            continue;
        };

        let Some((kid, token_bytes)) = secrets
            .get_current(&service.bootstrap_secret_ref, service.ttl_s)
            .await
            .map_err(ledger_common::BaseError::fanout)?
        else {
            // No active secret for this service; skip rather than fail the whole fanout.
            warn!(service = %service.name, "no active secret, skipping push target");
            continue;
        };

        let http = http.clone();
        let body = body.clone();
        let version = snapshot.version;
        tasks.push(tokio::spawn(async move {
            push_one(&http, &kid, &token_bytes, &instance, &body, version).await
        }));
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    for task in tasks {
        match task.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!(error = %e, "fanout task panicked"),
        }
    }

    let ok_count = outcomes.iter().filter(|o| o.is_ok()).count();
    let failures = outcomes.iter().filter(|o| !o.is_ok()).cloned().collect();

    Ok(FanoutReport {
        total_targets: outcomes.len(),
        ok_count,
        failures,
    })
}

async fn push_one(
    http: &reqwest::Client,
    kid: &str,
    token_bytes: &[u8],
    instance: &ServiceInstance,
    body: &[u8],
    version: i64,
) -> PushOutcome {
    let ctx = SigningContext {
        instance_id: &instance.instance_id,
        kid,
        token_bytes,
    };
    let clock = SystemClock;
    let mut headers = signed_headers(&clock, &ctx, "PUT", FANOUT_PATH, body);
    headers.insert("X-Registry-Version".to_string(), version.to_string());

    let url = format!("{}{}", instance.base_url.trim_end_matches('/'), FANOUT_PATH);
    let mut request = http.put(&url).body(body.to_vec()).timeout(FANOUT_TIMEOUT);
    for (name, value) in &headers {
        request = request.header(name.as_str(), value.as_str());
    }

    match request.send().await {
        Ok(response) => PushOutcome {
            instance_id: instance.instance_id.clone(),
            http_status: response.status().as_u16(),
            error_message: None,
        },
        Err(e) => PushOutcome {
            instance_id: instance.instance_id.clone(),
            http_status: 0,
            error_message: Some(e.to_string()),
        },
    }
}

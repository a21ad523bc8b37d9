use ledger_common::Result;
use ledger_store::{RegistryState, ServiceRepository};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub instance_id: String,
    pub base_url: String,
    pub status: String,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    pub publishes: Vec<String>,
    pub consumes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSnapshot {
    pub service_id: String,
    pub name: String,
    pub capabilities: Capabilities,
    pub meta: serde_json::Value,
    pub instances: Vec<InstanceSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrySnapshot {
    pub version: i64,
    pub services: Vec<ServiceSnapshot>,
}

impl RegistrySnapshot {
    /// Serializes to the exact compact, stable-key JSON bytes signed for
    /// every push: no incidental whitespace, UTF-8.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("RegistrySnapshot always serializes")
    }
}

/// Builds a point-in-time snapshot of every service and its instances.
pub async fn build_snapshot(repository: &Arc<ServiceRepository>) -> Result<RegistrySnapshot> {
    let version = RegistryState::current(repository.db()).await?;
    let services = repository.list_services().await?;

    let mut service_snapshots = Vec::with_capacity(services.len());
    for service in services {
        let instances = repository.list_instances(&service.service_id).await?;
        service_snapshots.push(ServiceSnapshot {
            service_id: service.service_id.clone(),
            name: service.name.clone(),
            capabilities: Capabilities {
                publishes: service.publishes_vec(),
                consumes: service.consumes_vec(),
            },
            meta: service.meta_value(),
            instances: instances
                .iter()
                .map(|i| InstanceSnapshot {
                    instance_id: i.instance_id.clone(),
                    base_url: i.base_url.clone(),
                    status: i.status.clone(),
                    meta: i.meta_value(),
                })
                .collect(),
        });
    }

    Ok(RegistrySnapshot {
        version,
        services: service_snapshots,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::{Database, RegisterInput};

    #[tokio::test]
    async fn snapshot_reflects_registered_services_and_instances() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("l.db").to_str().unwrap())
            .await
            .unwrap();
        std::mem::forget(dir);

        let repository = Arc::new(ServiceRepository::new(db));
        repository
            .register(RegisterInput {
                service_name: "billing".to_string(),
                bootstrap_secret_ref: "ref-billing".to_string(),
                node_id: Some("node-1".to_string()),
                task_slot: Some(0),
                boot_id: Some("boot-1".to_string()),
                base_url: "http://10.0.0.1:8080".to_string(),
                health_url: None,
                heartbeat_interval_sec: Some(10),
                meta: None,
            })
            .await
            .unwrap();

        let snapshot = build_snapshot(&repository).await.unwrap();
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.services.len(), 1);
        assert_eq!(snapshot.services[0].instances.len(), 1);

        let bytes = snapshot.to_bytes();
        assert!(!bytes.is_empty());
        assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_ok());
    }
}

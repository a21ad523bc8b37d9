use ledger_common::Result;
use ledger_store::{RegistryState, Service, ServiceInstance, ServiceRepository};
use serde::Serialize;
use std::sync::Arc;

/// Mechanical accessors over the current registry state, used by
/// administrative/diagnostic endpoints that don't need the signed snapshot
/// fanout produces.
pub struct ReadPaths {
    repository: Arc<ServiceRepository>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    pub service_id: String,
    pub name: String,
    pub active_kid: String,
    pub region: String,
    pub instances: Vec<InstanceView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceView {
    pub instance_id: String,
    pub base_url: String,
    pub status: String,
    pub last_heartbeat_at: Option<i64>,
    pub consecutive_miss: i64,
}

impl From<&ServiceInstance> for InstanceView {
    fn from(instance: &ServiceInstance) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            base_url: instance.base_url.clone(),
            status: instance.status.clone(),
            last_heartbeat_at: instance.last_heartbeat_at,
            consecutive_miss: instance.consecutive_miss,
        }
    }
}

impl ReadPaths {
    pub fn new(repository: Arc<ServiceRepository>) -> Self {
        Self { repository }
    }

    pub async fn get_service(&self, name: &str) -> Result<Option<ServiceView>> {
        let Some(service) = self.repository.get_service_by_name(name).await? else {
            return Ok(None);
        };
        Ok(Some(self.view_of(service).await?))
    }

    pub async fn list_services(&self) -> Result<Vec<ServiceView>> {
        let services = self.repository.list_services().await?;
        let mut views = Vec::with_capacity(services.len());
        for service in services {
            views.push(self.view_of(service).await?);
        }
        Ok(views)
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<Option<ServiceInstance>> {
        self.repository.get_instance(instance_id).await
    }

    pub async fn registry_version(&self) -> Result<i64> {
        RegistryState::current(self.repository.db()).await
    }

    async fn view_of(&self, service: Service) -> Result<ServiceView> {
        let instances = self.repository.list_instances(&service.service_id).await?;
        Ok(ServiceView {
            service_id: service.service_id,
            name: service.name,
            active_kid: service.active_kid,
            region: service.region,
            instances: instances.iter().map(InstanceView::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_store::{Database, RegisterInput};

    #[tokio::test]
    async fn list_services_reflects_registered_instances() {
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

        let reads = ReadPaths::new(repository);
        let services = reads.list_services().await.unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].instances.len(), 1);
        assert_eq!(reads.registry_version().await.unwrap(), 1);
    }
}

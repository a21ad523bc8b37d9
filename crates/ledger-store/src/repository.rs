use crate::db::Database;
use crate::model::{InstanceStatus, RegisterInput, RegisterOutcome, Service, ServiceInstance};
use crate::registry::RegistryState;
use ledger_common::{BaseError, DatabaseError, Result};
use sqlx::{Sqlite, Transaction};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as i64
}

/// Idempotent service + instance upsert, transactional, grounded on the
/// registration state machine: get-or-create the service, dedup the
/// instance by `(service_id, node_id, task_slot)`, retry once on a racing
/// unique-constraint violation, and bump the registry version only when
/// something materially changed.
pub struct ServiceRepository {
    db: Database,
}

impl ServiceRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub async fn register(&self, input: RegisterInput) -> Result<RegisterOutcome> {
        let mut tx = self.db.pool().begin().await.map_err(DatabaseError::from)?;

        let service = get_or_create_service(&mut tx, &input).await?;
        let (instance, created, changed) = upsert_instance(&mut tx, &service, &input).await?;

        let changed_any = created || changed;
        let registry_version = RegistryState::maybe_bump(&mut tx, changed_any).await?;

        tx.commit().await.map_err(DatabaseError::from)?;

        Ok(RegisterOutcome {
            service,
            instance,
            changed: changed_any,
            registry_version,
        })
    }

    /// Records a heartbeat for an already-registered instance: resets the
    /// miss counter and flips `DOWN -> UP` if the instance had lapsed.
    pub async fn record_heartbeat(&self, instance_id: &str) -> Result<ServiceInstance> {
        let ts = now();
        let mut tx = self.db.pool().begin().await.map_err(DatabaseError::from)?;

        sqlx::query(
            "UPDATE service_instances
                SET last_heartbeat_at = ?, consecutive_miss = 0, status = 'UP', updated_at = ?
                WHERE instance_id = ?",
        )
        .bind(ts)
        .bind(ts)
        .bind(instance_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from)?;

        let instance: ServiceInstance = sqlx::query_as("SELECT * FROM service_instances WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::from)?
            .ok_or_else(|| BaseError::registry(format!("instance {instance_id} not found")))?;

        tx.commit().await.map_err(DatabaseError::from)?;
        Ok(instance)
    }

    /// Sweeps every `UP` instance whose heartbeat has lapsed beyond its
    /// lease, incrementing `consecutive_miss` and flipping to `DOWN` once
    /// the miss threshold is reached. Returns the number of instances
    /// flipped to `DOWN` in this pass.
    pub async fn sweep_missed_heartbeats(&self) -> Result<usize> {
        let ts = now();

        let candidates: Vec<ServiceInstance> = sqlx::query_as(
            "SELECT * FROM service_instances
                WHERE status = 'UP'
                  AND last_heartbeat_at IS NOT NULL
                  AND ? - last_heartbeat_at > heartbeat_interval_sec",
        )
        .bind(ts)
        .fetch_all(self.db.pool())
        .await
        .map_err(DatabaseError::from)?;

        let mut flipped = 0;
        for instance in candidates {
            let next_miss = instance.consecutive_miss + 1;
            let next_status = if next_miss >= ServiceInstance::MISS_THRESHOLD {
                flipped += 1;
                InstanceStatus::Down.as_str()
            } else {
                InstanceStatus::Up.as_str()
            };

            sqlx::query(
                "UPDATE service_instances SET consecutive_miss = ?, status = ?, updated_at = ? WHERE instance_id = ?",
            )
            .bind(next_miss)
            .bind(next_status)
            .bind(ts)
            .bind(&instance.instance_id)
            .execute(self.db.pool())
            .await
            .map_err(DatabaseError::from)?;
        }

        Ok(flipped)
    }

    pub async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>> {
        sqlx::query_as("SELECT * FROM services WHERE name = ?")
            .bind(name)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| BaseError::Database(DatabaseError::from(e)))
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<Option<ServiceInstance>> {
        sqlx::query_as("SELECT * FROM service_instances WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| BaseError::Database(DatabaseError::from(e)))
    }

    pub async fn list_services(&self) -> Result<Vec<Service>> {
        sqlx::query_as("SELECT * FROM services ORDER BY name")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| BaseError::Database(DatabaseError::from(e)))
    }

    pub async fn list_instances(&self, service_id: &str) -> Result<Vec<ServiceInstance>> {
        sqlx::query_as("SELECT * FROM service_instances WHERE service_id = ? ORDER BY created_at")
            .bind(service_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| BaseError::Database(DatabaseError::from(e)))
    }

    pub async fn list_up_instances(&self) -> Result<Vec<ServiceInstance>> {
        sqlx::query_as("SELECT * FROM service_instances WHERE status = 'UP' ORDER BY instance_id")
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| BaseError::Database(DatabaseError::from(e)))
    }
}

async fn get_or_create_service(tx: &mut Transaction<'_, Sqlite>, input: &RegisterInput) -> Result<Service> {
    if let Some(service) = sqlx::query_as::<_, Service>("SELECT * FROM services WHERE name = ?")
        .bind(&input.service_name)
        .fetch_optional(&mut **tx)
        .await
        .map_err(DatabaseError::from)?
    {
        return Ok(service);
    }

    let ts = now();
    let service_id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO services (service_id, name, bootstrap_secret_ref, active_kid, publishes, consumes, meta, region, ttl_s, created_at, updated_at)
         VALUES (?, ?, ?, 'v1', '[]', '[]', '{}', 'eu-central-1', 300, ?, ?)",
    )
    .bind(&service_id)
    .bind(&input.service_name)
    .bind(&input.bootstrap_secret_ref)
    .bind(ts)
    .bind(ts)
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::from)?;

    sqlx::query_as("SELECT * FROM services WHERE service_id = ?")
        .bind(&service_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| BaseError::Database(DatabaseError::from(e)))
}

async fn find_instance_by_coords(
    tx: &mut Transaction<'_, Sqlite>,
    service_id: &str,
    node_id: &str,
    task_slot: i64,
) -> Result<Option<ServiceInstance>> {
    sqlx::query_as(
        "SELECT * FROM service_instances WHERE service_id = ? AND node_id = ? AND task_slot = ?",
    )
    .bind(service_id)
    .bind(node_id)
    .bind(task_slot)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| BaseError::Database(DatabaseError::from(e)))
}

/// Returns `(instance, created, changed)`.
async fn upsert_instance(
    tx: &mut Transaction<'_, Sqlite>,
    service: &Service,
    input: &RegisterInput,
) -> Result<(ServiceInstance, bool, bool)> {
    let health_url = input.resolved_health_url();
    let heartbeat_interval_sec = input.resolved_heartbeat_interval_sec();
    let meta = input
        .meta
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string());

    let coords = input.node_id.as_deref().zip(input.task_slot);

    let existing = if let Some((node_id, task_slot)) = coords {
        find_instance_by_coords(tx, &service.service_id, node_id, task_slot).await?
    } else {
        None
    };

    if let Some(instance) = existing {
        return update_instance(tx, instance, service, input, &health_url, heartbeat_interval_sec, &meta).await;
    }

    let ts = now();
    let instance_id = Uuid::new_v4().to_string();

    let insert = sqlx::query(
        "INSERT INTO service_instances
            (instance_id, service_id, node_id, task_slot, boot_id, base_url, health_url,
             heartbeat_interval_sec, status, last_heartbeat_at, consecutive_miss, push_kid, meta,
             created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'UP', NULL, 0, ?, ?, ?, ?)",
    )
    .bind(&instance_id)
    .bind(&service.service_id)
    .bind(&input.node_id)
    .bind(input.task_slot)
    .bind(&input.boot_id)
    .bind(&input.base_url)
    .bind(&health_url)
    .bind(heartbeat_interval_sec)
    .bind(&service.active_kid)
    .bind(&meta)
    .bind(ts)
    .bind(ts)
    .execute(&mut **tx)
    .await;

    match insert {
        Ok(_) => {
            let instance = sqlx::query_as("SELECT * FROM service_instances WHERE instance_id = ?")
                .bind(&instance_id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| BaseError::Database(DatabaseError::from(e)))?;
            Ok((instance, true, true))
        }
        // A concurrent registration won the race on (service, node_id, task_slot).
        // Retry the lookup once rather than fail the whole transaction.
        Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") && coords.is_some() => {
            let (node_id, task_slot) = coords.expect("coords checked above");
            match find_instance_by_coords(tx, &service.service_id, node_id, task_slot).await? {
                Some(instance) => {
                    update_instance(tx, instance, service, input, &health_url, heartbeat_interval_sec, &meta).await
                }
                None => Err(BaseError::internal(
                    "instance registration race could not be resolved after retry",
                )),
            }
        }
        Err(e) => Err(BaseError::Database(DatabaseError::from(e))),
    }
}

async fn update_instance(
    tx: &mut Transaction<'_, Sqlite>,
    existing: ServiceInstance,
    service: &Service,
    input: &RegisterInput,
    health_url: &str,
    heartbeat_interval_sec: i64,
    meta: &str,
) -> Result<(ServiceInstance, bool, bool)> {
    let mut changed = existing.base_url != input.base_url
        || existing.health_url != health_url
        || existing.heartbeat_interval_sec != heartbeat_interval_sec;

    let mut next_status = existing.status.clone();
    let mut next_consecutive_miss = existing.consecutive_miss;
    let mut next_boot_id = existing.boot_id.clone();

    if input.boot_id.is_some() && input.boot_id != existing.boot_id {
        next_boot_id = input.boot_id.clone();
        next_status = InstanceStatus::Up.as_str().to_string();
        next_consecutive_miss = 0;
        changed = true;
    }

    if !changed {
        return Ok((existing, false, false));
    }

    let ts = now();
    sqlx::query(
        "UPDATE service_instances
            SET base_url = ?, health_url = ?, heartbeat_interval_sec = ?, boot_id = ?,
                status = ?, consecutive_miss = ?, push_kid = ?, meta = ?, updated_at = ?
            WHERE instance_id = ?",
    )
    .bind(&input.base_url)
    .bind(health_url)
    .bind(heartbeat_interval_sec)
    .bind(&next_boot_id)
    .bind(&next_status)
    .bind(next_consecutive_miss)
    .bind(&service.active_kid)
    .bind(meta)
    .bind(ts)
    .bind(&existing.instance_id)
    .execute(&mut **tx)
    .await
    .map_err(DatabaseError::from)?;

    let instance = sqlx::query_as("SELECT * FROM service_instances WHERE instance_id = ?")
        .bind(&existing.instance_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| BaseError::Database(DatabaseError::from(e)))?;

    Ok((instance, false, true))
}

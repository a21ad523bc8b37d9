use crate::db::Database;
use async_trait::async_trait;
use nonce_auth::NonceError;
use nonce_auth::storage::{NonceEntry, NonceStorage, StorageStats};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// A [`NonceStorage`] implementation over the ledger's shared SQLite pool,
/// keyed on the same `(nonce, context)` uniqueness pair as the original
/// design; violating that uniqueness is the replay signal.
pub struct SqliteNonceStorage {
    db: Database,
    cleanup_lock: RwLock<()>,
}

impl SqliteNonceStorage {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cleanup_lock: RwLock::new(()),
        }
    }

    async fn get(
        &self,
        nonce: &str,
        context: Option<&str>,
    ) -> Result<Option<(i64, i64)>, NonceError> {
        let result = if let Some(ctx) = context {
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT expires_at, created_at FROM nonce_entries WHERE nonce = ? AND context = ?",
            )
            .bind(nonce)
            .bind(ctx)
            .fetch_optional(self.db.pool())
            .await
        } else {
            sqlx::query_as::<_, (i64, i64)>(
                "SELECT expires_at, created_at FROM nonce_entries WHERE nonce = ? AND context IS NULL",
            )
            .bind(nonce)
            .fetch_optional(self.db.pool())
            .await
        };

        result.map_err(NonceError::from_storage_error)
    }
}

#[async_trait]
impl NonceStorage for SqliteNonceStorage {
    async fn get(&self, nonce: &str, context: Option<&str>) -> Result<Option<NonceEntry>, NonceError> {
        let Some((expires_at, created_at)) = self.get(nonce, context).await? else {
            return Ok(None);
        };

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        if expires_at <= now {
            return Ok(None);
        }

        Ok(Some(NonceEntry {
            nonce: nonce.to_string(),
            context: context.map(str::to_string),
            created_at,
        }))
    }

    async fn set(&self, nonce: &str, context: Option<&str>, ttl: Duration) -> Result<(), NonceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let expires_at = now + ttl.as_secs() as i64;

        let result = sqlx::query(
            "INSERT INTO nonce_entries (nonce, context, expires_at, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(nonce)
        .bind(context)
        .bind(expires_at)
        .bind(now)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.message().contains("UNIQUE") => {
                Err(NonceError::DuplicateNonce)
            }
            Err(e) => Err(NonceError::from_storage_error(e)),
        }
    }

    async fn exists(&self, nonce: &str, context: Option<&str>) -> Result<bool, NonceError> {
        Ok(NonceStorage::get(self, nonce, context).await?.is_some())
    }

    async fn cleanup_expired(&self, current_time: i64) -> Result<usize, NonceError> {
        let _lock = self.cleanup_lock.write().await;

        let result = sqlx::query("DELETE FROM nonce_entries WHERE expires_at < ?")
            .bind(current_time)
            .execute(self.db.pool())
            .await
            .map_err(NonceError::from_storage_error)?;

        Ok(result.rows_affected() as usize)
    }

    async fn get_stats(&self) -> Result<StorageStats, NonceError> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nonce_entries")
            .fetch_one(self.db.pool())
            .await
            .map_err(NonceError::from_storage_error)?;

        Ok(StorageStats {
            total_records: total.0 as usize,
            backend_info: "SQLite (sqlx async)".to_string(),
        })
    }
}

/// The two anti-replay namespaces over [`SqliteNonceStorage`]: bootstrap
/// nonces scoped by service name, instance nonces scoped by instance id.
/// Namespacing is done via a prefixed `context` rather than a second table,
/// since both share the same `(nonce, context)` uniqueness constraint.
pub struct NonceStore {
    storage: SqliteNonceStorage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Duplicate,
}

/// Nonces are retained for a day; replay protection only needs to outlive
/// the verifier's own timestamp window, but a longer retention gives
/// `cleanup_expired` something meaningful to reap.
const NONCE_RETENTION: Duration = Duration::from_secs(24 * 3600);

impl NonceStore {
    pub fn new(db: Database) -> Self {
        Self {
            storage: SqliteNonceStorage::new(db),
        }
    }

    pub async fn record_bootstrap(&self, service_name: &str, nonce: &str) -> Result<RecordOutcome, NonceError> {
        self.record(&format!("bootstrap:{service_name}"), nonce).await
    }

    pub async fn record_instance(&self, instance_id: &str, nonce: &str) -> Result<RecordOutcome, NonceError> {
        self.record(&format!("instance:{instance_id}"), nonce).await
    }

    async fn record(&self, context: &str, nonce: &str) -> Result<RecordOutcome, NonceError> {
        match self.storage.set(nonce, Some(context), NONCE_RETENTION).await {
            Ok(()) => Ok(RecordOutcome::Inserted),
            Err(NonceError::DuplicateNonce) => Ok(RecordOutcome::Duplicate),
            Err(e) => Err(e),
        }
    }

    pub async fn cleanup_expired(&self, now: i64) -> Result<usize, NonceError> {
        self.storage.cleanup_expired(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        std::mem::forget(dir);
        db
    }

    #[tokio::test]
    async fn bootstrap_and_instance_namespaces_are_independent() {
        let store = NonceStore::new(test_db().await);

        assert_eq!(
            store.record_bootstrap("svc-a", "n1").await.unwrap(),
            RecordOutcome::Inserted
        );
        // same nonce, different namespace (instance vs bootstrap) -> not a replay
        assert_eq!(
            store.record_instance("inst-1", "n1").await.unwrap(),
            RecordOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn duplicate_nonce_in_same_namespace_is_rejected() {
        let store = NonceStore::new(test_db().await);

        assert_eq!(
            store.record_bootstrap("svc-a", "n1").await.unwrap(),
            RecordOutcome::Inserted
        );
        assert_eq!(
            store.record_bootstrap("svc-a", "n1").await.unwrap(),
            RecordOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn same_nonce_different_service_is_not_a_replay() {
        let store = NonceStore::new(test_db().await);

        assert_eq!(
            store.record_bootstrap("svc-a", "n1").await.unwrap(),
            RecordOutcome::Inserted
        );
        assert_eq!(
            store.record_bootstrap("svc-b", "n1").await.unwrap(),
            RecordOutcome::Inserted
        );
    }
}

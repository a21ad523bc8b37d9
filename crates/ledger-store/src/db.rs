use ledger_common::{BaseError, DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// The ledger's SQLite-backed store: services, instances, the registry
/// version counter, and the two nonce namespaces all live in one pool so a
/// registration can be committed as a single transaction.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| {
                BaseError::Database(DatabaseError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(|e| {
                BaseError::Database(DatabaseError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?;

        let db = Self { pool };
        db.initialize_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS services (
                service_id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                bootstrap_secret_ref TEXT NOT NULL,
                active_kid TEXT NOT NULL DEFAULT 'v1',
                publishes TEXT NOT NULL DEFAULT '[]',
                consumes TEXT NOT NULL DEFAULT '[]',
                meta TEXT NOT NULL DEFAULT '{}',
                region TEXT NOT NULL DEFAULT 'eu-central-1',
                ttl_s INTEGER NOT NULL DEFAULT 300,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS service_instances (
                instance_id TEXT PRIMARY KEY,
                service_id TEXT NOT NULL REFERENCES services(service_id) ON DELETE CASCADE,
                node_id TEXT,
                task_slot INTEGER,
                boot_id TEXT,
                base_url TEXT NOT NULL,
                health_url TEXT NOT NULL,
                heartbeat_interval_sec INTEGER NOT NULL DEFAULT 10,
                status TEXT NOT NULL DEFAULT 'UP',
                last_heartbeat_at INTEGER,
                consecutive_miss INTEGER NOT NULL DEFAULT 0,
                push_kid TEXT NOT NULL DEFAULT 'v1',
                meta TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_instance_by_service_node_slot
                ON service_instances(service_id, node_id, task_slot)
                WHERE node_id IS NOT NULL AND task_slot IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_instances_service_status
                ON service_instances(service_id, status)",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_instances_last_heartbeat
                ON service_instances(last_heartbeat_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS registry_state (
                pkid INTEGER PRIMARY KEY CHECK (pkid = 1),
                registry_version INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS nonce_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                nonce TEXT NOT NULL,
                context TEXT,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(nonce, context)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_nonce_context ON nonce_entries(nonce, context)")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_nonce_expires_at ON nonce_entries(expires_at)")
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;

        Ok(())
    }
}

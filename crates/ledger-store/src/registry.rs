use crate::db::Database;
use ledger_common::{DatabaseError, Result};
use sqlx::{Sqlite, Transaction};

/// Single-row, fleet-wide monotonic counter. Created lazily on first bump;
/// every registration or heartbeat transition that materially changes fleet
/// state advances it by one.
pub struct RegistryState;

impl RegistryState {
    /// Atomically increments and returns the new version, inside `tx`.
    pub async fn bump(tx: &mut Transaction<'_, Sqlite>) -> Result<i64> {
        sqlx::query("INSERT INTO registry_state (pkid, registry_version) VALUES (1, 0) ON CONFLICT(pkid) DO NOTHING")
            .execute(&mut **tx)
            .await
            .map_err(DatabaseError::from)?;

        sqlx::query("UPDATE registry_state SET registry_version = registry_version + 1 WHERE pkid = 1")
            .execute(&mut **tx)
            .await
            .map_err(DatabaseError::from)?;

        let row: (i64,) = sqlx::query_as("SELECT registry_version FROM registry_state WHERE pkid = 1")
            .fetch_one(&mut **tx)
            .await
            .map_err(DatabaseError::from)?;

        Ok(row.0)
    }

    /// Current version without mutating, 0 if never bumped.
    pub async fn current(db: &Database) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT registry_version FROM registry_state WHERE pkid = 1")
            .fetch_optional(db.pool())
            .await
            .map_err(DatabaseError::from)?;

        Ok(row.map(|r| r.0).unwrap_or(0))
    }

    /// Bumps only if `changed`, otherwise returns the current version
    /// unmodified, keeping call sites terse.
    pub async fn maybe_bump(tx: &mut Transaction<'_, Sqlite>, changed: bool) -> Result<i64> {
        if changed {
            Self::bump(tx).await
        } else {
            let row: Option<(i64,)> = sqlx::query_as("SELECT registry_version FROM registry_state WHERE pkid = 1")
                .fetch_optional(&mut **tx)
                .await
                .map_err(DatabaseError::from)?;
            Ok(row.map(|r| r.0).unwrap_or(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn test_db() -> Database {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let db = Database::connect(path.to_str().unwrap()).await.unwrap();
        std::mem::forget(dir);
        db
    }

    #[tokio::test]
    async fn current_is_zero_before_any_bump() {
        let db = test_db().await;
        assert_eq!(RegistryState::current(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn bump_is_monotonic() {
        let db = test_db().await;

        let mut tx = db.pool().begin().await.unwrap();
        let v1 = RegistryState::bump(&mut tx).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(v1, 1);

        let mut tx = db.pool().begin().await.unwrap();
        let v2 = RegistryState::bump(&mut tx).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(v2, 2);

        assert_eq!(RegistryState::current(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn maybe_bump_skips_when_unchanged() {
        let db = test_db().await;

        let mut tx = db.pool().begin().await.unwrap();
        RegistryState::bump(&mut tx).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let v = RegistryState::maybe_bump(&mut tx, false).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(v, 1);
    }
}

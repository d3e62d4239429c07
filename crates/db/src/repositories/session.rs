use chrono::{DateTime, Utc};
use sqlx::Row;

use leadline_core::session::{SessionStore, SessionStoreError};

use super::RepositoryError;
use crate::DbPool;

/// Dialog snapshots in the `session_snapshot` table, one row per cache key.
#[derive(Clone)]
pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT payload FROM session_snapshot WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get::<String, _>("payload").map_err(RepositoryError::from))
            .transpose()
    }

    pub async fn upsert(&self, key: &str, payload: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO session_snapshot (key, payload, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM session_snapshot WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM session_snapshot")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")?)
    }

    /// Removes snapshots untouched since `cutoff`, returning how many went.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM session_snapshot WHERE updated_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(self.find(key).await?)
    }

    async fn save(&self, key: &str, payload: &str) -> Result<(), SessionStoreError> {
        Ok(self.upsert(key, payload).await?)
    }

    async fn clear(&self, key: &str) -> Result<(), SessionStoreError> {
        self.delete(key).await?;
        Ok(())
    }
}

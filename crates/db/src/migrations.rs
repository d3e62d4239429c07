use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect_with_settings, migrations::MIGRATOR, DbPool};

    const MANAGED_SCHEMA_OBJECTS: &[&str] =
        &["session_snapshot", "idx_session_snapshot_updated_at"];

    async fn object_count(pool: &DbPool, name: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await
            .expect("query sqlite_master")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn migrations_create_session_snapshot_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(object_count(&pool, name).await, 1, "{name} should exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_reversible() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        MIGRATOR.undo(&pool, 0).await.expect("undo migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            assert_eq!(object_count(&pool, name).await, 0, "{name} should be removed");
        }

        run_pending(&pool).await.expect("re-run migrations");
        assert_eq!(object_count(&pool, "session_snapshot").await, 1);
    }

    #[tokio::test]
    async fn running_twice_is_a_no_op() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
        assert_eq!(object_count(&pool, "session_snapshot").await, 1);
    }
}

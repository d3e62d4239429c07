use std::str::FromStr;
use std::time::Duration;

use leadline_core::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Opens a pool, creating the database file on first use.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(normalize_url(database_url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    let options = if database_url.contains(":memory:") {
        options
    } else {
        options.journal_mode(SqliteJournalMode::Wal)
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .connect_with(options)
        .await
}

fn normalize_url(database_url: &str) -> &str {
    match database_url.trim() {
        ":memory:" => "sqlite::memory:",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{connect_with_settings, normalize_url};

    #[test]
    fn bare_memory_url_is_normalized() {
        assert_eq!(normalize_url(":memory:"), "sqlite::memory:");
        assert_eq!(normalize_url("sqlite://leadline.db"), "sqlite://leadline.db");
    }

    #[tokio::test]
    async fn file_database_is_created_on_connect() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("leadline.db");
        let url = format!("sqlite://{}", path.display());

        let pool = connect_with_settings(&url, 1, 5).await.expect("connect");
        sqlx::query("SELECT 1").execute(&pool).await.expect("query");
        assert!(path.exists());
    }
}

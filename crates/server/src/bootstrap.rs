use std::sync::Arc;

use axum::Router;
use leadline_core::config::{AppConfig, ConfigError, LoadOptions};
use leadline_core::{BusinessInfo, DialogEngine, LeadCaptureFlow};
use leadline_db::{connect_with_settings, migrations, DbPool, SqlSessionStore};
use thiserror::Error;
use tracing::info;

use crate::booking::BookingState;
use crate::chat::ChatState;
use crate::{booking, chat, estimate, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("booking client could not be built: {0}")]
    BookingClient(#[source] reqwest::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    if config.booking.api_key().is_none() {
        tracing::warn!(
            event_name = "system.bootstrap.booking_disabled",
            correlation_id = "bootstrap",
            "no booking API key configured; /api/cal will answer 500"
        );
    }

    let router = build_router(&config, db_pool.clone())?;
    Ok(Application { config, db_pool, router })
}

/// Every HTTP surface merged into one router over the shared pool.
pub fn build_router(config: &AppConfig, db_pool: DbPool) -> Result<Router, BootstrapError> {
    let business = BusinessInfo::from(&config.business);
    let engine = DialogEngine::new(LeadCaptureFlow::new(business.clone()));
    let store = Arc::new(SqlSessionStore::new(db_pool.clone()));
    let booking = BookingState::from_config(&config.booking).map_err(BootstrapError::BookingClient)?;

    Ok(Router::new()
        .merge(health::router(db_pool))
        .merge(chat::router(ChatState::new(engine, store, &config.dialog)))
        .merge(estimate::router(business))
        .merge(booking::router(booking)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use leadline_core::config::{ConfigOverrides, LoadOptions};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_scheduling_url() {
        let mut options = overrides("sqlite::memory:");
        options.overrides.scheduling_url = Some("not a url".to_string());

        let result = bootstrap(options).await;

        assert!(result.is_err());
        let message = result.err().expect("error").to_string();
        assert!(message.contains("business.scheduling_url"), "{message}");
    }

    #[tokio::test]
    async fn bootstrapped_router_serves_chat_and_health() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'session_snapshot'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("snapshot table after bootstrap");
        assert_eq!(table_count, 1);

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/chat/sessions")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["state"]["messages"].as_array().map(Vec::len), Some(1));

        let health = app
            .router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(health.status(), StatusCode::OK);

        app.db_pool.close().await;
    }
}

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use expensa_core::config::{AppConfig, ConfigError};
use expensa_core::store::ExpenseStore;
use expensa_db::{connect_from_config, migrations, DbPool, SqlStateStore};
use thiserror::Error;
use tracing::{info, warn};

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub store: api::SharedStore,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server terminated: {0}")]
    Serve(#[source] std::io::Error),
}

/// Connects, migrates and builds the store for an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let rates = config.rate_table()?;

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let store = Arc::new(ExpenseStore::with_rates(SqlStateStore::new(db_pool.clone()), rates));
    Ok(Application { config, db_pool, store })
}

impl Application {
    pub fn router(&self) -> Router {
        api::router(self.store.clone()).merge(health::router(self.db_pool.clone()))
    }

    /// Serves until ctrl-c, then drains in-flight requests for at most
    /// `server.graceful_shutdown_secs` before closing the pool.
    pub async fn serve(self) -> Result<(), BootstrapError> {
        let address = format!("{}:{}", self.config.server.bind_address, self.config.server.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|source| BootstrapError::Bind { address: address.clone(), source })?;
        info!(
            event_name = "system.server.started",
            correlation_id = "bootstrap",
            bind_address = %address,
            "expensa-server listening"
        );

        let grace = Duration::from_secs(self.config.server.graceful_shutdown_secs);
        let (stopping_tx, stopping_rx) = tokio::sync::oneshot::channel::<()>();
        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                wait_for_shutdown().await;
                let _ = stopping_tx.send(());
            })
            .into_future();
        let mut server = std::pin::pin!(server);

        let result = tokio::select! {
            result = &mut server => result,
            _ = async {
                let _ = stopping_rx.await;
                tokio::time::sleep(grace).await;
            } => {
                warn!(
                    event_name = "system.server.shutdown_timeout",
                    correlation_id = "shutdown",
                    grace_secs = grace.as_secs(),
                    "in-flight requests did not finish before the shutdown deadline"
                );
                Ok(())
            }
        };

        self.db_pool.close().await;
        info!(event_name = "system.server.stopped", correlation_id = "shutdown", "server stopped");
        result.map_err(BootstrapError::Serve)
    }
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for ctrl-c; shutting down"
        );
    }
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "shutdown requested");
}

#[cfg(test)]
mod tests {
    use expensa_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        bootstrap_with_config(AppConfig::load(options)?).await
    }

    fn options(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_urls() {
        let result = bootstrap(options("postgres://localhost/expensa")).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_serves_an_empty_state() {
        let app = bootstrap(options("sqlite::memory:")).await.expect("bootstrap should succeed");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'app_state'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("state table should exist after bootstrap");
        assert_eq!(table_count, 1);

        let users = app.store.users().await.expect("users");
        assert!(users.is_empty());
        assert_eq!(app.store.base_currency().await.expect("base currency"), "USD");

        app.db_pool.close().await;
    }
}

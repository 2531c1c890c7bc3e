//! # PostgreSQL store
//!
//! `PgStore` implements every repository port over a `sqlx` connection pool.
//! The handle is built once by the binary with [`PgStore::connect`], shared as
//! `Arc<dyn Port>` and drained with [`PgStore::close`] on shutdown.

mod accounts;
mod errors;
mod posts;
mod rows;
mod threads;

use std::time::Duration;

use configs::{DatabaseSettings, IsolationLevel};
use domains::{DomainError, DomainResult};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub(crate) use errors::db_error;

/// Rows per multi-row `INSERT`. Keeps bind parameters well under the
/// protocol limit of 65535.
pub(crate) const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    isolation: IsolationLevel,
}

impl PgStore {
    pub async fn connect(settings: &DatabaseSettings) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
            .connect(settings.url.expose_secret())
            .await
            .map_err(db_error)?;

        info!(
            max_connections = settings.max_connections,
            isolation = %settings.isolation,
            "postgres pool ready"
        );
        Ok(Self::from_pool(pool, settings.isolation))
    }

    /// Wraps an existing pool, e.g. one created by a test harness.
    pub fn from_pool(pool: PgPool, isolation: IsolationLevel) -> Self {
        Self { pool, isolation }
    }

    /// Applies the embedded migrations.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))?;
        info!("database migrations applied");
        Ok(())
    }

    /// Closes every connection; later calls fail with `Storage`.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("postgres pool closed");
    }

    /// Round-trips a trivial query; used for startup status reporting.
    pub async fn ping(&self) -> DomainResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn isolation_sql(&self) -> &'static str {
        match self.isolation {
            IsolationLevel::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            IsolationLevel::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
        }
    }
}

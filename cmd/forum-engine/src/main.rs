//! # forum-engine
//!
//! Opens the post store once, applies migrations, reports status and keeps
//! the pool alive until ctrl-c, then drains it.

use anyhow::Context;
use configs::{LoggingSettings, Settings};
use storage_adapters::PgStore;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.logging);
    if let Some(path) = &settings.env_file {
        debug!(path = %path.display(), "loaded .env");
    }

    let store = PgStore::connect(&settings.database)
        .await
        .context("connecting to postgres")?;

    if settings.database.run_migrations {
        store.migrate().await.context("running migrations")?;
    } else {
        warn!("migrations disabled; assuming the schema is current");
    }

    store.ping().await.context("database status check")?;
    info!(
        isolation = %settings.database.isolation,
        pool_size = settings.database.max_connections,
        "forum engine ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("shutdown requested");
    store.close().await;
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! # Settings
//!
//! Layered runtime configuration for the forum engine binaries.
//!
//! Sources, later ones overriding earlier ones:
//! 1. built-in defaults,
//! 2. `config/forum.toml` (optional),
//! 3. environment variables `FORUM__<SECTION>__<KEY>`, e.g.
//!    `FORUM__DATABASE__URL` or `FORUM__LOGGING__JSON=true`.
//!
//! A `.env` file in the working directory is loaded first, so its entries
//! behave like real environment variables. Its path is kept in
//! [`Settings::env_file`] for the caller to report once logging is up.

use std::fmt;
use std::path::PathBuf;

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_FILE: &str = "config/forum";
const ENV_PREFIX: &str = "FORUM";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to assemble configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    /// The `.env` file [`Settings::load`] read, if any.
    #[serde(skip)]
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Connection string. Never logged.
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    /// Apply embedded migrations on startup.
    pub run_migrations: bool,
    /// Isolation level of batch-insert transactions.
    pub isolation: IsolationLevel,
}

/// Transaction isolation for writes that must not interleave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    #[default]
    RepeatableRead,
    Serializable,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationLevel::RepeatableRead => f.write_str("repeatable_read"),
            IsolationLevel::Serializable => f.write_str("serializable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Loads `.env`, then the layered sources described in the module docs.
    pub fn load() -> Result<Self, ConfigError> {
        let env_file = dotenvy::dotenv().ok();
        let mut settings = Self::from_builder(
            Config::builder()
                .add_source(File::with_name(DEFAULT_FILE).required(false))
                .add_source(
                    Environment::with_prefix(ENV_PREFIX)
                        .prefix_separator(ENV_SEPARATOR)
                        .separator(ENV_SEPARATOR)
                        .try_parsing(true),
                ),
        )?;
        settings.env_file = env_file;
        Ok(settings)
    }

    /// Applies defaults underneath the sources already added to `builder`
    /// and deserializes the result.
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings: Settings = builder
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 5)?
            .set_default("database.run_migrations", true)?
            .set_default("database.isolation", "repeatable_read")?
            .set_default("logging.filter", "info")?
            .set_default("logging.json", false)?
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        if db.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        if db.min_connections > db.max_connections {
            return Err(ConfigError::Invalid(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                db.min_connections, db.max_connections
            )));
        }
        Ok(())
    }
}

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{EngagementError, Result};
use crate::validation::InputValidator;

/// Prefix for environment overrides, e.g. `CHAT_ENGAGEMENT__INGEST__BATCH_SIZE=50`
pub const ENV_PREFIX: &str = "CHAT_ENGAGEMENT";

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite storage settings
    pub database: DatabaseConfig,
    /// Log output settings
    pub logging: LoggingConfig,
    /// Import run settings
    pub ingest: IngestConfig,
}

/// SQLite storage settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path, optionally prefixed with `sqlite:`
    pub url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file; enables the daily-rolling file layer
    #[serde(default)]
    pub file_path: Option<String>,
    /// "json" or "text"
    pub format: String,
}

/// Import run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per store write
    pub batch_size: usize,
    /// How many unmatched sender names a run logs
    pub unmatched_preview: usize,
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 2] = ["text", "json"];

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "data/engagement.db".to_string(),
                max_connections: 10,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            ingest: IngestConfig {
                batch_size: 100,
                unmatched_preview: 10,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence:
    /// defaults, then `config/default`, `config/local`, `config` files, then
    /// `CHAT_ENGAGEMENT__*` environment variables.
    pub fn load() -> Result<Self> {
        let builder = Self::builder_with_defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        Self::from_config(builder.build()?)
    }

    /// Load configuration from a single file layered over the defaults
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config = Self::builder_with_defaults()?
            .add_source(File::with_name(path))
            .build()?;

        Self::from_config(config)
    }

    fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("database.url", defaults.database.url)?
            .set_default(
                "database.max_connections",
                u64::from(defaults.database.max_connections),
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("ingest.batch_size", defaults.ingest.batch_size as u64)?
            .set_default(
                "ingest.unmatched_preview",
                defaults.ingest.unmatched_preview as u64,
            )?;
        Ok(builder)
    }

    fn from_config(config: Config) -> Result<Self> {
        let app_config: Self = config.try_deserialize().map_err(|e| {
            EngagementError::InvalidConfig(format!("Failed to deserialize configuration: {e}"))
        })?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(EngagementError::InvalidConfig(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(EngagementError::InvalidConfig(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(EngagementError::InvalidConfig(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, VALID_LEVELS
            )));
        }
        if !VALID_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(EngagementError::InvalidConfig(format!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format, VALID_FORMATS
            )));
        }

        InputValidator::validate_batch_size(self.ingest.batch_size)
            .map_err(|e| EngagementError::InvalidConfig(format!("ingest.batch_size: {e}")))?;
        if self.ingest.unmatched_preview == 0 {
            return Err(EngagementError::InvalidConfig(
                "ingest.unmatched_preview must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Log level, with `RUST_LOG` taking precedence over the configured value
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.logging.format == "json"
    }
}

//! # Stockbook Configuration
//!
//! Settings for the database, the ledger service and logging.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKBOOK_DB_PATH=/srv/stockbook/stock.db                          │
//! │     STOCKBOOK_CONFLICT_RETRIES=8                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockbook/stockbook.toml (Linux)                         │
//! │     ~/Library/Application Support/com.stockbook.stockbook/... (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # stockbook.toml
//! [database]
//! path = "/srv/stockbook/stock.db"
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [ledger]
//! max_conflict_retries = 5
//! challan_number_width = 4
//!
//! [logging]
//! filter = "info,stockbook=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use stockbook_core::DEFAULT_CHALLAN_NUMBER_WIDTH;

use crate::error::{DbError, DbResult};
use crate::pool::{DbConfig, DEFAULT_CONFLICT_RETRIES};

/// Default tracing filter when neither config nor `RUST_LOG` set one.
pub const DEFAULT_LOG_FILTER: &str = "info,stockbook=debug,sqlx=warn";

const MAX_NUMBER_WIDTH: usize = 12;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to `stockbook.db` in the platform data directory.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "stockbook", "stockbook")
        .map(|dirs| dirs.data_dir().join("stockbook.db"))
        .unwrap_or_else(|| PathBuf::from("stockbook.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Ledger Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    /// Re-plans allowed after losing an optimistic write.
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,

    /// Zero-padding of displayed challan numbers (`4` → `0007`).
    #[serde(default = "default_number_width")]
    pub challan_number_width: usize,
}

fn default_conflict_retries() -> u32 {
    DEFAULT_CONFLICT_RETRIES
}

fn default_number_width() -> usize {
    DEFAULT_CHALLAN_NUMBER_WIDTH
}

impl Default for LedgerSection {
    fn default() -> Self {
        LedgerSection {
            max_conflict_retries: default_conflict_retries(),
            challan_number_width: default_number_width(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive string.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete configuration for a Stockbook process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StockbookConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub ledger: LedgerSection,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl StockbookConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`stockbook.toml`)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> DbResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(DbError::InvalidConfig("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(DbError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::InvalidConfig(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        if self.ledger.challan_number_width == 0
            || self.ledger.challan_number_width > MAX_NUMBER_WIDTH
        {
            return Err(DbError::InvalidConfig(format!(
                "ledger.challan_number_width must be between 1 and {}",
                MAX_NUMBER_WIDTH
            )));
        }

        Ok(())
    }

    /// Applies overrides looked up through `var` (the process environment
    /// in [`load`](Self::load)).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(path) = var("STOCKBOOK_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = var("STOCKBOOK_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid STOCKBOOK_MAX_CONNECTIONS"),
            }
        }

        if let Some(retries) = var("STOCKBOOK_CONFLICT_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.ledger.max_conflict_retries = n,
                Err(_) => warn!(value = %retries, "Ignoring invalid STOCKBOOK_CONFLICT_RETRIES"),
            }
        }

        if let Some(width) = var("STOCKBOOK_CHALLAN_WIDTH") {
            match width.parse::<usize>() {
                Ok(n) => self.ledger.challan_number_width = n,
                Err(_) => warn!(value = %width, "Ignoring invalid STOCKBOOK_CHALLAN_WIDTH"),
            }
        }

        if let Some(filter) = var("STOCKBOOK_LOG") {
            self.logging.filter = filter;
        }
    }

    /// `stockbook.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockbook", "stockbook")
            .map(|dirs| dirs.config_dir().join("stockbook.toml"))
    }

    /// Pool and ledger settings for [`Database::new`](crate::Database::new).
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
            .max_conflict_retries(self.ledger.max_conflict_retries)
            .challan_number_width(self.ledger.challan_number_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = StockbookConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ledger.max_conflict_retries, DEFAULT_CONFLICT_RETRIES);
        assert_eq!(config.ledger.challan_number_width, 4);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: StockbookConfig = toml::from_str(
            r#"
            [database]
            path = "/tmp/stock.db"

            [ledger]
            challan_number_width = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/tmp/stock.db"));
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.ledger.challan_number_width, 6);
        assert_eq!(config.ledger.max_conflict_retries, DEFAULT_CONFLICT_RETRIES);
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("STOCKBOOK_DB_PATH", "/data/override.db"),
            ("STOCKBOOK_CONFLICT_RETRIES", "9"),
            ("STOCKBOOK_CHALLAN_WIDTH", "not-a-number"),
            ("STOCKBOOK_LOG", "warn"),
        ]
        .into_iter()
        .collect();

        let mut config = StockbookConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/override.db"));
        assert_eq!(config.ledger.max_conflict_retries, 9);
        assert_eq!(config.ledger.challan_number_width, 4);
        assert_eq!(config.logging.filter, "warn");
    }

    #[test]
    fn test_config_validation() {
        let mut config = StockbookConfig::default();

        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        config.database.max_connections = 2;
        config.database.min_connections = 3;
        assert!(config.validate().is_err());

        config.database.min_connections = 1;
        config.ledger.challan_number_width = 0;
        assert!(config.validate().is_err());

        config.ledger.challan_number_width = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("stockbook-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[ledger]\nmax_conflict_retries = 2\n").unwrap();

        let config = StockbookConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.ledger.max_conflict_retries, 2);

        std::fs::write(&path, "[ledger]\nmax_conflict_retries = \"many\"\n").unwrap();
        assert!(StockbookConfig::load(Some(path.clone())).is_err());

        std::fs::remove_file(&path).unwrap();
    }
}

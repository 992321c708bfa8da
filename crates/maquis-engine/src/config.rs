//! # Engine Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MAQUIS_DB_PATH=/data/maquis.db                                     │
//! │     MAQUIS_TRANSIENT_RETRIES=2                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/maquispro/engine.toml (Linux)                            │
//! │     ~/Library/Application Support/com.maquis.maquispro/engine.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/maquis/maquis.db"
//! max_connections = 5
//!
//! [invitations]
//! code_length = 8
//! max_attempts = 8
//!
//! [retry]
//! transient_retries = 1
//! initial_backoff_ms = 50
//!
//! [orders]
//! max_items = 100
//! max_item_quantity = 999
//!
//! [currency]
//! code = "XOF"
//! symbol = "FCFA"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use maquis_core::{Money, INVITATION_CODE_LENGTH, MAX_ITEM_QUANTITY, MAX_ORDER_ITEMS};
use maquis_db::DbConfig;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationSettings {
    #[serde(default = "default_code_length")]
    pub code_length: usize,

    /// Candidates tried before giving up with a conflict.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_code_length() -> usize {
    INVITATION_CODE_LENGTH
}

fn default_max_attempts() -> u32 {
    8
}

impl Default for InvitationSettings {
    fn default() -> Self {
        InvitationSettings {
            code_length: default_code_length(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// How store failures such as a locked database are retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Extra attempts after the first failure. 0 disables retrying.
    #[serde(default = "default_transient_retries")]
    pub transient_retries: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_transient_retries() -> u32 {
    1
}

fn default_initial_backoff() -> u64 {
    50
}

fn default_max_backoff() -> u64 {
    1_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            transient_retries: default_transient_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetrySettings {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettings {
    /// Distinct lines per order.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    #[serde(default = "default_max_item_quantity")]
    pub max_item_quantity: i64,
}

fn default_max_items() -> usize {
    MAX_ORDER_ITEMS
}

fn default_max_item_quantity() -> i64 {
    MAX_ITEM_QUANTITY
}

impl Default for OrderSettings {
    fn default() -> Self {
        OrderSettings {
            max_items: default_max_items(),
            max_item_quantity: default_max_item_quantity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencySettings {
    /// ISO 4217 code.
    #[serde(default = "default_currency_code")]
    pub code: String,

    /// Printed after amounts in logs and receipts.
    #[serde(default = "default_currency_symbol")]
    pub symbol: String,
}

fn default_currency_code() -> String {
    "XOF".to_string()
}

fn default_currency_symbol() -> String {
    "FCFA".to_string()
}

impl Default for CurrencySettings {
    fn default() -> Self {
        CurrencySettings {
            code: default_currency_code(),
            symbol: default_currency_symbol(),
        }
    }
}

impl CurrencySettings {
    /// `12500` → `"12 500 FCFA"`.
    pub fn format(&self, amount: i64) -> String {
        Money::new(amount).format_with(&self.symbol)
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub invitations: InvitationSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub orders: OrderSettings,

    #[serde(default)]
    pub currency: CurrencySettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (engine.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns the defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        // Short codes make collisions (and guessing) likely.
        if !(6..=16).contains(&self.invitations.code_length) {
            return Err(ConfigError::Invalid(format!(
                "invitations.code_length must be between 6 and 16, got {}",
                self.invitations.code_length
            )));
        }

        if self.invitations.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "invitations.max_attempts must be greater than 0".into(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.initial_backoff_ms cannot exceed retry.max_backoff_ms".into(),
            ));
        }

        if self.orders.max_items == 0 || self.orders.max_item_quantity <= 0 {
            return Err(ConfigError::Invalid(
                "orders.max_items and orders.max_item_quantity must be positive".into(),
            ));
        }

        if self.currency.symbol.trim().is_empty() {
            return Err(ConfigError::Invalid("currency.symbol cannot be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("MAQUIS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("MAQUIS_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid MAQUIS_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(attempts) = std::env::var("MAQUIS_INVITATION_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.invitations.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid MAQUIS_INVITATION_ATTEMPTS"),
            }
        }

        if let Ok(retries) = std::env::var("MAQUIS_TRANSIENT_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.retry.transient_retries = n,
                Err(_) => warn!(value = %retries, "Ignoring invalid MAQUIS_TRANSIENT_RETRIES"),
            }
        }

        if let Ok(symbol) = std::env::var("MAQUIS_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "maquis", "maquispro")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }

    /// The SQLite file to open: configured path, else the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }

        directories::ProjectDirs::from("com", "maquis", "maquispro")
            .map(|dirs| dirs.data_dir().join("maquis.db"))
            .unwrap_or_else(|| PathBuf::from("maquis.db"))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.invitations.code_length, 8);
        assert_eq!(config.invitations.max_attempts, 8);
        assert_eq!(config.retry.transient_retries, 1);
        assert_eq!(config.currency.symbol, "FCFA");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [invitations]
            max_attempts = 3

            [currency]
            symbol = "F"
            "#,
        )
        .unwrap();

        assert_eq!(config.invitations.max_attempts, 3);
        assert_eq!(config.invitations.code_length, 8);
        assert_eq!(config.orders.max_item_quantity, 999);
        assert_eq!(config.currency.format(2500), "2 500 F");
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("maquis-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[database]\npath = \"/tmp/bar.db\"\nmax_connections = 2\n").unwrap();

        let config = EngineConfig::load(Some(path.clone())).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.db_config().max_connections, 2);
    }

    #[test]
    fn test_rejects_short_codes() {
        let mut config = EngineConfig::default();
        config.invitations.code_length = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

//! # Settlement Configuration
//!
//! Later sources win:
//!
//! 1. built-in defaults
//! 2. `till.toml` in the platform config dir (`~/.config/pos/till.toml` on
//!    Linux, `~/Library/Application Support/com.till.pos/till.toml` on macOS)
//!    or an explicit path
//! 3. `TILL_DB_PATH`, `TILL_OUTBOX_POLL_SECS`, `TILL_OUTBOX_BATCH`,
//!    `TILL_LOYALTY_ENABLED`
//!
//! ## File Format
//! ```toml
//! [database]
//! path = "/srv/till/till.db"
//! max_connections = 5
//!
//! [outbox]
//! poll_interval_secs = 5
//! batch_size = 100
//! max_attempts = 10
//!
//! [store]
//! code = "BLR-01"
//! name = "Indiranagar"
//! loyalty_enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SettleError, SettleResult};
use till_db::DbConfig;

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `till.db` in the platform data directory.
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

// =============================================================================
// Outbox Settings
// =============================================================================

/// Background worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxSettings {
    /// Interval between poll cycles (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Rows handled per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Attempts before a row is left for manual attention.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            poll_interval_secs: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl OutboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// =============================================================================
// Store Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Short store code, used as the register id for the working cart.
    pub code: String,

    #[serde(default)]
    pub name: String,

    /// Apply loyalty points earned/redeemed on sales.
    #[serde(default = "default_true")]
    pub loyalty_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            code: "MAIN".to_string(),
            name: "Main Store".to_string(),
            loyalty_enabled: true,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettleConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub outbox: OutboxSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl SettleConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SettleResult<Self> {
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

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> SettleResult<()> {
        if self.outbox.batch_size == 0 {
            return Err(SettleError::InvalidConfig(
                "outbox.batch_size must be greater than 0".into(),
            ));
        }
        if self.outbox.max_attempts == 0 {
            return Err(SettleError::InvalidConfig(
                "outbox.max_attempts must be greater than 0".into(),
            ));
        }
        if self.store.code.trim().is_empty() {
            return Err(SettleError::InvalidConfig("store.code is required".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(secs) = std::env::var("TILL_OUTBOX_POLL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.outbox.poll_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid TILL_OUTBOX_POLL_SECS"),
            }
        }

        if let Ok(batch) = std::env::var("TILL_OUTBOX_BATCH") {
            match batch.parse::<u32>() {
                Ok(b) => self.outbox.batch_size = b,
                Err(_) => warn!(value = %batch, "Ignoring invalid TILL_OUTBOX_BATCH"),
            }
        }

        if let Ok(flag) = std::env::var("TILL_LOYALTY_ENABLED") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.store.loyalty_enabled = true,
                "0" | "false" | "no" => self.store.loyalty_enabled = false,
                _ => warn!(value = %flag, "Ignoring invalid TILL_LOYALTY_ENABLED"),
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "till", "pos")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }

    /// Resolved database file path.
    pub fn database_path(&self) -> SettleResult<PathBuf> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }

        let dirs = directories::ProjectDirs::from("com", "till", "pos").ok_or_else(|| {
            SettleError::ConfigLoadFailed("could not determine app data directory".into())
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("till.db"))
    }

    pub fn db_config(&self) -> SettleResult<DbConfig> {
        Ok(DbConfig::new(self.database_path()?).max_connections(self.database.max_connections))
    }
}

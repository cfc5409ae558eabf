//! # Engine Configuration
//!
//! Configuration for the engine: database, loyalty ladder, checkout
//! retries, session lifetime and role names.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     EMPORIUM_DB_PATH=/var/lib/emporium/emporium.db                     │
//! │     EMPORIUM_CHECKOUT_RETRIES=0                                        │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/engine/engine.toml (Linux)                               │
//! │     ~/Library/Application Support/com.emporium.engine/engine.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "emporium.db"
//! max_connections = 5
//!
//! [loyalty]
//! points_per_dollar = 10
//! tiers = [
//!     { tier = "bronze",   min_points = 50,  discount_bps = 0 },
//!     { tier = "silver",   min_points = 100, discount_bps = 500 },
//!     { tier = "gold",     min_points = 150, discount_bps = 1000 },
//!     { tier = "platinum", min_points = 300, discount_bps = 1500 },
//! ]
//!
//! [checkout]
//! conflict_retries = 1
//!
//! [session]
//! ttl_secs = 86400
//!
//! [roles]
//! owner_role = "Owner"
//! ```

use directories::ProjectDirs;
use emporium_core::LoyaltySchedule;
use emporium_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path; `:memory:` for a throwaway database.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("emporium.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseSettings {
    /// Pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

// =============================================================================
// Checkout Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Automatic retries after a concurrency conflict (0 or 1).
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u8,
}

fn default_conflict_retries() -> u8 {
    1
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            conflict_retries: default_conflict_retries(),
        }
    }
}

// =============================================================================
// Session Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Lifetime of a session value after its last write.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
}

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings {
            ttl_secs: default_session_ttl(),
        }
    }
}

// =============================================================================
// Role Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSettings {
    /// Role allowed to restock any shop and edit stock levels.
    #[serde(default = "default_owner_role")]
    pub owner_role: String,
}

fn default_owner_role() -> String {
    "Owner".to_string()
}

impl Default for RoleSettings {
    fn default() -> Self {
        RoleSettings {
            owner_role: default_owner_role(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub loyalty: LoyaltySchedule,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub session: SessionSettings,

    #[serde(default)]
    pub roles: RoleSettings,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with an in-memory database.
    pub fn in_memory() -> Self {
        let mut config = Self::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }

    /// Loads file, then environment, then validates.
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
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

    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load engine config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> EngineResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| EngineError::Config("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Engine config saved");
        Ok(())
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(EngineError::Config("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(EngineError::Config(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.checkout.conflict_retries > 1 {
            return Err(EngineError::Config(format!(
                "checkout.conflict_retries must be 0 or 1, got {}",
                self.checkout.conflict_retries
            )));
        }

        if self.session.ttl_secs == 0 {
            return Err(EngineError::Config("session.ttl_secs must be greater than 0".into()));
        }

        if self.roles.owner_role.trim().is_empty() {
            return Err(EngineError::Config("roles.owner_role must not be empty".into()));
        }

        self.loyalty
            .validate()
            .map_err(|e| EngineError::Config(format!("loyalty: {e}")))?;

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("EMPORIUM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("EMPORIUM_DB_MAX_CONNECTIONS") {
            if let Ok(n) = max.parse::<u32>() {
                self.database.max_connections = n;
            }
        }

        if let Ok(retries) = std::env::var("EMPORIUM_CHECKOUT_RETRIES") {
            if let Ok(n) = retries.parse::<u8>() {
                debug!(retries = n, "Overriding checkout retries from environment");
                self.checkout.conflict_retries = n;
            }
        }

        if let Ok(ttl) = std::env::var("EMPORIUM_SESSION_TTL_SECS") {
            if let Ok(n) = ttl.parse::<u64>() {
                self.session.ttl_secs = n;
            }
        }

        if let Ok(role) = std::env::var("EMPORIUM_OWNER_ROLE") {
            self.roles.owner_role = role;
        }
    }

    /// Platform config file location.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "emporium", "engine")
            .map(|dirs| dirs.config_dir().join("engine.toml"))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::Tier;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.checkout.conflict_retries, 1);
        assert_eq!(config.session.ttl_secs, 86_400);
        assert_eq!(config.roles.owner_role, "Owner");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            [checkout]
            conflict_retries = 0

            [loyalty]
            points_per_dollar = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.checkout.conflict_retries, 0);
        assert_eq!(config.loyalty.points_per_dollar, 5);
        assert_eq!(config.loyalty.tier_for(150), Tier::Gold);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_rejects_more_than_one_retry() {
        let mut config = EngineConfig::default();
        config.checkout.conflict_retries = 3;
        assert!(matches!(config.validate(), Err(EngineError::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = EngineConfig::in_memory();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EngineConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.database.path, PathBuf::from(":memory:"));
        assert_eq!(back.loyalty, config.loyalty);
    }

    #[test]
    fn test_memory_path_uses_in_memory_pool() {
        let config = EngineConfig::in_memory();
        assert_eq!(config.database.db_config().max_connections, 1);
    }
}

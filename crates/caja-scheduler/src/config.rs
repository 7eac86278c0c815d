//! # Scheduler Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     CAJA_DATABASE_PATH=/var/lib/caja/caja.db                           │
//! │     CAJA_TICK_INTERVAL_SECS=60                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/caja/caja.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.caja.caja/caja.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-client settings (timezone, automation switch) live in the database.
//! The `[defaults]` section only seeds a client's row on first access.
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/caja/caja.db"
//! max_connections = 5
//!
//! [scheduler]
//! tick_interval_secs = 60
//! throttle_minutes = 5
//! recent_execution_minutes = 5
//! open_window_minutes = 120
//! close_window_minutes = 60
//! watchdog_interval_secs = 60
//! autostart = true
//!
//! [defaults]
//! timezone = "America/Argentina/Buenos_Aires"
//! notification_lead_minutes = 5
//! auto_schedule_enabled = true
//! ars_minor_per_usd = 100000   # 1000.00 ARS per USD
//!
//! [export]
//! enabled = true
//! directory = "/var/lib/caja/reports"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use caja_core::validation::{validate_notification_lead, validate_timezone};
use caja_core::{
    ClientConfigDefaults, ExchangeRate, ExecutionWindows, DEFAULT_CLOSE_WINDOW_MINUTES,
    DEFAULT_NOTIFICATION_LEAD_MINUTES, DEFAULT_OPEN_WINDOW_MINUTES, DEFAULT_TIMEZONE,
    RECENT_EXECUTION_WINDOW_MINUTES, TICK_THROTTLE_MINUTES,
};

use crate::error::{SchedulerError, SchedulerResult};

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Created if missing.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("com", "caja", "caja")
        .map(|dirs| dirs.data_dir().join("caja.db"))
        .unwrap_or_else(|| PathBuf::from("caja.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Scheduler Settings
// =============================================================================

/// Timer and window settings for the automation loop.
///
/// ## Tick Throttle
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  The timer fires every `tick_interval_secs`. A tick only runs client   │
/// │  checks when the UTC minute is a multiple of `throttle_minutes`.       │
/// │                                                                         │
/// │  12:00 ✓   12:01 ✗   12:02 ✗   12:03 ✗   12:04 ✗   12:05 ✓   ...       │
/// │                                                                         │
/// │  The log's `recent_execution_minutes` lookback is the real guard; the  │
/// │  throttle only keeps storage load down.                                │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// 1 disables the throttle.
    #[serde(default = "default_throttle_minutes")]
    pub throttle_minutes: u32,

    #[serde(default = "default_recent_execution_minutes")]
    pub recent_execution_minutes: u32,

    #[serde(default = "default_open_window")]
    pub open_window_minutes: u32,

    #[serde(default = "default_close_window")]
    pub close_window_minutes: u32,

    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,

    /// Start the loop when the daemon boots.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

fn default_tick_interval() -> u64 {
    60
}
fn default_throttle_minutes() -> u32 {
    TICK_THROTTLE_MINUTES
}
fn default_recent_execution_minutes() -> u32 {
    RECENT_EXECUTION_WINDOW_MINUTES
}
fn default_open_window() -> u32 {
    DEFAULT_OPEN_WINDOW_MINUTES
}
fn default_close_window() -> u32 {
    DEFAULT_CLOSE_WINDOW_MINUTES
}
fn default_watchdog_interval() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            tick_interval_secs: default_tick_interval(),
            throttle_minutes: default_throttle_minutes(),
            recent_execution_minutes: default_recent_execution_minutes(),
            open_window_minutes: default_open_window(),
            close_window_minutes: default_close_window(),
            watchdog_interval_secs: default_watchdog_interval(),
            autostart: true,
        }
    }
}

// =============================================================================
// Client Defaults
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_notification_lead")]
    pub notification_lead_minutes: u32,

    #[serde(default = "default_true")]
    pub auto_schedule_enabled: bool,

    /// ARS minor units per 1 USD for a client's first register.
    #[serde(default = "default_ars_minor_per_usd")]
    pub ars_minor_per_usd: i64,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_notification_lead() -> u32 {
    DEFAULT_NOTIFICATION_LEAD_MINUTES
}
fn default_ars_minor_per_usd() -> i64 {
    100_000
}

impl Default for DefaultsSettings {
    fn default() -> Self {
        DefaultsSettings {
            timezone: default_timezone(),
            notification_lead_minutes: default_notification_lead(),
            auto_schedule_enabled: true,
            ars_minor_per_usd: default_ars_minor_per_usd(),
        }
    }
}

// =============================================================================
// Export Settings
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportSettings {
    #[serde(default)]
    pub enabled: bool,

    /// Where `JsonFileExporter` writes. Required when enabled.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub defaults: DefaultsSettings,

    #[serde(default)]
    pub export: ExportSettings,
}

impl SchedulerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (caja.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SchedulerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scheduler config from file");
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
            warn!("Failed to load scheduler config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> SchedulerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SchedulerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SchedulerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SchedulerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Scheduler config saved");
        Ok(())
    }

    pub fn validate(&self) -> SchedulerResult<()> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "tick_interval_secs must be greater than 0".into(),
            ));
        }
        if self.scheduler.watchdog_interval_secs == 0 {
            return Err(SchedulerError::InvalidConfig(
                "watchdog_interval_secs must be greater than 0".into(),
            ));
        }
        if self.scheduler.throttle_minutes == 0 || self.scheduler.throttle_minutes > 60 {
            return Err(SchedulerError::InvalidConfig(
                "throttle_minutes must be between 1 and 60".into(),
            ));
        }
        if self.scheduler.open_window_minutes >= 1440 || self.scheduler.close_window_minutes >= 1440 {
            return Err(SchedulerError::InvalidConfig(
                "execution windows must be shorter than a day".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_connections must be greater than 0".into(),
            ));
        }

        validate_timezone(&self.defaults.timezone)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        validate_notification_lead(self.defaults.notification_lead_minutes)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;
        ExchangeRate::from_ars_minor_per_usd(self.defaults.ars_minor_per_usd)
            .map_err(|e| SchedulerError::InvalidConfig(e.to_string()))?;

        if self.export.enabled && self.export.directory.is_none() {
            return Err(SchedulerError::InvalidConfig(
                "export.directory is required when export is enabled".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies `CAJA_*` overrides read through `lookup`.
    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("CAJA_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(secs) = lookup("CAJA_TICK_INTERVAL_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.scheduler.tick_interval_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid CAJA_TICK_INTERVAL_SECS"),
            }
        }

        if let Some(tz) = lookup("CAJA_DEFAULT_TIMEZONE") {
            self.defaults.timezone = tz;
        }

        if let Some(autostart) = lookup("CAJA_AUTOSTART") {
            match autostart.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.scheduler.autostart = true,
                "0" | "false" | "no" | "off" => self.scheduler.autostart = false,
                _ => warn!(value = %autostart, "Ignoring invalid CAJA_AUTOSTART"),
            }
        }

        if let Some(dir) = lookup("CAJA_EXPORT_DIR") {
            self.export.enabled = true;
            self.export.directory = Some(PathBuf::from(dir));
        }

        if let Some(rate) = lookup("CAJA_ARS_PER_USD") {
            match rate.parse::<i64>() {
                Ok(r) => self.defaults.ars_minor_per_usd = r,
                Err(_) => warn!(value = %rate, "Ignoring invalid CAJA_ARS_PER_USD"),
            }
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "caja", "caja")
            .map(|dirs| dirs.config_dir().join("caja.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.watchdog_interval_secs)
    }

    pub fn execution_windows(&self) -> ExecutionWindows {
        ExecutionWindows {
            open_minutes: self.scheduler.open_window_minutes,
            close_minutes: self.scheduler.close_window_minutes,
        }
    }

    pub fn client_defaults(&self) -> ClientConfigDefaults {
        ClientConfigDefaults {
            timezone: self.defaults.timezone.clone(),
            auto_schedule_enabled: self.defaults.auto_schedule_enabled,
            notification_lead_minutes: self.defaults.notification_lead_minutes,
        }
    }

    pub fn default_exchange_rate(&self) -> SchedulerResult<ExchangeRate> {
        Ok(ExchangeRate::from_ars_minor_per_usd(self.defaults.ars_minor_per_usd)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.throttle_minutes, 5);
        assert_eq!(config.execution_windows(), ExecutionWindows::default());
        assert_eq!(config.client_defaults(), ClientConfigDefaults::default());
        assert!(!config.export.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SchedulerConfig::default();

        config.scheduler.tick_interval_secs = 0;
        assert!(config.validate().unwrap_err().is_config_error());
        config.scheduler.tick_interval_secs = 60;

        config.defaults.timezone = "Mars/Olympus".into();
        assert!(config.validate().is_err());
        config.defaults.timezone = "Europe/Madrid".into();
        assert!(config.validate().is_ok());

        config.defaults.ars_minor_per_usd = 0;
        assert!(config.validate().is_err());
        config.defaults.ars_minor_per_usd = 95_000;

        config.export.enabled = true;
        assert!(config.validate().is_err());
        config.export.directory = Some(PathBuf::from("/tmp/reports"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("CAJA_DATABASE_PATH", "/data/caja.db"),
            ("CAJA_TICK_INTERVAL_SECS", "30"),
            ("CAJA_AUTOSTART", "off"),
            ("CAJA_EXPORT_DIR", "/data/reports"),
            ("CAJA_ARS_PER_USD", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = SchedulerConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/data/caja.db"));
        assert_eq!(config.scheduler.tick_interval_secs, 30);
        assert!(!config.scheduler.autostart);
        assert!(config.export.enabled);
        assert_eq!(config.export.directory, Some(PathBuf::from("/data/reports")));
        // Unparseable values keep the previous setting
        assert_eq!(config.defaults.ars_minor_per_usd, 100_000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("caja.toml");

        let mut config = SchedulerConfig::default();
        config.scheduler.tick_interval_secs = 15;
        config.defaults.timezone = "America/Montevideo".into();
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[scheduler]"));
        assert!(contents.contains("[defaults]"));

        let loaded: SchedulerConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.scheduler.tick_interval_secs, 15);
        assert_eq!(loaded.defaults.timezone, "America/Montevideo");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: SchedulerConfig = toml::from_str("[scheduler]\nautostart = false\n").unwrap();
        assert!(!config.scheduler.autostart);
        assert_eq!(config.scheduler.open_window_minutes, 120);
        assert_eq!(config.defaults.timezone, DEFAULT_TIMEZONE);
    }
}

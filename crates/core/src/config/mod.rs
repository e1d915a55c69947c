//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SATCHEL_*)
//! 2. TOML config file (if SATCHEL_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::variant::DensityClass;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SATCHEL_*)
/// 2. TOML config file (if SATCHEL_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite group/item database.
    ///
    /// Set via SATCHEL_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory holding persisted response bodies and header files.
    ///
    /// Set via SATCHEL_FILES_DIR environment variable.
    #[serde(default = "default_files_dir")]
    pub files_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SATCHEL_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SATCHEL_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SATCHEL_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Display pixel-scale factor used to pick image variants.
    ///
    /// Set via SATCHEL_DISPLAY_SCALE environment variable.
    #[serde(default = "default_display_scale")]
    pub display_scale: f64,

    /// Number of responses held by the in-memory cache in front of the store.
    ///
    /// Set via SATCHEL_MEMORY_CACHE_ENTRIES environment variable.
    #[serde(default = "default_memory_cache_entries")]
    pub memory_cache_entries: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./satchel-cache.sqlite")
}

fn default_files_dir() -> PathBuf {
    PathBuf::from("./satchel-files")
}

fn default_user_agent() -> String {
    "satchel/0.1".into()
}

fn default_max_bytes() -> usize {
    20_971_520 // 20MB
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_display_scale() -> f64 {
    2.0
}

fn default_memory_cache_entries() -> usize {
    256
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            files_dir: default_files_dir(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            display_scale: default_display_scale(),
            memory_cache_entries: default_memory_cache_entries(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Density class derived from the configured display scale.
    pub fn density(&self) -> DensityClass {
        DensityClass::from_scale(self.display_scale)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SATCHEL_`
    /// 2. TOML file from `SATCHEL_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SATCHEL_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SATCHEL_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.db_path, PathBuf::from("./satchel-cache.sqlite"));
        assert_eq!(config.files_dir, PathBuf::from("./satchel-files"));
        assert_eq!(config.user_agent, "satchel/0.1");
        assert_eq!(config.max_bytes, 20_971_520);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.memory_cache_entries, 256);
        assert_eq!(config.density(), DensityClass::Two);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_density_from_scale() {
        let config = AppConfig { display_scale: 3.0, ..Default::default() };
        assert_eq!(config.density(), DensityClass::Three);

        let config = AppConfig { display_scale: 1.5, ..Default::default() };
        assert_eq!(config.density(), DensityClass::Other);
    }
}

//! Configuration file resolution and loading
//!
//! Config file lookup follows this priority order:
//! 1. Command-line argument (highest priority)
//! 2. `<APP>_CONFIG` environment variable (e.g. `TSMIX_CONFIG`)
//! 3. User config directory (`~/.config/<app>/config.toml` on Linux)
//! 4. System config file (`/etc/<app>/config.toml`, Unix only)
//! 5. No file: built-in defaults
//!
//! Missing files found through the environment or the platform locations are
//! not fatal: a warning is logged and resolution continues. A path passed
//! explicitly on the command line must exist.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Logging configuration shared by all binaries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locates the configuration file for one application
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    app_name: String,
}

impl ConfigResolver {
    /// Create a resolver for `app_name` (used for directory and env var names)
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
        }
    }

    /// Name of the environment variable consulted for an explicit path
    pub fn env_var_name(&self) -> String {
        format!("{}_CONFIG", self.app_name.to_uppercase().replace('-', "_"))
    }

    /// Resolve the configuration file path
    ///
    /// Returns `Ok(None)` when no file is configured anywhere, in which case
    /// callers use built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `cli_path` is given but does not exist.
    pub fn resolve(&self, cli_path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = cli_path {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let env_var = self.env_var_name();
        if let Ok(value) = std::env::var(&env_var) {
            let path = PathBuf::from(value);
            if path.exists() {
                return Ok(Some(path));
            }
            warn!(
                "{} points to missing file {}, falling back to defaults",
                env_var,
                path.display()
            );
        }

        Ok(self.platform_candidates().into_iter().find(|p| p.exists()))
    }

    /// Platform config file locations, most specific first
    fn platform_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(&self.app_name).join("config.toml"));
        }
        if cfg!(unix) {
            candidates.push(PathBuf::from("/etc").join(&self.app_name).join("config.toml"));
        }
        candidates
    }
}

/// Parse a TOML document into `T`
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
}

/// Load `T` from `path`, or `T::default()` when no path was resolved
pub fn load_toml<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = parse_toml(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(ConfigResolver::new("tsmix").env_var_name(), "TSMIX_CONFIG");
        assert_eq!(ConfigResolver::new("tsmix-sim").env_var_name(), "TSMIX_SIM_CONFIG");
    }

    #[test]
    fn test_logging_default_level() {
        assert_eq!(LoggingConfig::default().level, "info");
    }

    #[test]
    fn test_parse_toml_partial_logging_section() {
        let logging: LoggingConfig = parse_toml("").unwrap();
        assert_eq!(logging, LoggingConfig::default());

        let logging: LoggingConfig = parse_toml("level = \"debug\"").unwrap();
        assert_eq!(logging.level, "debug");
    }

    #[test]
    fn test_parse_toml_error_is_config_error() {
        let err = parse_toml::<LoggingConfig>("level = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_toml_without_path_uses_default() {
        let logging: LoggingConfig = load_toml(None).unwrap();
        assert_eq!(logging.level, "info");
    }
}

//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - Environment variables (`EVDI_LIBRARY_PATH`, consumed by the loader)
//! - CLI arguments

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Resolve the default configuration file location.
///
/// XDG config dir when available, `/etc/lamco-evdi` otherwise.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir().map_or_else(
        || PathBuf::from("/etc/lamco-evdi/config.toml"),
        |d| d.join("lamco-evdi/config.toml"),
    )
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Library location configuration
    #[serde(default)]
    pub library: LibraryConfig,
    /// Connect defaults and downgrade policy
    #[serde(default)]
    pub connect: ConnectConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where to find `libevdi.so`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Explicit path to the shared library. Checked before any scanning.
    pub path: Option<PathBuf>,
    /// Directories scanned before the built-in search list.
    pub extra_search_dirs: Vec<PathBuf>,
}

/// Connect defaults and the area-limit downgrade policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Default pixel-area limit (width × height). Forwarded verbatim to
    /// the driver; 0 requests no cap from this side.
    pub pixel_area_limit: u32,
    /// Default pixel-per-second limit (area × refresh). Forwarded
    /// verbatim; 0 requests no cap from this side.
    pub pixel_per_second_limit: u32,
    /// What to do when a non-zero area limit cannot reach the installed
    /// library (pre-1.12 without a native compat entry point).
    pub on_unsupported_area_limit: AreaLimitPolicy,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            pixel_area_limit: 0,
            pixel_per_second_limit: 0,
            on_unsupported_area_limit: AreaLimitPolicy::Warn,
        }
    }
}

/// Behavior when the installed library cannot honor the pixel-area limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaLimitPolicy {
    /// Log a warning and connect without the limit (the original shim
    /// behavior, made visible).
    #[default]
    Warn,
    /// Refuse to connect rather than silently drop the caller's cap.
    Reject,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: pretty, compact, json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config file: {path}"))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides (CLI wins over file values)
    pub fn with_overrides(mut self, library_path: Option<PathBuf>) -> Self {
        if library_path.is_some() {
            self.library.path = library_path;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Invalid logging.level: {other}"),
        }
        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => anyhow::bail!("Invalid logging.format: {other}"),
        }
        if let Some(path) = &self.library.path {
            if !path.exists() {
                anyhow::bail!("library.path does not exist: {}", path.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connect]
            pixel_area_limit = 8294400
            on_unsupported_area_limit = "reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.connect.pixel_area_limit, 8_294_400);
        assert_eq!(config.connect.pixel_per_second_limit, 0);
        assert_eq!(
            config.connect.on_unsupported_area_limit,
            AreaLimitPolicy::Reject
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn cli_override_wins_over_file_value() {
        let config: Config = toml::from_str(
            r#"
            [library]
            path = "/usr/lib/libevdi.so.1"
            "#,
        )
        .unwrap();

        let config = config.with_overrides(Some(PathBuf::from("/opt/displaylink/libevdi.so")));
        assert_eq!(
            config.library.path,
            Some(PathBuf::from("/opt/displaylink/libevdi.so"))
        );

        let untouched = Config::default().with_overrides(None);
        assert_eq!(untouched.library.path, None);
    }

    #[test]
    fn bad_logging_level_is_rejected() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "verbose"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}

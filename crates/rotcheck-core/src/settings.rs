//! Persistent user settings for rotcheck
//!
//! Settings are stored in a TOML configuration file at:
//! - Linux: `~/.config/rotcheck/rotcheck_config.toml`
//! - macOS: `~/Library/Application Support/rotcheck/rotcheck_config.toml`
//! - Windows: `%APPDATA%\rotcheck\rotcheck_config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! [test]
//! chunk_size = "1MiB"
//! progress_interval = "256MiB"
//! throughput_window = 64
//! sync_on_complete = true
//!
//! [behavior]
//! skip_confirmation = false
//! quiet = false
//! json = false
//! ```
//!
//! Sizes use the same syntax as the command line, except that a bare number means
//! bytes.

use crate::config::Config;
use crate::size::parse_size_with_default_unit;
use crate::throughput::DEFAULT_THROUGHPUT_WINDOW;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file name
const CONFIG_FILE_NAME: &str = "rotcheck_config.toml";

/// Application name for config directory
const APP_NAME: &str = "rotcheck";

/// User settings loaded from configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Engine settings
    pub test: TestSettings,

    /// Behavior settings
    pub behavior: BehaviorSettings,
}

/// Settings for the write and verify engines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TestSettings {
    /// Chunk size (e.g., "1MiB", "4M", "65536")
    pub chunk_size: String,

    /// Bytes between progress reports (e.g., "256MiB")
    pub progress_interval: String,

    /// Number of speed samples kept for the trimmed average
    pub throughput_window: usize,

    /// Whether to sync the file to disk after writing
    pub sync_on_complete: bool,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            chunk_size: "1MiB".to_string(),
            progress_interval: "256MiB".to_string(),
            throughput_window: DEFAULT_THROUGHPUT_WINDOW,
            sync_on_complete: true,
        }
    }
}

/// General behavior settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Whether to skip confirmation prompts by default
    pub skip_confirmation: bool,

    /// Whether to suppress non-error output
    pub quiet: bool,

    /// Output results in JSON format by default
    pub json: bool,
}

impl Settings {
    /// Load settings from the configuration file
    ///
    /// Returns default settings if the file doesn't exist or can't be parsed
    pub fn load() -> Self {
        Self::load_from_path(Self::config_path())
    }

    /// Load settings from a specific path
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            tracing::debug!("No config path available, using defaults");
            return Self::default();
        };

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match Self::read_from_path(&path) {
            Ok(settings) => {
                tracing::debug!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Read and parse an existing settings file
    pub fn read_from_path(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| SettingsError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            SettingsError::Deserialize(source) => SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse settings from TOML text
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        toml::from_str(contents).map_err(SettingsError::Deserialize)
    }

    /// Save settings to the configuration file
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        self.save_to_path(Self::config_path())
    }

    /// Save settings to a specific path
    pub fn save_to_path(&self, path: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
        let path = path.ok_or(SettingsError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let contents = toml::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        std::fs::write(&path, contents).map_err(|e| SettingsError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::info!("Saved settings to {:?}", path);
        Ok(path)
    }

    /// Convert to a runtime [`Config`], validating every value
    pub fn to_config(&self) -> Result<Config, SettingsError> {
        let chunk_size = parse_setting("test.chunk_size", &self.test.chunk_size)?;
        let chunk_size = usize::try_from(chunk_size).map_err(|_| SettingsError::InvalidValue {
            key: "test.chunk_size",
            message: format!("{} does not fit in memory", self.test.chunk_size),
        })?;

        let progress_interval =
            parse_setting("test.progress_interval", &self.test.progress_interval)?;
        if progress_interval == 0 {
            return Err(SettingsError::InvalidValue {
                key: "test.progress_interval",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.test.throughput_window == 0 {
            return Err(SettingsError::InvalidValue {
                key: "test.throughput_window",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Config::new()
            .chunk_size(chunk_size)
            .progress_interval(progress_interval)
            .throughput_window(self.test.throughput_window)
            .sync_on_complete(self.test.sync_on_complete))
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join(CONFIG_FILE_NAME))
    }

    /// Get the path to the configuration directory
    pub fn config_dir() -> Option<PathBuf> {
        dirs_next::config_dir().map(|p| p.join(APP_NAME))
    }

    /// Check if a configuration file exists
    pub fn config_exists() -> bool {
        Self::config_path().is_some_and(|p| p.exists())
    }

    /// Generate a default configuration file content as a string
    pub fn default_config_string() -> String {
        let default = Self::default();
        toml::to_string_pretty(&default)
            .unwrap_or_else(|_| String::from("# Failed to generate default config"))
    }
}

fn parse_setting(key: &'static str, value: &str) -> Result<u64, SettingsError> {
    parse_size_with_default_unit(value, 1).map_err(|e| SettingsError::InvalidValue {
        key,
        message: e.to_string(),
    })
}

/// Errors that can occur when working with settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// No configuration directory available
    #[error("Could not determine configuration directory")]
    NoConfigDir,

    /// Failed to read or write config file
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path that caused the error
        path: PathBuf,
        /// The underlying error
        source: std::io::Error,
    },

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    Serialize(toml::ser::Error),

    /// Failed to deserialize settings
    #[error("Failed to parse settings: {0}")]
    Deserialize(toml::de::Error),

    /// Failed to parse a settings file
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that could not be parsed
        path: PathBuf,
        /// The underlying error
        source: toml::de::Error,
    },

    /// A setting has an unusable value
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Dotted setting name
        key: &'static str,
        /// What is wrong with it
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PROGRESS_INTERVAL, MAX_CHUNK_SIZE};
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.test.chunk_size, "1MiB");
        assert_eq!(settings.test.progress_interval, "256MiB");
        assert_eq!(settings.test.throughput_window, DEFAULT_THROUGHPUT_WINDOW);
        assert!(settings.test.sync_on_complete);
        assert!(!settings.behavior.skip_confirmation);
        assert!(!settings.behavior.quiet);
        assert!(!settings.behavior.json);
    }

    #[test]
    fn test_default_settings_match_default_config() {
        let config = Settings::default().to_config().unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
    }

    #[test]
    fn test_settings_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotcheck_config.toml");

        let settings = Settings {
            test: TestSettings {
                chunk_size: "4M".to_string(),
                progress_interval: "1GiB".to_string(),
                throughput_window: 16,
                sync_on_complete: false,
            },
            behavior: BehaviorSettings {
                skip_confirmation: true,
                quiet: false,
                json: true,
            },
        };

        settings.save_to_path(Some(config_path.clone())).unwrap();
        assert!(config_path.exists());

        let loaded = Settings::load_from_path(Some(config_path));
        assert_eq!(settings, loaded);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let settings =
            Settings::load_from_path(Some(PathBuf::from("/nonexistent/rotcheck_config.toml")));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_no_path() {
        let settings = Settings::load_from_path(None);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotcheck_config.toml");

        let partial_config = r#"
[test]
chunk_size = "64KiB"
"#;
        std::fs::write(&config_path, partial_config).unwrap();

        let settings = Settings::load_from_path(Some(config_path));

        assert_eq!(settings.test.chunk_size, "64KiB");
        assert_eq!(settings.test.progress_interval, "256MiB");
        assert!(settings.test.sync_on_complete);
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotcheck_config.toml");

        std::fs::write(&config_path, "this is not valid toml {{{{").unwrap();

        let settings = Settings::load_from_path(Some(config_path));
        assert_eq!(settings, Settings::default());
    }

    // -------------------------------------------------------------------------
    // to_config tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_to_config_parses_sizes() {
        let mut settings = Settings::default();
        settings.test.chunk_size = "65536".to_string();
        settings.test.progress_interval = "1G".to_string();
        settings.test.sync_on_complete = false;

        let config = settings.to_config().unwrap();
        assert_eq!(config.chunk_size, 65_536);
        assert_eq!(config.progress_interval, 1_000_000_000);
        assert!(!config.sync_on_complete);
    }

    #[test]
    fn test_to_config_clamps_chunk_size() {
        let mut settings = Settings::default();
        settings.test.chunk_size = "1GiB".to_string();
        assert_eq!(settings.to_config().unwrap().chunk_size, MAX_CHUNK_SIZE);
    }

    #[test]
    fn test_to_config_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.test.chunk_size = "lots".to_string();
        assert!(matches!(
            settings.to_config(),
            Err(SettingsError::InvalidValue {
                key: "test.chunk_size",
                ..
            })
        ));

        let mut settings = Settings::default();
        settings.test.progress_interval = "0".to_string();
        assert!(settings.to_config().is_err());

        let mut settings = Settings::default();
        settings.test.throughput_window = 0;
        assert!(settings.to_config().is_err());
    }

    #[test]
    fn test_from_toml_error() {
        assert!(matches!(
            Settings::from_toml("[test]\nthroughput_window = \"many\""),
            Err(SettingsError::Deserialize(_))
        ));
    }

    // -------------------------------------------------------------------------
    // Path and misc tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_default_config_string() {
        let config_str = Settings::default_config_string();
        assert!(config_str.contains("[test]"));
        assert!(config_str.contains("[behavior]"));
        assert!(config_str.contains("chunk_size"));
        assert!(config_str.contains("throughput_window"));
    }

    #[test]
    fn test_config_path() {
        if let Some(p) = Settings::config_path() {
            assert!(p.to_string_lossy().contains("rotcheck"));
            assert!(p.to_string_lossy().ends_with("rotcheck_config.toml"));
        }
    }

    #[test]
    fn test_read_from_path_reports_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("rotcheck_config.toml");
        std::fs::write(&config_path, "[test\nchunk_size =").unwrap();

        let err = Settings::read_from_path(&config_path).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("rotcheck_config.toml"));
    }

    #[test]
    fn test_read_from_path_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Settings::read_from_path(&temp_dir.path().join("gone.toml")).unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_save_to_none_path() {
        let settings = Settings::default();
        let result = settings.save_to_path(None);
        assert!(matches!(result, Err(SettingsError::NoConfigDir)));
    }

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::NoConfigDir;
        assert!(err.to_string().contains("configuration directory"));

        let err = SettingsError::InvalidValue {
            key: "test.chunk_size",
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for test.chunk_size: bad");
    }
}

use crate::services::remote::{ThumbnailFormat, ThumbnailSize, WriteMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub transfers: TransferConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Defaults applied to transfer requests built by the navigator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransferConfig {
    /// Local file a document preview is rendered into
    #[serde(default = "default_preview_destination")]
    pub preview_destination: PathBuf,

    /// Local file a thumbnail is rendered into
    #[serde(default = "default_thumbnail_destination")]
    pub thumbnail_destination: PathBuf,

    #[serde(default)]
    pub thumbnail_format: ThumbnailFormat,

    #[serde(default)]
    pub thumbnail_size: ThumbnailSize,

    /// Whether uploads may replace an existing file
    #[serde(default)]
    pub upload_mode: WriteMode,
}

fn default_preview_destination() -> PathBuf {
    PathBuf::from("tmp.pdf")
}

fn default_thumbnail_destination() -> PathBuf {
    PathBuf::from("tmp.jpg")
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            preview_destination: default_preview_destination(),
            thumbnail_destination: default_thumbnail_destination(),
            thumbnail_format: ThumbnailFormat::default(),
            thumbnail_size: ThumbnailSize::default(),
            upload_mode: WriteMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transfers.preview_destination.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "preview_destination cannot be empty".to_string(),
            ));
        }
        if self.transfers.thumbnail_destination.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "thumbnail_destination cannot be empty".to_string(),
            ));
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "logging filter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transfers.preview_destination, PathBuf::from("tmp.pdf"));
        assert_eq!(config.transfers.thumbnail_destination, PathBuf::from("tmp.jpg"));
        assert_eq!(config.transfers.thumbnail_format, ThumbnailFormat::Jpeg);
        assert_eq!(config.transfers.thumbnail_size, ThumbnailSize::W1024H768);
        assert_eq!(config.transfers.upload_mode, WriteMode::Add);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"transfers":{"upload_mode":"overwrite"}}"#).unwrap();
        assert_eq!(config.transfers.upload_mode, WriteMode::Overwrite);
        assert_eq!(config.transfers.preview_destination, PathBuf::from("tmp.pdf"));
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.transfers.thumbnail_size = ThumbnailSize::W128H128;
        config.logging.filter = "cloud_explorer=debug".to_string();
        config.save_to_file(&path).unwrap();

        assert_eq!(Config::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let missing = Config::load_from_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::IoError(_))));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from_file(&bad),
            Err(ConfigError::ParseError(_))
        ));

        let empty_filter = dir.path().join("empty.json");
        std::fs::write(&empty_filter, r#"{"logging":{"filter":" "}}"#).unwrap();
        assert!(matches!(
            Config::load_from_file(&empty_filter),
            Err(ConfigError::ValidationError(_))
        ));
    }
}

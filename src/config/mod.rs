//! Configuration module for the SMS log receiver
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section is optional;
//! `Config::default()` describes a receiver that stores uploads under
//! `SMS_FILE/` relative to the working directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.upload_path.starts_with('/') {
            return Err(ConfigError::ValidationError(format!(
                "Upload path '{}' must start with '/'",
                self.server.upload_path
            )));
        }

        if self.upload.field_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Upload field name cannot be empty".into(),
            ));
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_file_size must be greater than zero".into(),
            ));
        }

        if self.storage.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "Storage base_dir cannot be empty".into(),
            ));
        }

        if self.metrics.enabled {
            if let Ok(addr) = self.server.address.parse::<std::net::SocketAddr>() {
                if addr.port() != 0 && addr.port() == self.metrics.port {
                    return Err(ConfigError::ValidationError(format!(
                        "Metrics port {} collides with the server port",
                        self.metrics.port
                    )));
                }
            }
        }

        Ok(())
    }

    /// Address of the metrics endpoint: the server's host with the metrics port
    pub fn metrics_address(&self) -> String {
        match self.server.address.parse::<std::net::SocketAddr>() {
            Ok(addr) => std::net::SocketAddr::new(addr.ip(), self.metrics.port).to_string(),
            Err(_) => format!("0.0.0.0:{}", self.metrics.port),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    /// Path the multipart upload is POSTed to
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            upload_path: default_upload_path(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_upload_path() -> String {
    "/fileupload.php".to_string()
}

/// Multipart receiving configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Name of the multipart part carrying the CSV file
    #[serde(default = "default_field_name")]
    pub field_name: String,
    /// Largest accepted file part in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Directory for spool files, system temp dir when unset
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            field_name: default_field_name(),
            max_file_size: default_max_file_size(),
            temp_dir: None,
        }
    }
}

impl UploadConfig {
    /// Spool directory to use for incoming parts
    pub fn spool_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_field_name() -> String {
    "smslog".to_string()
}

fn default_max_file_size() -> u64 {
    10485760 // 10MB
}

/// What to do when the target filename already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Replace the existing file (same-second uploads overwrite each other)
    #[default]
    Overwrite,
    /// Append a random token to the filename
    Unique,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub collision: CollisionPolicy,
    /// XML document used for error responses, built-in template when unset
    #[serde(default)]
    pub error_template: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            collision: CollisionPolicy::default(),
            error_template: None,
        }
    }
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("SMS_FILE")
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.upload_path, "/fileupload.php");
        assert_eq!(config.upload.field_name, "smslog");
        assert_eq!(config.storage.base_dir, PathBuf::from("SMS_FILE"));
        assert_eq!(config.storage.collision, CollisionPolicy::Overwrite);
    }

    #[test]
    fn test_config_validation_relative_upload_path() {
        let mut config = Config::default();
        config.server.upload_path = "fileupload.php".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_field_name() {
        let mut config = Config::default();
        config.upload.field_name = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_metrics_port_collision() {
        let mut config = Config::default();
        config.server.address = "127.0.0.1:9090".into();
        config.metrics.port = 9090;
        assert!(config.validate().is_err());

        config.metrics.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_metrics_address() {
        let mut config = Config::default();
        config.server.address = "127.0.0.1:8080".into();
        config.metrics.port = 9191;
        assert_eq!(config.metrics_address(), "127.0.0.1:9191");
    }

    #[test]
    fn test_collision_policy_parsing() {
        let storage: StorageConfig = serde_yaml::from_str("collision: unique").unwrap();
        assert_eq!(storage.collision, CollisionPolicy::Unique);
        assert_eq!(storage.base_dir, PathBuf::from("SMS_FILE"));
    }
}

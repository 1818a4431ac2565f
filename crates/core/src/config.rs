//! Configuration management for gcsdisk

use crate::error::{Error, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory name
const CONFIG_DIR: &str = "gcsdisk";

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Drivers the default registry knows how to build
pub const KNOWN_DRIVERS: &[&str] = &["gcs", "memory"];

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Name of the disk used when none is given
    pub default: String,
    #[serde(default)]
    pub disks: BTreeMap<String, DiskConfig>,
    pub logging: Option<LoggingConfig>,
}

/// A single disk: which driver builds it and where it points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Path to the service-account key file
    #[serde(
        rename = "keyFilename",
        alias = "key_filename",
        skip_serializing_if = "Option::is_none"
    )]
    pub key_filename: Option<PathBuf>,
    /// Default bucket
    pub bucket: String,
}

impl DiskConfig {
    /// A gcs disk
    pub fn gcs(key_filename: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            driver: default_driver(),
            key_filename: Some(key_filename.into()),
            bucket: bucket.into(),
        }
    }

    /// An in-memory disk
    pub fn memory(bucket: impl Into<String>) -> Self {
        Self {
            driver: "memory".to_string(),
            key_filename: None,
            bucket: bucket.into(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_driver() -> String {
    "gcs".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR))
}

/// Get the configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Load configuration from the default location
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from a file
pub fn load_config_from(config_path: &Path) -> Result<ConfigFile> {
    if !config_path.exists() {
        return Err(Error::ConfigNotFound(config_path.to_path_buf()));
    }

    let content = fs::read_to_string(config_path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file: {}", e))
    })?;

    let config: ConfigFile = toml::from_str(&content).map_err(|e| {
        Error::InvalidConfig(format!("Failed to parse config file: {}", e))
    })?;

    Ok(config)
}

/// Save configuration to a file
pub fn save_config_to(config: &ConfigFile, config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    let content = toml::to_string_pretty(config)?;

    fs::write(config_path, content).map_err(|e| {
        Error::Config(format!("Failed to write config file: {}", e))
    })?;

    // Read/write for owner only
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(config_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(config_path, perms)?;
    }

    Ok(())
}

/// Validate a single disk
pub fn validate_disk(name: &str, disk: &DiskConfig) -> Result<()> {
    if !KNOWN_DRIVERS.contains(&disk.driver.as_str()) {
        return Err(Error::InvalidInput(format!(
            "Disk '{}' uses unknown driver '{}' (expected one of: {})",
            name,
            disk.driver,
            KNOWN_DRIVERS.join(", ")
        )));
    }

    if disk.bucket.is_empty() {
        return Err(Error::InvalidInput(format!("Disk '{}': bucket name cannot be empty", name)));
    }

    if disk.driver == "gcs" && disk.key_filename.is_none() {
        return Err(Error::Config(format!(
            "Disk '{}': the gcs driver requires keyFilename",
            name
        )));
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ConfigFile) -> Result<()> {
    if config.disks.is_empty() {
        return Err(Error::Config("No disks configured".to_string()));
    }

    if !config.disks.contains_key(&config.default) {
        return Err(Error::InvalidInput(format!(
            "Default disk '{}' is not configured",
            config.default
        )));
    }

    for (name, disk) in &config.disks {
        validate_disk(name, disk)?;
    }

    Ok(())
}

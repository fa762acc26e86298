//! Configuration management for data schemas
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (data-schema.toml)
//! - Environment variables (DATA_SCHEMA__*)
//!
//! ## Example config file (data-schema.toml):
//! ```toml
//! [store]
//! path = "./schemas"
//! extension = "json"
//!
//! [cache]
//! memoize = true
//!
//! [convert]
//! date_format = "%Y-%m-%d"
//! datetime_format = "%Y-%m-%dT%H:%M:%S"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::schema::FieldType;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSchemaConfig {
    /// Backing store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Schema cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversion defaults
    #[serde(default)]
    pub convert: ConvertConfig,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding schema fixture files
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Extension of fixture files
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Keep loaded schemas between calls
    #[serde(default = "default_true")]
    pub memoize: bool,
}

/// Formats applied to DATE/DATETIME fields that declare none
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvertConfig {
    #[serde(default)]
    pub date_format: Option<String>,

    #[serde(default)]
    pub datetime_format: Option<String>,
}

impl ConvertConfig {
    /// Default format for a field type, if one is configured
    pub fn default_format(&self, field_type: FieldType) -> Option<&str> {
        match field_type {
            FieldType::Date => self.date_format.as_deref(),
            FieldType::DateTime => self.datetime_format.as_deref(),
            _ => None,
        }
    }
}

// Default value functions
fn default_store_path() -> PathBuf {
    PathBuf::from("schemas")
}

fn default_extension() -> String {
    "json".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            extension: default_extension(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { memoize: true }
    }
}

impl DataSchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = [
            "data-schema.toml",
            ".data-schema.toml",
            "config/data-schema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "data-schema") {
            let xdg_config = config_dir.config_dir().join("data-schema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DATA_SCHEMA__CACHE__MEMOIZE=false etc.
        builder = builder.add_source(
            Environment::with_prefix("DATA_SCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the store path (resolves relative paths)
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.path)
        }
    }
}

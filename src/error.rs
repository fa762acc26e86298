//! Error types for data schemas

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Data schema errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Cannot convert {value} to {target}: {reason}")]
    Conversion {
        target: String,
        value: String,
        reason: String,
    },

    #[error("Field access failed for '{field}': {reason}")]
    FieldAccess { field: String, reason: String },

    #[error("Invalid schema configuration: {0}")]
    Configuration(String),

    #[error("Data schema not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub(crate) fn conversion(
        target: impl ToString,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        SchemaError::Conversion {
            target: target.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn field_access(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::FieldAccess {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Whether this is a conversion failure
    pub fn is_conversion(&self) -> bool {
        matches!(self, SchemaError::Conversion { .. })
    }

    /// Whether the requested slot was missing on the record
    pub fn is_field_access(&self) -> bool {
        matches!(self, SchemaError::FieldAccess { .. })
    }

    /// Whether the schema itself is misconfigured
    pub fn is_configuration(&self) -> bool {
        matches!(self, SchemaError::Configuration(_))
    }
}

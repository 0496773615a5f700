//! Error types for template application

use thiserror::Error;

/// Errors that can occur while recommending, applying or rolling back templates
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed template, context or working schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// Rollback requested without a backup
    #[error("Rollback failed: {0}")]
    Rollback(String),

    /// A plugged schema validator rejected the merged schema
    #[error("Validator rejected schema: {}", .0.join("; "))]
    ValidatorRejected(Vec<String>),

    /// Two catalog templates share an id
    #[error("Duplicate template id: {0}")]
    DuplicateTemplate(String),

    /// Template not found in the catalog
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Engine configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Engine configuration is inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML catalog parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// IO error while reading a catalog file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TemplateError {
    /// Create a new Validation error with context
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Rollback error with context
    pub fn rollback(msg: impl Into<String>) -> Self {
        Self::Rollback(msg.into())
    }

    /// Create a new InvalidConfig error with context
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

/// Result type for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

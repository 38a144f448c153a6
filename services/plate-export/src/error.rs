use thiserror::Error;

/// Errors raised while serializing or uploading an export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize CSV: {0}")]
    Serialize(#[from] csv::Error),

    #[error("Failed to flush CSV buffer: {0}")]
    Buffer(String),

    #[error("Failed to resolve container {container}: {message}")]
    Container { container: String, message: String },

    #[error("Failed to upload blob {blob}: {message}")]
    Upload { blob: String, message: String },
}

/// Errors that can occur while building an exporter from configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),
}

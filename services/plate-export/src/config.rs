use crate::csv_export::BlobNaming;
use crate::error::ConfigError;
use serde::Deserialize;

/// S3 rejects multipart parts smaller than this, except the last one
pub const MIN_PART_SIZE_BYTES: usize = 5 * 1024 * 1024;

/// Main configuration for the export service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Blob storage configuration
    pub storage: StorageConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus listener port; no exporter is installed when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Destination of the CSV exports
#[derive(Clone, Deserialize)]
pub struct StorageConfig {
    /// Container (bucket) receiving the exports
    pub container_name: String,
    /// `Key=Value;...` storage connection string
    pub connection_string: String,
    /// Multipart upload threshold in bytes (5MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (5MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
    /// Append a UUID to blob names so same-second exports do not overwrite each other
    #[serde(default)]
    pub unique_blob_names: bool,
}

// Default value functions
fn default_service_name() -> String {
    "plate-export".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_multipart_threshold() -> usize {
    5 * 1024 * 1024 // 5MB
}

fn default_part_size() -> usize {
    5 * 1024 * 1024 // 5MB
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "plate-export")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/plate-export").required(false))
            .add_source(config::File::with_name("/etc/plate-export/plate-export").required(false))
            // PLATE_EXPORT__STORAGE__CONNECTION_STRING -> storage.connection_string
            .add_source(
                config::Environment::with_prefix("PLATE_EXPORT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.storage.validate()?;
        Ok(config)
    }
}

impl StorageConfig {
    pub fn naming(&self) -> BlobNaming {
        if self.unique_blob_names {
            BlobNaming::TimestampWithSuffix
        } else {
            BlobNaming::Timestamp
        }
    }

    /// Check values the storage service would otherwise reject at upload time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "storage.container_name".to_string(),
            ));
        }
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "storage.connection_string".to_string(),
            ));
        }

        validate_container_name(&self.container_name)?;

        if self.part_size_bytes < MIN_PART_SIZE_BYTES {
            return Err(ConfigError::InvalidValue {
                key: "storage.part_size_bytes".to_string(),
                message: format!("must be at least {MIN_PART_SIZE_BYTES}"),
            });
        }

        Ok(())
    }
}

// Hand-written so the connection string (which may carry a secret) stays out of logs
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("container_name", &self.container_name)
            .field("connection_string", &"<redacted>")
            .field("multipart_threshold_bytes", &self.multipart_threshold_bytes)
            .field("part_size_bytes", &self.part_size_bytes)
            .field("unique_blob_names", &self.unique_blob_names)
            .finish()
    }
}

/// 3-63 chars of lowercase letters, digits, `-` and `.`, alphanumeric at both ends
fn validate_container_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: "storage.container_name".to_string(),
        message: format!("'{name}' {message}"),
    };

    if !(3..=63).contains(&name.len()) {
        return Err(invalid("must be 3 to 63 characters long"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "may only contain lowercase letters, digits, '-' and '.'",
        ));
    }

    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(invalid("must start and end with a letter or digit"));
    }

    Ok(())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            container_name: String::new(),
            connection_string: String::new(),
            multipart_threshold_bytes: default_multipart_threshold(),
            part_size_bytes: default_part_size(),
            unique_blob_names: false,
        }
    }
}

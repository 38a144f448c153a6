//! Storage connection strings.
//!
//! A connection string is a list of `Key=Value` pairs separated by `;`:
//!
//! ```text
//! Endpoint=http://localhost:9000;Region=us-east-1;AccessKeyId=minio;SecretAccessKey=minio123;ForcePathStyle=true
//! ```
//!
//! Keys are case-insensitive. Without `AccessKeyId`/`SecretAccessKey` the
//! default AWS credential chain is used.

use crate::error::ConfigError;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

const DEFAULT_REGION: &str = "us-east-1";

/// Static access key pair
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Parsed storage account settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    /// Custom endpoint URL (MinIO, LocalStack, ...)
    pub endpoint: Option<String>,
    pub region: String,
    /// `None` falls back to the default credential chain
    pub credentials: Option<AccessKey>,
    /// Path-style addressing, required by MinIO
    pub force_path_style: bool,
}

impl StorageAccount {
    /// Parse a `Key=Value;...` connection string
    pub fn parse(input: &str) -> Result<Self, ConfigError> {
        let mut endpoint = None;
        let mut region = None;
        let mut access_key_id = None;
        let mut secret_access_key = None;
        let mut force_path_style = false;
        let mut seen = HashSet::new();

        for segment in input.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConfigError::InvalidConnectionString(format!("expected Key=Value, got '{segment}'"))
            })?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            if value.is_empty() {
                return Err(ConfigError::InvalidConnectionString(format!(
                    "empty value for '{key}'"
                )));
            }
            if !seen.insert(key.clone()) {
                return Err(ConfigError::InvalidConnectionString(format!(
                    "duplicate key '{key}'"
                )));
            }

            match key.as_str() {
                "endpoint" => endpoint = Some(parse_endpoint(value)?),
                "region" => region = Some(value.to_string()),
                "accesskeyid" => access_key_id = Some(value.to_string()),
                "secretaccesskey" => secret_access_key = Some(value.to_string()),
                "forcepathstyle" => {
                    force_path_style = value.parse::<bool>().map_err(|_| {
                        ConfigError::InvalidConnectionString(format!(
                            "ForcePathStyle must be true or false, got '{value}'"
                        ))
                    })?
                }
                _ => {
                    return Err(ConfigError::InvalidConnectionString(format!(
                        "unknown key '{key}'"
                    )))
                }
            }
        }

        if seen.is_empty() {
            return Err(ConfigError::InvalidConnectionString(
                "connection string is empty".to_string(),
            ));
        }

        let credentials = match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(AccessKey {
                access_key_id,
                secret_access_key,
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::InvalidConnectionString(
                    "AccessKeyId and SecretAccessKey must be given together".to_string(),
                ))
            }
        };

        Ok(Self {
            endpoint,
            region: region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            credentials,
            force_path_style,
        })
    }
}

impl FromStr for StorageAccount {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_endpoint(value: &str) -> Result<String, ConfigError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| {
            ConfigError::InvalidConnectionString(format!(
                "Endpoint must start with http:// or https://, got '{value}'"
            ))
        })?;

    if rest.is_empty() {
        return Err(ConfigError::InvalidConnectionString(
            "Endpoint has no host".to_string(),
        ));
    }

    Ok(value.trim_end_matches('/').to_string())
}

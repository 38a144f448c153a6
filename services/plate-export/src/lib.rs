//! Plate Export Service
//!
//! Turns license plate detections into a CSV file and stores it as a blob in
//! S3-compatible object storage. Each export is one blob, named after the UTC
//! time it was started (`2024-01-02T03:04:05.csv`), in a container that is
//! created on first use.
//!
//! ## Flow
//!
//! ```text
//! PlateDetectionRecord[]
//!        │
//!        ▼
//! ┌──────────────┐   ExportRow    ┌──────────────┐   bytes   ┌──────────────┐
//! │ Exporter     │───────────────▶│ CSV writer   │──────────▶│ Blob store   │
//! └──────────────┘                └──────────────┘           │ (container)  │
//!                                                            └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use plate_export::{Config, Exporter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let exporter = Exporter::from_config(&config.storage).await?;
//!
//!     let uploaded = exporter.export_and_upload(&[]).await;
//!     println!("uploaded: {uploaded}");
//!     Ok(())
//! }
//! ```

pub mod blob_store;
pub mod config;
pub mod connection_string;
pub mod csv_export;
pub mod error;
pub mod exporter;
pub mod records;

pub use blob_store::{BlobStore, BlobUpload, ContainerStatus, S3BlobStore};
pub use config::{Config, ServiceConfig, StorageConfig};
pub use connection_string::{AccessKey, StorageAccount};
pub use csv_export::{blob_name, to_csv_bytes, BlobNaming, CSV_CONTENT_TYPE};
pub use error::{ConfigError, ExportError};
pub use exporter::{ExportReceipt, Exporter};
pub use records::{ExportRow, PlateDetectionRecord};

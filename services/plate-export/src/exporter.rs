use crate::blob_store::{BlobStore, BlobUpload, ContainerStatus, S3BlobStore};
use crate::config::StorageConfig;
use crate::connection_string::StorageAccount;
use crate::csv_export::{blob_name, to_csv_bytes, BlobNaming, CSV_CONTENT_TYPE};
use crate::error::{ConfigError, ExportError};
use crate::records::PlateDetectionRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Outcome of a successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReceipt {
    pub container: String,
    pub blob_name: String,
    pub row_count: usize,
    pub size_bytes: usize,
    pub container_status: ContainerStatus,
}

/// Serializes plate detections to CSV and uploads them as one blob per export
pub struct Exporter {
    store: Arc<dyn BlobStore>,
    container: String,
    naming: BlobNaming,
    clock: Clock,
}

impl Exporter {
    pub fn new(store: Arc<dyn BlobStore>, container: impl Into<String>, naming: BlobNaming) -> Self {
        Self {
            store,
            container: container.into(),
            naming,
            clock: Arc::new(Utc::now),
        }
    }

    /// Build an exporter over S3 from storage configuration.
    ///
    /// Fails on an invalid connection string or container name; these are
    /// never deferred to export time.
    pub async fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let account = StorageAccount::parse(&config.connection_string)?;

        let store = S3BlobStore::new(
            &account,
            config.multipart_threshold_bytes,
            config.part_size_bytes,
        )
        .await?;

        Ok(Self::new(
            Arc::new(store),
            config.container_name.clone(),
            config.naming(),
        ))
    }

    /// Replace the clock used for blob names
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Export `records` and report success.
    ///
    /// Every failure is logged and turned into `false`.
    pub async fn export_and_upload(&self, records: &[PlateDetectionRecord]) -> bool {
        match self.try_export_and_upload(records).await {
            Ok(_) => {
                metrics::counter!("plate_export.exports.succeeded").increment(1);
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    container = %self.container,
                    "Could not upload CSV file"
                );
                metrics::counter!("plate_export.exports.failed").increment(1);
                false
            }
        }
    }

    /// Export `records`, returning where the blob landed
    #[instrument(skip(self, records), fields(container = %self.container, records = records.len()))]
    pub async fn try_export_and_upload(
        &self,
        records: &[PlateDetectionRecord],
    ) -> Result<ExportReceipt, ExportError> {
        let blob_name = blob_name((self.clock)(), self.naming);
        info!(blob = %blob_name, "Generating CSV file");

        let body = to_csv_bytes(records)?;
        let size_bytes = body.len();

        info!(blob = %blob_name, size_bytes, "Beginning file upload");

        let container_status = self.store.ensure_container(&self.container).await?;

        let started = Instant::now();
        self.store
            .put_blob(
                &self.container,
                BlobUpload {
                    name: blob_name.clone(),
                    body,
                    content_type: CSV_CONTENT_TYPE,
                    row_count: records.len(),
                },
            )
            .await?;

        metrics::histogram!("plate_export.upload.duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("plate_export.rows.exported").increment(records.len() as u64);
        metrics::counter!("plate_export.bytes.uploaded").increment(size_bytes as u64);

        info!(blob = %blob_name, size_bytes, "CSV file uploaded");

        Ok(ExportReceipt {
            container: self.container.clone(),
            blob_name,
            row_count: records.len(),
            size_bytes,
            container_status,
        })
    }
}

use crate::config::MIN_PART_SIZE_BYTES;
use crate::connection_string::StorageAccount;
use crate::error::{ConfigError, ExportError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use tracing::{debug, info, instrument, warn};

/// Whether a container was already present or had to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Existing,
    Created,
}

/// A fully serialized blob ready for upload
#[derive(Debug, Clone, PartialEq)]
pub struct BlobUpload {
    pub name: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Number of data rows in the body, stored as blob metadata
    pub row_count: usize,
}

/// Object storage organized into named containers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Make sure `container` exists, creating it when absent
    async fn ensure_container(&self, container: &str) -> Result<ContainerStatus, ExportError>;

    /// Write the blob, replacing any object of the same name
    async fn put_blob(&self, container: &str, upload: BlobUpload) -> Result<(), ExportError>;
}

/// [`BlobStore`] backed by S3 or an S3-compatible service; containers map to buckets
pub struct S3BlobStore {
    client: S3Client,
    region: String,
    multipart_threshold_bytes: usize,
    part_size_bytes: usize,
}

impl S3BlobStore {
    /// Create a new store from a parsed connection string
    pub async fn new(
        account: &StorageAccount,
        multipart_threshold_bytes: usize,
        part_size_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(account.region.clone()));

        if let Some(ref key) = account.credentials {
            loader = loader.credentials_provider(Credentials::new(
                key.access_key_id.clone(),
                key.secret_access_key.clone(),
                None,
                None,
                "plate-export-connection-string",
            ));
        }

        let aws_config = loader.load().await;
        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = account.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if account.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let store = Self::with_client(
            S3Client::from_conf(s3_config_builder.build()),
            &account.region,
            multipart_threshold_bytes,
            part_size_bytes,
        )?;

        info!(
            region = %account.region,
            endpoint = account.endpoint.as_deref().unwrap_or("default"),
            "S3 blob store initialized"
        );

        Ok(store)
    }

    /// Wrap an already configured client
    pub fn with_client(
        client: S3Client,
        region: &str,
        multipart_threshold_bytes: usize,
        part_size_bytes: usize,
    ) -> Result<Self, ConfigError> {
        if part_size_bytes < MIN_PART_SIZE_BYTES {
            return Err(ConfigError::InvalidValue {
                key: "storage.part_size_bytes".to_string(),
                message: format!("must be at least {MIN_PART_SIZE_BYTES}, got {part_size_bytes}"),
            });
        }

        Ok(Self {
            client,
            region: region.to_string(),
            multipart_threshold_bytes,
            part_size_bytes,
        })
    }

    async fn create_bucket(&self, container: &str) -> Result<ContainerStatus, ExportError> {
        let mut request = self.client.create_bucket().bucket(container);

        if let Some(constraint) = location_constraint(&self.region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint)
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!(container = %container, "Created container");
                Ok(ContainerStatus::Created)
            }
            // Lost a race with another exporter creating the same bucket
            Err(e)
                if e.as_service_error()
                    .map(|e| e.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                Ok(ContainerStatus::Existing)
            }
            Err(e) => Err(ExportError::Container {
                container: container.to_string(),
                message: format!("create failed: {}", DisplayErrorContext(e)),
            }),
        }
    }

    /// Single-part upload for small exports
    async fn simple_upload(&self, container: &str, upload: BlobUpload) -> Result<(), ExportError> {
        self.client
            .put_object()
            .bucket(container)
            .key(&upload.name)
            .body(ByteStream::from(upload.body))
            .content_type(upload.content_type)
            .metadata("row-count", upload.row_count.to_string())
            .send()
            .await
            .map_err(|e| upload_failed(&upload.name, e))?;

        Ok(())
    }

    /// Multipart upload for exports above the configured threshold.
    ///
    /// A failed part or completion aborts the upload so no orphaned parts stay behind.
    async fn multipart_upload(
        &self,
        container: &str,
        upload: BlobUpload,
    ) -> Result<(), ExportError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(container)
            .key(&upload.name)
            .content_type(upload.content_type)
            .metadata("row-count", upload.row_count.to_string())
            .send()
            .await
            .map_err(|e| upload_failed(&upload.name, e))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| ExportError::Upload {
                blob: upload.name.clone(),
                message: "no upload ID in response".to_string(),
            })?
            .to_string();

        if let Err(e) = self.upload_parts(container, &upload, &upload_id).await {
            self.abort_multipart_upload(container, &upload.name, &upload_id)
                .await;
            return Err(e);
        }

        Ok(())
    }

    async fn upload_parts(
        &self,
        container: &str,
        upload: &BlobUpload,
        upload_id: &str,
    ) -> Result<(), ExportError> {
        let mut completed_parts = Vec::new();

        for (index, chunk) in upload.body.chunks(self.part_size_bytes).enumerate() {
            let part_number = index as i32 + 1;

            let part_response = self
                .client
                .upload_part()
                .bucket(container)
                .key(&upload.name)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk.to_vec()))
                .send()
                .await
                .map_err(|e| upload_failed(&upload.name, e))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(part_response.e_tag().unwrap_or_default())
                    .build(),
            );
        }

        debug!(parts = completed_parts.len(), "Completing multipart upload");

        self.client
            .complete_multipart_upload()
            .bucket(container)
            .key(&upload.name)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| upload_failed(&upload.name, e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, container: &str, blob: &str, upload_id: &str) {
        match self
            .client
            .abort_multipart_upload()
            .bucket(container)
            .key(blob)
            .upload_id(upload_id)
            .send()
            .await
        {
            Ok(_) => debug!(blob = %blob, upload_id = %upload_id, "Aborted multipart upload"),
            Err(e) => warn!(
                blob = %blob,
                upload_id = %upload_id,
                error = %DisplayErrorContext(e),
                "Failed to abort multipart upload"
            ),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self))]
    async fn ensure_container(&self, container: &str) -> Result<ContainerStatus, ExportError> {
        match self.client.head_bucket().bucket(container).send().await {
            Ok(_) => Ok(ContainerStatus::Existing),
            Err(e) => {
                if e.as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false)
                {
                    self.create_bucket(container).await
                } else {
                    Err(ExportError::Container {
                        container: container.to_string(),
                        message: DisplayErrorContext(e).to_string(),
                    })
                }
            }
        }
    }

    #[instrument(skip(self, upload), fields(blob = %upload.name, size_bytes = upload.body.len()))]
    async fn put_blob(&self, container: &str, upload: BlobUpload) -> Result<(), ExportError> {
        if use_multipart(upload.body.len(), self.multipart_threshold_bytes) {
            self.multipart_upload(container, upload).await
        } else {
            self.simple_upload(container, upload).await
        }
    }
}

fn upload_failed<E: std::error::Error>(blob: &str, err: E) -> ExportError {
    ExportError::Upload {
        blob: blob.to_string(),
        message: DisplayErrorContext(err).to_string(),
    }
}

fn use_multipart(size_bytes: usize, threshold_bytes: usize) -> bool {
    size_bytes > threshold_bytes
}

/// us-east-1 is the default location and must not be sent as a constraint
fn location_constraint(region: &str) -> Option<BucketLocationConstraint> {
    match region {
        "us-east-1" => None,
        other => Some(BucketLocationConstraint::from(other)),
    }
}

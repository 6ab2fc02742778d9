//! AWS S3 storage implementation.
//!
//! Works against AWS itself or any S3-compatible endpoint; custom
//! endpoints use path-style addressing.

use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::ObjectStore;

/// S3-backed [`ObjectStore`].
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3 storage instance.
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create S3 storage from the `[storage]` section.
    ///
    /// Credentials come from the standard AWS provider chain.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            return Err(AppError::config("storage.bucket is not set"));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = Client::from_conf(builder.build());

        Ok(Self::new(client, config.bucket.clone()))
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let len = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::store(key, e.into_service_error()))?;

        log::debug!("Wrote {len} bytes to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::store(key, e.into_service_error()))?;

        log::debug!("Deleted s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

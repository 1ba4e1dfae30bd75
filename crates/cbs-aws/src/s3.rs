//! Partner bucket reads.

use anyhow::anyhow;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use cbs_core::ports::ObjectStore;
use cbs_core::ObjectStoreError;
use tracing::debug;

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn read(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        debug!(bucket, key, "Reading object");
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|service| service.is_no_such_key())
                {
                    ObjectStoreError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    ObjectStoreError::Other(anyhow!(
                        "Failed to read 's3://{}/{}': {}",
                        bucket,
                        key,
                        DisplayErrorContext(&err)
                    ))
                }
            })?;

        let body = output.body.collect().await.map_err(|err| {
            anyhow!("Failed to read body of 's3://{}/{}': {}", bucket, key, err)
        })?;
        Ok(body.into_bytes().to_vec())
    }
}

//! SQS queue sender.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use cbs_core::ports::MessageQueue;
use tracing::debug;

pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    pub fn from_config(config: &SdkConfig, queue_url: impl Into<String>) -> Self {
        Self::new(Client::new(config), queue_url)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn send(&self, body: String) -> Result<()> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to send message to '{}': {}",
                    self.queue_url,
                    DisplayErrorContext(&e)
                )
            })?;
        debug!(
            queue_url = %self.queue_url,
            message_id = output.message_id().unwrap_or_default(),
            "Message sent"
        );
        Ok(())
    }
}

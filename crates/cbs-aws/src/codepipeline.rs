//! Alarm deployment pipeline trigger.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_codepipeline::error::DisplayErrorContext;
use aws_sdk_codepipeline::Client;
use cbs_core::ports::PipelineTrigger;
use tracing::info;

pub struct CodePipelineTrigger {
    client: Client,
    pipeline_name: String,
}

impl CodePipelineTrigger {
    pub fn new(client: Client, pipeline_name: impl Into<String>) -> Self {
        Self {
            client,
            pipeline_name: pipeline_name.into(),
        }
    }

    pub fn from_config(config: &SdkConfig, pipeline_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), pipeline_name)
    }
}

#[async_trait]
impl PipelineTrigger for CodePipelineTrigger {
    async fn trigger(&self, client_request_token: &str) -> Result<()> {
        let output = self
            .client
            .start_pipeline_execution()
            .name(&self.pipeline_name)
            .client_request_token(client_request_token)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to start pipeline '{}': {}",
                    self.pipeline_name,
                    DisplayErrorContext(&e)
                )
            })?;
        info!(
            pipeline = %self.pipeline_name,
            execution_id = output.pipeline_execution_id().unwrap_or_default(),
            "Pipeline execution started"
        );
        Ok(())
    }
}

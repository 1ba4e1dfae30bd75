//! Interfaces to the infrastructure the transport runs against.
//!
//! cbs-aws implements these with the AWS SDK; tests use in-memory fakes.

use crate::error::ObjectStoreError;
use crate::partner::{Partner, PartnerUpdate};
use crate::transport::AlarmSuppression;
use crate::triage::UnknownWorkloadEntry;
use anyhow::Result;
use async_trait::async_trait;

/// Partner inventory keyed by log archive account ID
#[async_trait]
pub trait PartnerRegistry: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Partner>>;

    /// Fresh read of a single record, bypassing any snapshot
    async fn get(&self, account_id: &str, cbs_id: &str) -> Result<Option<Partner>>;

    /// Persist one attribute. Fails if the record does not exist.
    async fn update(&self, account_id: &str, cbs_id: &str, update: &PartnerUpdate) -> Result<()>;
}

/// Read access to partner buckets under the reader role
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn read(&self, bucket: &str, key: &str) -> std::result::Result<Vec<u8>, ObjectStoreError>;
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send(&self, body: String) -> Result<()>;
}

/// Hit counts for sanitized unknown-workload shapes
#[async_trait]
pub trait UnknownWorkloadRegistry: Send + Sync {
    async fn get(&self, sanitized_key: &str) -> Result<Option<UnknownWorkloadEntry>>;

    async fn upsert(&self, sanitized_key: &str, entry: &UnknownWorkloadEntry) -> Result<()>;
}

/// Fire-and-forget notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, subject: &str, body: &str) -> Result<()>;
}

/// Starts the pipeline that enables a newly deployed partner's alarms
#[async_trait]
pub trait PipelineTrigger: Send + Sync {
    async fn trigger(&self, client_request_token: &str) -> Result<()>;
}

#[async_trait]
pub trait SuppressionStore: Send + Sync {
    async fn put(&self, suppression: &AlarmSuppression) -> Result<()>;
}

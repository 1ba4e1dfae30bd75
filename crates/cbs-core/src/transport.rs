//! Transport controller: routes one replication event per invocation.
//!
//! Accepted events with a known workload are forwarded to the success queue;
//! unknown workloads go to the dead-letter queue. The first event from a
//! partner also enables their alarms.

use crate::classify::{is_supported_workload, TableClassifier, Workload, WorkloadClassifier};
use crate::error::TransportError;
use crate::event::{CbsEvent, EventInterpreter};
use crate::message::{DeadLetter, MessageMetadata, SuccessMessage};
use crate::partner::{PartnerSnapshot, PartnerUpdate};
use crate::ports::{
    MessageQueue, ObjectStore, PartnerRegistry, PipelineTrigger, SuppressionStore,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Values stamped on every forwarded message
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub release: String,
    pub reader_role_arn: String,
}

/// Collaborators, built once per cold start
#[derive(Clone)]
pub struct TransportPorts {
    pub registry: Arc<dyn PartnerRegistry>,
    pub reader: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub dead_letters: Arc<dyn MessageQueue>,
    pub pipeline: Arc<dyn PipelineTrigger>,
    pub suppressions: Arc<dyn SuppressionStore>,
}

/// Per-invocation facts supplied by the runtime
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub request_id: String,
    pub memory_limit_mb: Option<i32>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmType {
    ReplicationAlarm,
    MetadataWorkloadAlarm,
}

impl AlarmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmType::ReplicationAlarm => "ReplicationAlarm",
            AlarmType::MetadataWorkloadAlarm => "MetadataWorkloadAlarm",
        }
    }

    /// How long the alarm stays quiet after a partner's first event
    pub fn suppression_window(&self) -> Duration {
        match self {
            AlarmType::ReplicationAlarm => Duration::days(2),
            AlarmType::MetadataWorkloadAlarm => Duration::days(1),
        }
    }
}

impl fmt::Display for AlarmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmSuppression {
    pub cbs_id: String,
    pub alarm_type: AlarmType,
    pub expires_at: DateTime<Utc>,
}

impl AlarmSuppression {
    /// Suppressions written when a partner is first seen
    pub fn initial(cbs_id: &str, now: DateTime<Utc>) -> [AlarmSuppression; 2] {
        [AlarmType::ReplicationAlarm, AlarmType::MetadataWorkloadAlarm].map(|alarm_type| {
            AlarmSuppression {
                cbs_id: cbs_id.to_string(),
                alarm_type,
                expires_at: now + alarm_type.suppression_window(),
            }
        })
    }
}

pub struct Transport {
    settings: TransportSettings,
    ports: TransportPorts,
    classifier: Arc<dyn WorkloadClassifier>,
}

impl Transport {
    pub fn new(settings: TransportSettings, ports: TransportPorts) -> Self {
        Self::with_classifier(settings, ports, Arc::new(TableClassifier))
    }

    pub fn with_classifier(
        settings: TransportSettings,
        ports: TransportPorts,
        classifier: Arc<dyn WorkloadClassifier>,
    ) -> Self {
        Self {
            settings,
            ports,
            classifier,
        }
    }

    /// Route one ingress event
    pub async fn process(
        &self,
        raw: Value,
        context: &InvocationContext,
    ) -> Result<(), TransportError> {
        let event = CbsEvent::from_value(raw).map_err(TransportError::NotAccepted)?;

        if !is_supported_workload(event.object_key()) {
            return Err(TransportError::UnsupportedWorkload {
                object_key: event.object_key().to_string(),
            });
        }

        let mut partners = PartnerSnapshot::load(self.ports.registry.as_ref()).await?;
        let mut interpreter = EventInterpreter::new(
            &event,
            &mut partners,
            self.ports.registry.as_ref(),
            self.ports.reader.as_ref(),
            self.classifier.as_ref(),
        );

        let Some(workload) = interpreter.workload().await? else {
            return self.dead_letter(&mut interpreter).await;
        };

        if !interpreter.partner()?.deployed {
            self.first_partner_event(&mut interpreter, context).await?;
        }

        self.forward(&mut interpreter, workload, context).await?;

        if interpreter.metadata_update_needed() {
            interpreter.apply_accelerator_change().await?;
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        interpreter: &mut EventInterpreter<'_>,
    ) -> Result<(), TransportError> {
        let object_key = interpreter.event().object_key().to_string();
        let letter = DeadLetter {
            cbs_id: interpreter.cbs_id()?,
            accelerator: interpreter
                .accelerator()
                .await?
                .map(|accelerator| accelerator.as_str().to_string()),
            object_key: object_key.clone(),
        };

        warn!(
            "Sending unsupported workload '{}' from {} to DLQ",
            object_key, letter.cbs_id
        );
        let body = letter.to_body().map_err(anyhow::Error::from)?;
        self.ports.dead_letters.send(body).await?;

        Err(TransportError::UnknownWorkload {
            object_key,
            workload: None,
        })
    }

    /// Mark the partner deployed and enable their alarms, unless another
    /// invocation already did
    async fn first_partner_event(
        &self,
        interpreter: &mut EventInterpreter<'_>,
        context: &InvocationContext,
    ) -> Result<(), TransportError> {
        let partner = interpreter.partner()?;
        let (account_id, cbs_id) = (partner.account_id.clone(), partner.cbs_id.clone());

        interpreter.record(&PartnerUpdate::Deployed(true))?;

        let persisted = self.ports.registry.get(&account_id, &cbs_id).await?;
        if persisted.is_some_and(|partner| partner.deployed) {
            debug!(cbs_id = %cbs_id, "Partner already marked deployed");
            return Ok(());
        }

        interpreter.persist(PartnerUpdate::Deployed(true)).await?;
        info!(
            "'{}' has deployed 2.0. Triggering CI/CD pipeline to enable their CloudWatch Alarms...",
            cbs_id
        );
        self.ports
            .pipeline
            .trigger(&format!("Deploying{}CloudWatchAlarms", cbs_id))
            .await?;

        for suppression in AlarmSuppression::initial(&cbs_id, context.received_at) {
            self.ports.suppressions.put(&suppression).await?;
        }
        Ok(())
    }

    async fn forward(
        &self,
        interpreter: &mut EventInterpreter<'_>,
        workload: Workload,
        context: &InvocationContext,
    ) -> Result<(), TransportError> {
        let event = interpreter.event();
        let (object_key, bucket, size) = (
            event.object_key().to_string(),
            event.bucket().to_string(),
            event.object_size(),
        );
        let cbs_id = interpreter.cbs_id()?;

        let custom_fields = if workload.is_vpc_flow_logs() {
            Some(interpreter.vpc_flow_log_fields().await?)
        } else {
            None
        };

        let message = SuccessMessage {
            metadata: MessageMetadata {
                cbs_id: cbs_id.clone(),
                workload,
                file: object_key.clone(),
                bucket: bucket.clone(),
                reader_arn: self.settings.reader_role_arn.clone(),
                release: self.settings.release.clone(),
                custom_fields,
            },
            event: interpreter.event().raw(),
        };
        let body = message.to_body().map_err(anyhow::Error::from)?;
        self.ports.queue.send(body).await?;

        let accelerator = interpreter
            .accelerator()
            .await?
            .map(|accelerator| accelerator.as_str().to_uppercase());
        let org_id = interpreter.org_id().await?;

        info!(
            CbsSensorId = %cbs_id,
            Workload = %workload,
            Accelerator = accelerator.as_deref(),
            OrgId = org_id.as_deref(),
            ObjectKey = %object_key,
            BucketName = %bucket,
            Size = size,
            AWSRequestId = %context.request_id,
            MemoryLimit = context.memory_limit_mb,
            "Log object '{}' in bucket '{}' sent to SQS",
            object_key,
            bucket
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_initial_suppressions() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let [replication, metadata] = AlarmSuppression::initial("ABC", now);

        assert_eq!(replication.alarm_type, AlarmType::ReplicationAlarm);
        assert_eq!(
            replication.expires_at,
            Utc.with_ymd_and_hms(2024, 3, 3, 12, 0, 0).unwrap()
        );
        assert_eq!(metadata.alarm_type, AlarmType::MetadataWorkloadAlarm);
        assert_eq!(
            metadata.expires_at,
            Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap()
        );
        assert_eq!(metadata.cbs_id, "ABC");
    }
}

//! Replication event interpretation.
//!
//! [`CbsEvent`] pulls the fixed facts out of the EventBridge payload once.
//! [`EventInterpreter`] derives everything that needs the partner inventory
//! or the partner's bucket, resolving each field at most once per event.

use crate::classify::{Workload, WorkloadClassifier, ACCELERATOR_METADATA_OBJECT_KEY};
use crate::error::TransportError;
use crate::partner::{Accelerator, Partner, PartnerSnapshot, PartnerUpdate};
use crate::ports::{ObjectStore, PartnerRegistry};
use crate::vpc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

static ORG_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(o-[a-z0-9]{10,32})/").expect("org pattern must compile"));

#[derive(Debug, Error)]
pub enum EventShapeError {
    #[error("Event has no '{0}' field")]
    MissingField(&'static str),
}

/// An accepted S3 replication or object-created event
#[derive(Debug, Clone)]
pub struct CbsEvent {
    raw: Value,
    bucket: String,
    object_key: String,
    object_size: Option<f64>,
    identity_account_id: Option<String>,
}

impl CbsEvent {
    /// Accepts the CloudTrail "replicated via API call" shape and the S3
    /// "Object Created" shape
    pub fn from_value(raw: Value) -> Result<Self, EventShapeError> {
        let detail = raw
            .get("detail")
            .filter(|detail| detail.is_object())
            .ok_or(EventShapeError::MissingField("detail"))?;

        let bucket = string_at(detail, &["/requestParameters/bucketName", "/bucket/name"])
            .ok_or(EventShapeError::MissingField("bucket"))?;
        let escaped_key = string_at(detail, &["/requestParameters/key", "/object/key"])
            .ok_or(EventShapeError::MissingField("key"))?;
        // Invalid UTF-8 escapes become U+FFFD
        let object_key =
            String::from_utf8_lossy(&urlencoding::decode_binary(escaped_key.as_bytes()))
                .into_owned();

        let object_size = ["/additionalEventData/bytesTransferredIn", "/object/size"]
            .iter()
            .find_map(|pointer| detail.pointer(pointer).and_then(Value::as_f64));
        let identity_account_id = string_at(detail, &["/userIdentity/accountId"]);

        Ok(Self {
            raw,
            bucket,
            object_key,
            object_size,
            identity_account_id,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// URL-unescaped object key
    pub fn object_key(&self) -> &str {
        &self.object_key
    }

    pub fn object_size(&self) -> Option<f64> {
        self.object_size
    }

    pub fn identity_account_id(&self) -> Option<&str> {
        self.identity_account_id.as_deref()
    }
}

fn string_at(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .find_map(|pointer| value.pointer(pointer).and_then(Value::as_str))
        .map(str::to_string)
}

/// Result of reading a partner's accelerator metadata object
#[derive(Debug, Clone, PartialEq)]
pub struct AcceleratorChange {
    pub detected: Accelerator,
    /// Raw accelerator string on the partner record
    pub recorded: Option<String>,
    pub vpc_custom_fields: String,
    pub recorded_vpc_custom_fields: Option<String>,
}

impl AcceleratorChange {
    pub fn accelerator_changed(&self) -> bool {
        self.recorded.as_deref() != Some(self.detected.as_str())
    }

    pub fn vpc_custom_fields_changed(&self) -> bool {
        self.recorded_vpc_custom_fields.as_deref() != Some(self.vpc_custom_fields.as_str())
    }
}

/// Per-event view over the partner inventory
pub struct EventInterpreter<'a> {
    event: &'a CbsEvent,
    partners: &'a mut PartnerSnapshot,
    registry: &'a dyn PartnerRegistry,
    reader: &'a dyn ObjectStore,
    classifier: &'a dyn WorkloadClassifier,

    partner_account_id: Option<Option<String>>,
    accelerator: Option<Option<Accelerator>>,
    workload: Option<Option<Workload>>,
    pending_accelerator: Option<Accelerator>,
}

impl<'a> EventInterpreter<'a> {
    pub fn new(
        event: &'a CbsEvent,
        partners: &'a mut PartnerSnapshot,
        registry: &'a dyn PartnerRegistry,
        reader: &'a dyn ObjectStore,
        classifier: &'a dyn WorkloadClassifier,
    ) -> Self {
        Self {
            event,
            partners,
            registry,
            reader,
            classifier,
            partner_account_id: None,
            accelerator: None,
            workload: None,
            pending_accelerator: None,
        }
    }

    pub fn event(&self) -> &'a CbsEvent {
        self.event
    }

    /// Log archive account the object came from
    pub fn partner_account_id(&mut self) -> Option<String> {
        if let Some(account_id) = &self.partner_account_id {
            return account_id.clone();
        }

        let account_id = match self.event.identity_account_id() {
            Some(account_id) => Some(account_id.to_string()),
            None => self
                .partners
                .find_by_key_prefix(self.event.object_key())
                .map(str::to_string),
        };
        self.partner_account_id = Some(account_id.clone());
        account_id
    }

    /// The partner record this event belongs to
    pub fn partner(&mut self) -> Result<&Partner, TransportError> {
        let account_id = self.partner_account_id();
        match account_id
            .as_deref()
            .and_then(|account_id| self.partners.get(account_id))
        {
            Some(partner) => Ok(partner),
            None => Err(TransportError::PartnerNotFound { account_id }),
        }
    }

    pub fn cbs_id(&mut self) -> Result<String, TransportError> {
        Ok(self.partner()?.cbs_id.clone())
    }

    /// Recorded org ID, else one discovered in an organization trail key
    pub async fn org_id(&mut self) -> Result<Option<String>, TransportError> {
        if let Some(org_id) = &self.partner()?.org_id {
            return Ok(Some(org_id.clone()));
        }

        let Some(captures) = ORG_ID.captures(self.event.object_key()) else {
            return Ok(None);
        };
        let org_id = captures[1].to_string();
        info!("Updating {}'s org ID to '{}'", self.cbs_id()?, org_id);
        self.persist(PartnerUpdate::OrgId(org_id.clone())).await?;
        Ok(Some(org_id))
    }

    /// Accelerator whose table classifies this event
    ///
    /// For the accelerator metadata object this reads the object and detects
    /// the accelerator. Changed VPC fields are persisted straight away; a
    /// changed accelerator is held until [`Self::apply_accelerator_change`].
    pub async fn accelerator(&mut self) -> Result<Option<Accelerator>, TransportError> {
        if let Some(accelerator) = self.accelerator {
            return Ok(accelerator);
        }

        let accelerator = if self.event.object_key() == ACCELERATOR_METADATA_OBJECT_KEY {
            let change = self.detect_accelerator_change().await?;
            if change.vpc_custom_fields_changed() {
                self.persist(PartnerUpdate::VpcCustomFields(change.vpc_custom_fields.clone()))
                    .await?;
            }
            if change.accelerator_changed() {
                info!(
                    "Accelerator has changed from '{}' to '{}'!",
                    change.recorded.as_deref().unwrap_or("None").to_uppercase(),
                    change.detected.as_str().to_uppercase()
                );
                self.pending_accelerator = Some(change.detected);
            } else {
                info!("Accelerator remains unchanged");
            }
            Some(change.detected)
        } else {
            let partner = self.partner()?;
            match partner.accelerator.as_deref() {
                None => None,
                Some(recorded) => Some(recorded.parse::<Accelerator>().map_err(|_| {
                    TransportError::UnknownAccelerator {
                        cbs_id: partner.cbs_id.clone(),
                        accelerator: recorded.to_string(),
                    }
                })?),
            }
        };

        self.accelerator = Some(accelerator);
        Ok(accelerator)
    }

    /// Read the accelerator metadata object and compare it with the record.
    /// Nothing is written.
    pub async fn detect_accelerator_change(&mut self) -> Result<AcceleratorChange, TransportError> {
        let cbs_id = self.cbs_id()?;
        let event = self.event;
        let bucket = event.bucket();

        info!("Reading new metadata file...");
        let body = self.reader.read(bucket, event.object_key()).await?;
        let metadata: Value = serde_json::from_slice(&body).map_err(|_| {
            TransportError::MalformedAcceleratorMetadata {
                metadata: String::from_utf8_lossy(&body).into_owned(),
            }
        })?;
        info!("Successfully read new metadata file!");

        let detected = if metadata.get("lastSuccessfulExecution").is_some() {
            Accelerator::Lza
        } else if metadata.get("latestSuccessfulExecution").is_some() {
            Accelerator::Asea
        } else {
            return Err(TransportError::MalformedAcceleratorMetadata {
                metadata: metadata.to_string(),
            });
        };
        info!("Accelerator detected: '{}'", detected.as_str().to_uppercase());

        let vpc_custom_fields = vpc::lookup(self.reader, &cbs_id, Some(detected), bucket).await?;

        let partner = self.partner()?;
        Ok(AcceleratorChange {
            detected,
            recorded: partner.accelerator.clone(),
            vpc_custom_fields,
            recorded_vpc_custom_fields: partner.vpc_custom_fields.clone(),
        })
    }

    /// True once a detected accelerator differs from the record
    pub fn metadata_update_needed(&self) -> bool {
        self.pending_accelerator.is_some()
    }

    /// Persist a pending accelerator change, if any
    pub async fn apply_accelerator_change(&mut self) -> Result<(), TransportError> {
        let Some(accelerator) = self.pending_accelerator.take() else {
            return Ok(());
        };
        info!(
            "Accelerator has changed for '{}'. Updating inventory table...",
            self.cbs_id()?
        );
        self.persist(PartnerUpdate::Accelerator(accelerator)).await
    }

    pub async fn workload(&mut self) -> Result<Option<Workload>, TransportError> {
        if let Some(workload) = self.workload {
            return Ok(workload);
        }

        let accelerator = self.accelerator().await?;
        let workload = self.classifier.classify(self.event.object_key(), accelerator);
        self.workload = Some(workload);
        Ok(workload)
    }

    pub fn object_size(&self) -> Option<f64> {
        self.event.object_size()
    }

    /// Recorded VPC flow log fields, else looked up and persisted
    pub async fn vpc_flow_log_fields(&mut self) -> Result<String, TransportError> {
        if let Some(fields) = &self.partner()?.vpc_custom_fields {
            return Ok(fields.clone());
        }

        let cbs_id = self.cbs_id()?;
        let accelerator = self.accelerator().await?;
        let fields = vpc::lookup(self.reader, &cbs_id, accelerator, self.event.bucket()).await?;
        info!("Updating {}'s VPC flow log field entries", cbs_id);
        self.persist(PartnerUpdate::VpcCustomFields(fields.clone()))
            .await?;
        Ok(fields)
    }

    /// Change the snapshot only
    pub fn record(&mut self, update: &PartnerUpdate) -> Result<(), TransportError> {
        let account_id = self.partner()?.account_id.clone();
        self.partners.apply(&account_id, update);
        Ok(())
    }

    /// Change the snapshot and the registry
    pub async fn persist(&mut self, update: PartnerUpdate) -> Result<(), TransportError> {
        let partner = self.partner()?;
        let (account_id, cbs_id) = (partner.account_id.clone(), partner.cbs_id.clone());

        self.partners.apply(&account_id, &update);
        self.registry.update(&account_id, &cbs_id, &update).await?;
        Ok(())
    }
}

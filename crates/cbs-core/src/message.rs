//! Outbound queue message bodies.

use crate::classify::Workload;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Routing metadata read by the downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageMetadata {
    #[serde(rename = "Cbs-Identifier")]
    pub cbs_id: String,
    #[serde(rename = "Workload")]
    pub workload: Workload,
    #[serde(rename = "File")]
    pub file: String,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "ReaderArn")]
    pub reader_arn: String,
    #[serde(rename = "Release")]
    pub release: String,
    #[serde(rename = "CbsCustomFields", skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<String>,
}

/// Body sent to the success queue: metadata plus the untouched ingress event
#[derive(Debug, Clone, Serialize)]
pub struct SuccessMessage<'a> {
    pub metadata: MessageMetadata,
    pub event: &'a Value,
}

impl SuccessMessage<'_> {
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Body sent to the dead-letter queue for an unclassified object
///
/// The accelerator is whatever the partner had when the event was processed,
/// `null` for the default table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub cbs_id: String,
    pub accelerator: Option<String>,
    pub object_key: String,
}

impl DeadLetter {
    pub fn to_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a queued body. All three keys must be present; `accelerator`
    /// may be null.
    pub fn from_body(body: &str) -> serde_json::Result<Self> {
        #[derive(Deserialize)]
        struct Strict {
            cbs_id: String,
            accelerator: Value,
            object_key: String,
        }

        let strict: Strict = serde_json::from_str(body)?;
        let accelerator = match strict.accelerator {
            Value::Null => None,
            Value::String(accelerator) => Some(accelerator),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "accelerator must be a string or null, got {other}"
                )))
            }
        };

        Ok(Self {
            cbs_id: strict.cbs_id,
            accelerator,
            object_key: strict.object_key,
        })
    }
}

//! VPC flow log custom field lookup.
//!
//! Partners may log a custom set of flow log fields. The list lives in their
//! accelerator configuration, replicated into their CBS bucket.

use crate::error::ObjectStoreError;
use crate::partner::Accelerator;
use crate::ports::ObjectStore;
use anyhow::Result;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use tracing::{error, info, warn};

/// Fields AWS writes when no custom format is configured
pub const DEFAULT_VPC_FLOW_LOG_FIELDS: &[&str] = &[
    "version",
    "account-id",
    "interface-id",
    "srcaddr",
    "dstaddr",
    "srcport",
    "dstport",
    "protocol",
    "packets",
    "bytes",
    "start",
    "end",
    "action",
    "log-status",
    "vpc-id",
    "subnet-id",
    "instance-id",
    "tcp-flags",
    "type",
    "pkt-srcaddr",
    "pkt-dstaddr",
    "region",
    "az-id",
    "pkt-src-aws-service",
    "pkt-dst-aws-service",
    "flow-direction",
    "traffic-path",
];

pub const LZA_NETWORK_CONFIG_KEY: &str = "config/network-config.yaml";
pub const ASEA_CONFIG_KEY: &str = "config/config.json";

pub fn default_fields() -> String {
    DEFAULT_VPC_FLOW_LOG_FIELDS.join(",")
}

/// Comma-joined flow log fields for a partner
///
/// Missing or unusable configuration falls back to the defaults. Only object
/// store failures other than a missing object are returned as errors.
pub async fn lookup(
    store: &dyn ObjectStore,
    cbs_id: &str,
    accelerator: Option<Accelerator>,
    bucket: &str,
) -> Result<String> {
    let Some(accelerator) = accelerator else {
        return Ok(default_fields());
    };

    info!(cbs_id, %accelerator, "Getting VPC flow log field entries");

    let config_key = match accelerator {
        Accelerator::Lza => LZA_NETWORK_CONFIG_KEY,
        Accelerator::Asea => ASEA_CONFIG_KEY,
    };
    let body = match store.read(bucket, config_key).await {
        Ok(body) => body,
        Err(ObjectStoreError::NotFound { .. }) => {
            warn!(
                "{} is missing their {} config",
                cbs_id,
                accelerator.as_str().to_uppercase()
            );
            return Ok(default_fields());
        }
        Err(ObjectStoreError::Other(err)) => return Err(err),
    };

    let parsed = match accelerator {
        Accelerator::Lza => lza_custom_fields(&body),
        Accelerator::Asea => asea_custom_fields(&body),
    };

    match parsed {
        Ok(Some(fields)) => Ok(fields.join(",")),
        Ok(None) => {
            error!(
                "{}'s VPC flow logs custom fields are missing from their {} config",
                cbs_id,
                accelerator.as_str().to_uppercase()
            );
            Ok(default_fields())
        }
        Err(err) => {
            error!(
                "{}'s {} config is malformed: {}",
                cbs_id,
                accelerator.as_str().to_uppercase(),
                err
            );
            Ok(default_fields())
        }
    }
}

fn lza_custom_fields(body: &[u8]) -> Result<Option<Vec<String>>> {
    let document: YamlValue = serde_yaml::from_slice(body)?;
    let fields = document
        .get("vpcFlowLogs")
        .and_then(|flow_logs| flow_logs.get("customFields"))
        .and_then(YamlValue::as_sequence)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|field| field.as_str().map(str::to_string))
                .collect()
        });
    Ok(fields)
}

fn asea_custom_fields(body: &[u8]) -> Result<Option<Vec<String>>> {
    let document: JsonValue = serde_json::from_slice(body)?;
    let fields = document
        .pointer("/global-options/vpc-flow-logs/custom-fields")
        .and_then(JsonValue::as_array)
        .map(|fields| {
            fields
                .iter()
                .filter_map(|field| field.as_str().map(str::to_string))
                .collect()
        });
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    enum FakeBucket {
        Object(&'static str),
        Missing,
        Broken,
    }

    #[async_trait]
    impl ObjectStore for FakeBucket {
        async fn read(
            &self,
            bucket: &str,
            key: &str,
        ) -> std::result::Result<Vec<u8>, ObjectStoreError> {
            match self {
                FakeBucket::Object(body) => Ok(body.as_bytes().to_vec()),
                FakeBucket::Missing => Err(ObjectStoreError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }),
                FakeBucket::Broken => Err(anyhow::anyhow!("AccessDenied").into()),
            }
        }
    }

    #[tokio::test]
    async fn test_lza_fields() {
        let store = FakeBucket::Object(
            "vpcFlowLogs:\n  trafficType: ALL\n  customFields:\n    - version\n    - srcaddr\n    - dstaddr\n",
        );
        let fields = lookup(&store, "ABC", Some(Accelerator::Lza), "cbs-abc")
            .await
            .unwrap();
        assert_eq!(fields, "version,srcaddr,dstaddr");
    }

    #[tokio::test]
    async fn test_asea_fields() {
        let store = FakeBucket::Object(
            r#"{"global-options": {"vpc-flow-logs": {"custom-fields": ["version", "vpc-id"]}}}"#,
        );
        let fields = lookup(&store, "ABC", Some(Accelerator::Asea), "cbs-abc")
            .await
            .unwrap();
        assert_eq!(fields, "version,vpc-id");
    }

    #[tokio::test]
    async fn test_fallbacks_to_defaults() {
        let cases = [
            (FakeBucket::Missing, Accelerator::Lza),
            (FakeBucket::Object("vpcFlowLogs: [unclosed"), Accelerator::Lza),
            (FakeBucket::Object("{\"global-options\": {}}"), Accelerator::Asea),
            (FakeBucket::Object("not json"), Accelerator::Asea),
        ];

        for (store, accelerator) in cases {
            let fields = lookup(&store, "ABC", Some(accelerator), "cbs-abc")
                .await
                .unwrap();
            assert_eq!(fields, default_fields());
        }
    }

    #[tokio::test]
    async fn test_no_accelerator_uses_defaults() {
        let fields = lookup(&FakeBucket::Broken, "ABC", None, "cbs-abc")
            .await
            .unwrap();
        assert_eq!(fields.split(',').count(), 27);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let result = lookup(&FakeBucket::Broken, "ABC", Some(Accelerator::Lza), "cbs-abc").await;
        assert!(result.is_err());
    }
}

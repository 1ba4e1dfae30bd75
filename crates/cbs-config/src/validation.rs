// Configuration validation
//
// Shared settings are checked on load. Lambda-specific sections are checked
// when a Lambda asks for them, since each Lambda only carries its own.

use crate::{RuntimeConfig, TransportConfig, TriageConfig};
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    if config.aws.region.trim().is_empty() {
        bail!("aws.region must not be empty (set AWS_REGION)");
    }

    if let Some(ref logging) = config.logging {
        if logging.level.trim().is_empty() {
            bail!("logging.level must not be empty");
        }
    }

    Ok(())
}

pub fn validate_transport_config(config: &TransportConfig) -> Result<()> {
    require(&config.release, "transport.release", "VERSION")?;
    require(&config.queue_url, "transport.queue_url", "CBS_SQS_URL")?;
    require(
        &config.dead_letter_queue_url,
        "transport.dead_letter_queue_url",
        "CBS_DLQ_URL",
    )?;
    require(
        &config.inventory_table,
        "transport.inventory_table",
        "INVENTORY_TABLE_NAME",
    )?;
    require(
        &config.devops_role_arn,
        "transport.devops_role_arn",
        "CBS_DEVOPS_ROLE_ARN",
    )?;
    require(
        &config.reader_role_arn,
        "transport.reader_role_arn",
        "CBS_READER_ROLE_ARN",
    )?;
    require(
        &config.alarm_suppression_table,
        "transport.alarm_suppression_table",
        "CBS_ALARM_SUPPRESSION_TABLE_NAME",
    )?;
    require(
        &config.pipeline_name,
        "transport.pipeline_name",
        "CICD_PIPELINE_NAME",
    )?;

    if config.queue_url == config.dead_letter_queue_url {
        warn!(
            queue_url = %config.queue_url,
            "Success queue and dead-letter queue are the same queue"
        );
    }

    Ok(())
}

pub fn validate_triage_config(config: &TriageConfig) -> Result<()> {
    require(
        &config.unknown_workloads_table,
        "triage.unknown_workloads_table",
        "UNKNOWN_WORKLOADS_TABLE_NAME",
    )?;
    require(
        &config.unknown_workloads_topic_arn,
        "triage.unknown_workloads_topic_arn",
        "UNKNOWN_WORKLOADS_TOPIC_ARN",
    )
}

fn require(value: &str, field: &str, env_var: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{} must be set (env: {})", field, env_var);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_transport() -> TransportConfig {
        TransportConfig {
            release: "2.4.0".to_string(),
            queue_url: "https://sqs/cbs".to_string(),
            dead_letter_queue_url: "https://sqs/cbs-dlq".to_string(),
            inventory_table: "PartnerInventory".to_string(),
            devops_role_arn: "arn:aws:iam::1:role/DevOps".to_string(),
            reader_role_arn: "arn:aws:iam::1:role/Reader".to_string(),
            alarm_suppression_table: "AlarmSuppression".to_string(),
            pipeline_name: "cbs-alarms".to_string(),
        }
    }

    #[test]
    fn test_complete_transport_config() {
        assert!(validate_transport_config(&complete_transport()).is_ok());
    }

    #[test]
    fn test_missing_value_names_env_var() {
        let config = TransportConfig {
            inventory_table: "  ".to_string(),
            ..complete_transport()
        };
        let err = validate_transport_config(&config).unwrap_err();
        assert!(err.to_string().contains("INVENTORY_TABLE_NAME"));
    }

    #[test]
    fn test_triage_config_requires_topic() {
        let config = TriageConfig {
            unknown_workloads_table: "UnknownWorkloads".to_string(),
            unknown_workloads_topic_arn: String::new(),
        };
        let err = validate_triage_config(&config).unwrap_err();
        assert!(err.to_string().contains("UNKNOWN_WORKLOADS_TOPIC_ARN"));
    }
}

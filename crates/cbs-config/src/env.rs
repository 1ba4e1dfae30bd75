use crate::{LogFormat, LoggingConfig, RuntimeConfig, TransportConfig, TriageConfig};
use anyhow::{Context, Result};

pub const ENV_PREFIX: &str = "CBS_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the CBS_ prefix
    /// Used for the deployed variable names and AWS standard variables
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        ensure_logging(config).level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        ensure_logging(config).format = format
            .parse::<LogFormat>()
            .context("Invalid CBS_LOG_FORMAT value")?;
    }

    // AWS
    if let Some(region) = env.get_raw("AWS_REGION") {
        config.aws.region = region;
    }
    if let Some(function_name) = env.get_raw("AWS_LAMBDA_FUNCTION_NAME") {
        config.aws.function_name = Some(function_name);
    }

    // Transport Lambda
    let transport_keys: [(&str, fn(&mut TransportConfig) -> &mut String); 8] = [
        ("VERSION", |c| &mut c.release),
        ("CBS_SQS_URL", |c| &mut c.queue_url),
        ("CBS_DLQ_URL", |c| &mut c.dead_letter_queue_url),
        ("INVENTORY_TABLE_NAME", |c| &mut c.inventory_table),
        ("CBS_DEVOPS_ROLE_ARN", |c| &mut c.devops_role_arn),
        ("CBS_READER_ROLE_ARN", |c| &mut c.reader_role_arn),
        ("CBS_ALARM_SUPPRESSION_TABLE_NAME", |c| &mut c.alarm_suppression_table),
        ("CICD_PIPELINE_NAME", |c| &mut c.pipeline_name),
    ];
    for (key, field) in transport_keys {
        if let Some(value) = env.get_raw(key) {
            *field(config.transport.get_or_insert_with(TransportConfig::default)) = value;
        }
    }

    // DLQ triage Lambda
    if let Some(table) = env.get_raw("UNKNOWN_WORKLOADS_TABLE_NAME") {
        ensure_triage(config).unknown_workloads_table = table;
    }
    if let Some(topic_arn) = env.get_raw("UNKNOWN_WORKLOADS_TOPIC_ARN") {
        ensure_triage(config).unknown_workloads_topic_arn = topic_arn;
    }

    Ok(())
}

fn ensure_logging(config: &mut RuntimeConfig) -> &mut LoggingConfig {
    config.logging.get_or_insert_with(LoggingConfig::default)
}

fn ensure_triage(config: &mut RuntimeConfig) -> &mut TriageConfig {
    config.triage.get_or_insert_with(TriageConfig::default)
}

// cbs-config - Configuration for the CBS Lambdas
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority). The deployed variable names
//    (VERSION, CBS_SQS_URL, INVENTORY_TABLE_NAME, ...) are read as-is; tuning
//    knobs use the CBS_ prefix (CBS_LOG_LEVEL, CBS_LOG_FORMAT)
// 2. Config file path from CBS_CONFIG
// 3. Config file contents from CBS_CONFIG_CONTENT
// 4. Platform-specific defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env;
mod platform;
mod sources;
mod validation;

pub use env::{EnvSource, ENV_PREFIX};
pub use platform::Platform;

pub const DEFAULT_REGION: &str = "ca-central-1";

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triage: Option<TriageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,

    /// Lambda function name, used to label assumed-role sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            function_name: None,
        }
    }
}

/// Transport Lambda settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Release stamped on forwarded messages
    pub release: String,
    pub queue_url: String,
    pub dead_letter_queue_url: String,
    pub inventory_table: String,
    pub devops_role_arn: String,
    pub reader_role_arn: String,
    pub alarm_suppression_table: String,
    pub pipeline_name: String,
}

/// DLQ triage Lambda settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub unknown_workloads_table: String,
    pub unknown_workloads_topic_arn: String,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        let platform = Platform::detect();
        sources::load_config(platform)
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform)
    }

    /// Build a configuration from inline TOML plus overrides from `env`
    pub fn load_for_platform_with_env<E: EnvSource>(
        platform: Platform,
        inline_config: Option<&str>,
        env: &E,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::from_platform_defaults(platform);

        if let Some(inline) = inline_config {
            config.merge(sources::parse(inline, "inline config content")?);
        }

        env::apply_env_overrides(&mut config, env)?;
        config.validate()?;
        Ok(config)
    }

    /// Construct a config that contains only platform defaults (no env or files).
    pub fn from_platform_defaults(platform: Platform) -> Self {
        let defaults = platform.defaults();
        Self {
            logging: Some(LoggingConfig {
                level: defaults.log_level.to_string(),
                format: defaults.log_format,
            }),
            aws: AwsConfig::default(),
            transport: None,
            triage: None,
        }
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.aws = other.aws;

        if other.logging.is_some() {
            self.logging = other.logging;
        }
        if other.transport.is_some() {
            self.transport = other.transport;
        }
        if other.triage.is_some() {
            self.triage = other.triage;
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Transport settings, rejected if any required value is missing
    pub fn transport(&self) -> Result<&TransportConfig> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("transport configuration is missing"))?;
        validation::validate_transport_config(transport)?;
        Ok(transport)
    }

    /// Triage settings, rejected if any required value is missing
    pub fn triage(&self) -> Result<&TriageConfig> {
        let triage = self
            .triage
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("triage configuration is missing"))?;
        validation::validate_triage_config(triage)?;
        Ok(triage)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

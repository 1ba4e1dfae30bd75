// Configuration source loading.
//
// Priority order:
// 1. Environment variables (deployed names and CBS_* knobs)
// 2. Config file path from CBS_CONFIG
// 3. Inline config content from CBS_CONFIG_CONTENT
// 4. Platform defaults (based on auto-detected Platform)

use crate::env::{self, EnvSource, ENV_PREFIX};
use crate::platform::Platform;
use crate::RuntimeConfig;
use anyhow::{Context, Result};

/// Load configuration for the given platform from the process environment.
pub fn load_config(platform: Platform) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_platform_defaults(platform);

    if let Some(file_config) = load_from_file()? {
        config.merge(file_config);
    }

    env::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = std::env::var("CBS_CONFIG") {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        return parse(&content, &path).map(Some);
    }

    if let Ok(content) = std::env::var("CBS_CONFIG_CONTENT") {
        return parse(&content, "CBS_CONFIG_CONTENT").map(Some);
    }

    Ok(None)
}

pub(crate) fn parse(content: &str, origin: &str) -> Result<RuntimeConfig> {
    toml::from_str(content).with_context(|| format!("Failed to parse config from {}", origin))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_origin() {
        let err = parse("[logging\nlevel = 1", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_parse_transport_section() {
        let config = parse(
            r#"
            [aws]
            region = "ca-west-1"

            [transport]
            release = "2.4.0"
            queue_url = "https://sqs.ca-central-1.amazonaws.com/1/cbs"
            "#,
            "test",
        )
        .unwrap();

        assert_eq!(config.aws.region, "ca-west-1");
        let transport = config.transport.unwrap();
        assert_eq!(transport.release, "2.4.0");
        assert!(transport.inventory_table.is_empty());
    }
}

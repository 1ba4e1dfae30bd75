// cbs-lambda - Lambda entry points for the CBS transport and DLQ triage
//
// Uses lambda_runtime's tokio. Collaborators are built once per cold start
// and shared across invocations; nothing else survives between events.

use cbs_config::{LogFormat, LoggingConfig, Platform, RuntimeConfig};
use tracing::info;

pub mod transport;
pub mod triage;

pub const GIT_HASH: &str = env!("GIT_HASH");
pub const BUILD_TIMESTAMP: &str = env!("BUILD_TIMESTAMP");

/// Configuration for the detected platform
pub fn load_config() -> anyhow::Result<RuntimeConfig> {
    RuntimeConfig::load_for_platform(Platform::detect())
}

/// Initialize tracing; `RUST_LOG` takes precedence over the configured level
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match logging.format {
        LogFormat::Json => {
            registry.with(fmt::layer().json()).init();
        }
        LogFormat::Text => {
            registry.with(fmt::layer()).init();
        }
    }
}

pub fn log_build_info(function: &str) {
    info!(
        function,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = GIT_HASH,
        build_timestamp = BUILD_TIMESTAMP,
        "Cold start"
    );
}

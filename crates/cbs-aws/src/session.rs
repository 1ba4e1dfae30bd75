//! SDK configuration and assumed-role sessions.

use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use tracing::info;

/// STS caps role session names at 64 characters
const MAX_SESSION_NAME_LEN: usize = 64;

/// Base configuration with the function's own credentials
pub async fn load(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Configuration whose credentials come from assuming `role_arn`
///
/// Credentials are fetched lazily on the first call and refreshed by the
/// provider when they expire.
pub async fn assume_role(base: &SdkConfig, role_arn: &str, session_name: &str) -> SdkConfig {
    info!(role_arn, session_name, "Using assumed role credentials");
    let provider = AssumeRoleProvider::builder(role_arn)
        .session_name(session_name)
        .configure(base)
        .build()
        .await;
    base.to_builder()
        .credentials_provider(SharedCredentialsProvider::new(provider))
        .build()
}

/// `{function}-{purpose}`, trimmed to what STS accepts
pub fn session_name(function_name: Option<&str>, purpose: &str) -> String {
    let name = match function_name {
        Some(function) if !function.is_empty() => format!("{}-{}", function, purpose),
        _ => purpose.to_string(),
    };
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || "+=,.@-_".contains(*c))
        .take(MAX_SESSION_NAME_LEN)
        .collect()
}

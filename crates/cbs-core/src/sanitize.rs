//! Object key sanitizer.
//!
//! Reduces an object key to a "shape" that is stable across partners,
//! accounts, regions and dates so that unknown workloads can be grouped.

use once_cell::sync::Lazy;
use regex::Regex;

/// Keys containing one of these collapse to the fragment itself
pub const COMPLEX_KEYS: &[&str] = &[
    "macie",
    "ec2-patching",
    "ssm-patching",
    "replication-completion-report",
];

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)(\d{4}/\d{1,2}/\d{1,2}/?\d{0,2})(.*)$").expect("date pattern must compile")
});
static ORGANIZATION_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/?o-[a-z0-9]{10,32}/?").expect("org pattern must compile"));
static ACCOUNT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/?-?\d{12}").expect("account pattern must compile"));
static REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/?-?[a-z]{2}-[a-z]{4,}-\d").expect("region pattern must compile"));

/// Sanitize an object key into its shape. An empty result means there is
/// nothing worth tracking.
pub fn sanitize(object_key: &str) -> String {
    if let Some(complex) = COMPLEX_KEYS.iter().find(|key| object_key.contains(*key)) {
        return (*complex).to_string();
    }

    strip_variable_parts(drop_filename(object_key))
}

fn drop_filename(object_key: &str) -> &str {
    object_key
        .rsplit_once('/')
        .map(|(head, _)| head)
        .unwrap_or(object_key)
}

/// Date, organization, account and region stages, in that order
pub(crate) fn strip_variable_parts(key: &str) -> String {
    let key = drop_date(key);
    let key = ORGANIZATION_ID.replace_all(&key, "").into_owned();
    let key = drop_account_id(&key);
    drop_region(&key)
}

fn drop_date(key: &str) -> String {
    match DATE.captures(key) {
        Some(captures) => {
            let mut stripped = captures[1].to_string();
            if let Some(suffix) = captures.get(3) {
                stripped.push_str(suffix.as_str());
            }
            stripped
        }
        None => key.to_string(),
    }
}

fn drop_account_id(key: &str) -> String {
    ACCOUNT_ID.replace_all(key, "").replace("/accountid=", "")
}

fn drop_region(key: &str) -> String {
    REGION.replace_all(key, "").replace("/region=", "")
}

//! Workload inference from object keys.
//!
//! Each accelerator owns an ordered table of `(pattern, workload)` rules. The
//! LZA and ASEA tables are the default table with their own rules appended.
//! The first pattern found anywhere in the lower-cased key wins, so rule
//! order matters: `cloudwatchlogs/vpcflowlogs/` must be tried before the
//! catch-all `cloudwatchlogs`.

use crate::partner::Accelerator;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// Semantic category of a replicated log object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Workload(&'static str);

impl Workload {
    pub fn as_str(&self) -> &'static str {
        self.0
    }

    /// VPC flow logs carry the partner's custom field list downstream
    pub fn is_vpc_flow_logs(&self) -> bool {
        matches!(self.0, "vpcFlowLogs" | "cloudwatch.vpcFlowLogs")
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for Workload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Object key fragments that are replicated but never forwarded
pub const UNSUPPORTED_WORKLOADS: &[&str] = &[
    "/CloudTrail-Digest/",
    "/CloudTrail-Insight/",
    "ConfigWritabilityCheckFile",
    "Cost-and-Usage-Report",
    "ELBAccessLogTestFile",
    "/SSM/",
];

/// Object key written by both accelerators after a successful pipeline run
pub const ACCELERATOR_METADATA_OBJECT_KEY: &str = "metadata.json";

const DEFAULT_RULES: &[(&str, &str)] = &[
    ("/cloudtrail/", "cloudtrailLogs"),
    (r"[\d]{12}/config/", "configLogs"),
    ("cloudwatchlogs/vpcflowlogs/", "cloudwatch.vpcFlowLogs"),
    (r"[\d]{12}/vpcflowlogs/", "vpcFlowLogs"),
    ("cloudwatchlogs/managed-ad", "cloudwatch.managedADLogs"),
    ("cloudwatchlogs/nfw", "cloudwatch.nfwLogs"),
    ("cloudwatchlogs/rql", "cloudwatch.rqlLogs"),
    ("cloudwatchlogs/security-hub", "cloudwatch.securityHubLogs"),
    ("cloudwatchlogs/ssm", "cloudwatch.ssm"),
    ("cloudwatchlogs/transport-lambda", "cloudwatch.transportLambdaLogs"),
    ("cloudwatchlogs", "cloudwatchLogs"),
    (r"[\d]{12}/elb-", "elbLogsV2"),
    ("/guardduty/", "guardDutyLogs"),
    ("ssm-inventory/aws:application", "ssmInventory.application"),
    ("ssm-inventory/aws:awscomponent", "ssmInventory.awsComponent"),
    ("ssm-inventory/aws:billinginfo", "ssmInventory.billingInfo"),
    ("ssm-inventory/aws:complianceitem", "ssmInventory.complianceItem"),
    ("ssm-inventory/aws:compliancesummary", "ssmInventory.complianceSummary"),
    (
        "ssm-inventory/aws:instancedetailedinformation",
        "ssmInventory.instancedetailedInformation",
    ),
    ("ssm-inventory/aws:instanceinformation", "ssmInventory.instanceInformation"),
    ("ssm-inventory/aws:network", "ssmInventory.network"),
    ("ssm-inventory/aws:service", "ssmInventory.service"),
    ("ssm-inventory/aws:tag", "ssmInventory.tag"),
    ("ssm-inventory/aws:windowsrole", "ssmInventory.windowsRole"),
    ("ssm-inventory/aws:windowsupdate", "ssmInventory.windowsUpdate"),
    ("/cbs-metadata/iam.json", "metadata.iam"),
    ("/cbs-metadata/sso.json", "metadata.sso"),
];

const LZA_RULES: &[(&str, &str)] = &[
    (
        r"\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}-[a-z0-9]{16}$",
        "s3AccessLogs",
    ),
    ("config/global-config.yaml", "lzaMetadata.configFile"),
    ("config/service-control-policies/", "lzaMetadata.scp"),
    ("metadata.json", "lzaMetadata"),
];

const ASEA_RULES: &[(&str, &str)] = &[
    ("config/config.json", "aseaMetadata.configFile"),
    ("config/scp/", "aseaMetadata.scp"),
    ("metadata.json", "aseaMetadata"),
];

/// A compiled classification rule
#[derive(Debug)]
pub struct Rule {
    pattern: Regex,
    workload: Workload,
}

impl Rule {
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn workload(&self) -> Workload {
        self.workload
    }
}

fn compile<'a>(rules: impl Iterator<Item = &'a (&'static str, &'static str)>) -> Vec<Rule> {
    rules
        .map(|&(pattern, workload)| Rule {
            pattern: Regex::new(pattern).expect("built-in workload pattern must compile"),
            workload: Workload(workload),
        })
        .collect()
}

static DEFAULT_TABLE: Lazy<Vec<Rule>> = Lazy::new(|| compile(DEFAULT_RULES.iter()));
static LZA_TABLE: Lazy<Vec<Rule>> =
    Lazy::new(|| compile(DEFAULT_RULES.iter().chain(LZA_RULES.iter())));
static ASEA_TABLE: Lazy<Vec<Rule>> =
    Lazy::new(|| compile(DEFAULT_RULES.iter().chain(ASEA_RULES.iter())));

/// Ordered rule table for an accelerator (default table when unknown)
pub fn table(accelerator: Option<Accelerator>) -> &'static [Rule] {
    match accelerator {
        None => &DEFAULT_TABLE,
        Some(Accelerator::Lza) => &LZA_TABLE,
        Some(Accelerator::Asea) => &ASEA_TABLE,
    }
}

/// Infer the workload of `object_key`; `None` means no rule matched
pub fn classify(object_key: &str, accelerator: Option<Accelerator>) -> Option<Workload> {
    let key = object_key.to_lowercase();
    table(accelerator)
        .iter()
        .find(|rule| rule.pattern.is_match(&key))
        .map(|rule| rule.workload)
}

/// False when the key contains a denylisted fragment
pub fn is_supported_workload(object_key: &str) -> bool {
    !UNSUPPORTED_WORKLOADS
        .iter()
        .any(|unsupported| object_key.contains(unsupported))
}

/// Seam for swapping the table-driven classifier out in tests
pub trait WorkloadClassifier: Send + Sync {
    fn classify(&self, object_key: &str, accelerator: Option<Accelerator>) -> Option<Workload>;
}

/// The built-in regex table classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct TableClassifier;

impl WorkloadClassifier for TableClassifier {
    fn classify(&self, object_key: &str, accelerator: Option<Accelerator>) -> Option<Workload> {
        classify(object_key, accelerator)
    }
}

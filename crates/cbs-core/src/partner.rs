//! Partner inventory records and the per-invocation snapshot of them.

use crate::ports::PartnerRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Landing-zone framework a partner uses to lay out their logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accelerator {
    Asea,
    Lza,
}

impl Accelerator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accelerator::Asea => "asea",
            Accelerator::Lza => "lza",
        }
    }
}

impl fmt::Display for Accelerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Accelerator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "asea" => Ok(Accelerator::Asea),
            "lza" => Ok(Accelerator::Lza),
            _ => anyhow::bail!("Unsupported accelerator: {}. Supported: asea, lza", s),
        }
    }
}

/// One row of the partner inventory table
///
/// The accelerator is kept as the raw stored string; it is only parsed when
/// a classification table has to be chosen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Partner {
    pub account_id: String,
    pub cbs_id: String,
    #[serde(default)]
    pub accelerator: Option<String>,
    pub bucket_name: String,
    pub kms_arn: String,
    #[serde(default)]
    pub deployed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_custom_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclosure_expiry: Option<String>,
}

impl Partner {
    pub fn new(
        account_id: impl Into<String>,
        cbs_id: impl Into<String>,
        bucket_name: impl Into<String>,
        kms_arn: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            cbs_id: cbs_id.into(),
            accelerator: None,
            bucket_name: bucket_name.into(),
            kms_arn: kms_arn.into(),
            deployed: false,
            org_id: None,
            mgmt_account_id: None,
            vpc_custom_fields: None,
            disclosure_expiry: None,
        }
    }

    /// Apply a single-attribute update in place
    pub fn apply(&mut self, update: &PartnerUpdate) {
        match update {
            PartnerUpdate::Deployed(deployed) => self.deployed = *deployed,
            PartnerUpdate::OrgId(org_id) => self.org_id = Some(org_id.clone()),
            PartnerUpdate::Accelerator(accelerator) => {
                self.accelerator = Some(accelerator.as_str().to_string())
            }
            PartnerUpdate::VpcCustomFields(fields) => self.vpc_custom_fields = Some(fields.clone()),
        }
    }
}

/// Attributes the transport is allowed to change on a partner record
#[derive(Debug, Clone, PartialEq)]
pub enum PartnerUpdate {
    Deployed(bool),
    OrgId(String),
    Accelerator(Accelerator),
    VpcCustomFields(String),
}

impl PartnerUpdate {
    /// Inventory table attribute name
    pub fn attribute(&self) -> &'static str {
        match self {
            PartnerUpdate::Deployed(_) => "deployed",
            PartnerUpdate::OrgId(_) => "org-id",
            PartnerUpdate::Accelerator(_) => "accelerator",
            PartnerUpdate::VpcCustomFields(_) => "vpc-custom-fields",
        }
    }
}

impl fmt::Display for PartnerUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartnerUpdate::Deployed(deployed) => write!(f, "{}", deployed),
            PartnerUpdate::OrgId(org_id) => f.write_str(org_id),
            PartnerUpdate::Accelerator(accelerator) => write!(f, "{}", accelerator),
            PartnerUpdate::VpcCustomFields(fields) => f.write_str(fields),
        }
    }
}

/// Read-through copy of the partner inventory owned by one invocation
///
/// Loaded once at the start of an invocation and dropped at its end. Updates
/// made while processing the event land here as well as in the registry so
/// later lookups in the same invocation see them.
#[derive(Debug, Clone, Default)]
pub struct PartnerSnapshot {
    partners: BTreeMap<String, Partner>,
}

impl PartnerSnapshot {
    pub fn new(partners: impl IntoIterator<Item = Partner>) -> Self {
        Self {
            partners: partners
                .into_iter()
                .map(|partner| (partner.account_id.clone(), partner))
                .collect(),
        }
    }

    /// Scan the registry into a fresh snapshot
    pub async fn load(registry: &dyn PartnerRegistry) -> anyhow::Result<Self> {
        let partners = registry.get_all().await?;
        tracing::debug!(count = partners.len(), "Loaded partner inventory");
        Ok(Self::new(partners))
    }

    pub fn get(&self, account_id: &str) -> Option<&Partner> {
        self.partners.get(account_id)
    }

    /// Account ID of the first partner whose CBS ID prefixes `object_key`
    pub fn find_by_key_prefix(&self, object_key: &str) -> Option<&str> {
        self.partners
            .iter()
            .find(|(_, partner)| object_key.starts_with(&partner.cbs_id))
            .map(|(account_id, _)| account_id.as_str())
    }

    /// Returns false when the account is not in the snapshot
    pub fn apply(&mut self, account_id: &str, update: &PartnerUpdate) -> bool {
        match self.partners.get_mut(account_id) {
            Some(partner) => {
                partner.apply(update);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

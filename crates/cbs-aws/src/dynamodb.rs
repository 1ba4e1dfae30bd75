//! DynamoDB-backed registries: partner inventory, unknown workloads and
//! alarm suppressions.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use cbs_core::ports::{PartnerRegistry, SuppressionStore, UnknownWorkloadRegistry};
use cbs_core::triage::parse_first_received;
use cbs_core::{AlarmSuppression, Partner, PartnerUpdate, UnknownWorkloadEntry};
use std::collections::HashMap;
use tracing::{debug, warn};

type Item = HashMap<String, AttributeValue>;

/// Partner inventory, keyed by (`account-id`, `cbs-id`)
pub struct PartnerInventoryTable {
    client: Client,
    table_name: String,
}

impl PartnerInventoryTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_config(config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }

    async fn get_item(&self, account_id: &str, cbs_id: &str) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("account-id", AttributeValue::S(account_id.to_string()))
            .key("cbs-id", AttributeValue::S(cbs_id.to_string()))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to get '{}' from '{}': {}",
                    cbs_id,
                    self.table_name,
                    DisplayErrorContext(&e)
                )
            })?;
        Ok(output.item().cloned())
    }
}

#[async_trait]
impl PartnerRegistry for PartnerInventoryTable {
    async fn get_all(&self) -> Result<Vec<Partner>> {
        let mut partners = Vec::new();
        let mut start_key = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| {
                    anyhow!(
                        "Failed to scan '{}': {}",
                        self.table_name,
                        DisplayErrorContext(&e)
                    )
                })?;

            for item in output.items() {
                match partner_from_item(item) {
                    Ok(partner) => partners.push(partner),
                    Err(err) => warn!(table = %self.table_name, "Skipping partner record: {}", err),
                }
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(table = %self.table_name, count = partners.len(), "Scanned partner inventory");
        Ok(partners)
    }

    async fn get(&self, account_id: &str, cbs_id: &str) -> Result<Option<Partner>> {
        self.get_item(account_id, cbs_id)
            .await?
            .map(|item| partner_from_item(&item))
            .transpose()
    }

    async fn update(&self, account_id: &str, cbs_id: &str, update: &PartnerUpdate) -> Result<()> {
        if self.get_item(account_id, cbs_id).await?.is_none() {
            bail!("Failed to find '{}' in DynamoDB table", cbs_id);
        }

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("account-id", AttributeValue::S(account_id.to_string()))
            .key("cbs-id", AttributeValue::S(cbs_id.to_string()))
            .update_expression("set #fn = :val1")
            .expression_attribute_names("#fn", update.attribute())
            .expression_attribute_values(":val1", update_value(update))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to update '{}' on '{}': {}",
                    update.attribute(),
                    cbs_id,
                    DisplayErrorContext(&e)
                )
            })?;

        debug!(cbs_id, attribute = update.attribute(), value = %update, "Updated partner");
        Ok(())
    }
}

/// Sanitized unknown-workload shapes, keyed by `object_key`
pub struct UnknownWorkloadTable {
    client: Client,
    table_name: String,
}

impl UnknownWorkloadTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_config(config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }
}

#[async_trait]
impl UnknownWorkloadRegistry for UnknownWorkloadTable {
    async fn get(&self, sanitized_key: &str) -> Result<Option<UnknownWorkloadEntry>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("object_key", AttributeValue::S(sanitized_key.to_string()))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to get '{}' from '{}': {}",
                    sanitized_key,
                    self.table_name,
                    DisplayErrorContext(&e)
                )
            })?;

        output
            .item()
            .map(unknown_workload_from_item)
            .transpose()
            .with_context(|| format!("Invalid unknown workload record '{}'", sanitized_key))
    }

    async fn upsert(&self, sanitized_key: &str, entry: &UnknownWorkloadEntry) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(unknown_workload_item(sanitized_key, entry)))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to write '{}' to '{}': {}",
                    sanitized_key,
                    self.table_name,
                    DisplayErrorContext(&e)
                )
            })?;
        Ok(())
    }
}

pub struct AlarmSuppressionTable {
    client: Client,
    table_name: String,
}

impl AlarmSuppressionTable {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_config(config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }
}

#[async_trait]
impl SuppressionStore for AlarmSuppressionTable {
    async fn put(&self, suppression: &AlarmSuppression) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(suppression_item(suppression)))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to suppress {} for '{}': {}",
                    suppression.alarm_type,
                    suppression.cbs_id,
                    DisplayErrorContext(&e)
                )
            })?;
        debug!(
            cbs_id = %suppression.cbs_id,
            alarm_type = %suppression.alarm_type,
            expires_at = %suppression.expires_at.to_rfc3339(),
            "Alarm suppressed"
        );
        Ok(())
    }
}

fn required_string(item: &Item, name: &str) -> Result<String> {
    optional_string(item, name).with_context(|| format!("Missing string attribute '{}'", name))
}

/// `NULL` and non-string values read as absent
fn optional_string(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|value| value.as_s().ok())
        .cloned()
}

fn partner_from_item(item: &Item) -> Result<Partner> {
    let deployed = match item.get("deployed") {
        Some(AttributeValue::Bool(deployed)) => *deployed,
        Some(AttributeValue::S(deployed)) => deployed.eq_ignore_ascii_case("true"),
        _ => false,
    };

    Ok(Partner {
        account_id: required_string(item, "account-id")?,
        cbs_id: required_string(item, "cbs-id")?,
        accelerator: optional_string(item, "accelerator"),
        bucket_name: required_string(item, "bucket-name")?,
        kms_arn: required_string(item, "kms-arn")?,
        deployed,
        org_id: optional_string(item, "org-id"),
        mgmt_account_id: optional_string(item, "mgmt-account-id"),
        vpc_custom_fields: optional_string(item, "vpc-custom-fields"),
        disclosure_expiry: optional_string(item, "disclosure-expiry"),
    })
}

fn update_value(update: &PartnerUpdate) -> AttributeValue {
    match update {
        PartnerUpdate::Deployed(deployed) => AttributeValue::Bool(*deployed),
        other => AttributeValue::S(other.to_string()),
    }
}

fn unknown_workload_from_item(item: &Item) -> Result<UnknownWorkloadEntry> {
    let first_received = parse_first_received(&required_string(item, "first_received")?)?;
    let hit_count = match item.get("hit_count") {
        Some(AttributeValue::N(count)) => count
            .parse()
            .with_context(|| format!("Invalid hit_count '{}'", count))?,
        _ => bail!("Missing number attribute 'hit_count'"),
    };
    Ok(UnknownWorkloadEntry {
        first_received,
        hit_count,
    })
}

fn unknown_workload_item(sanitized_key: &str, entry: &UnknownWorkloadEntry) -> Item {
    HashMap::from([
        (
            "object_key".to_string(),
            AttributeValue::S(sanitized_key.to_string()),
        ),
        (
            "first_received".to_string(),
            AttributeValue::S(entry.first_received.to_rfc3339()),
        ),
        (
            "hit_count".to_string(),
            AttributeValue::N(entry.hit_count.to_string()),
        ),
    ])
}

fn suppression_item(suppression: &AlarmSuppression) -> Item {
    HashMap::from([
        (
            "cbs-id".to_string(),
            AttributeValue::S(suppression.cbs_id.clone()),
        ),
        (
            "alarm-type".to_string(),
            AttributeValue::S(suppression.alarm_type.as_str().to_string()),
        ),
        (
            "suppression-expiry".to_string(),
            AttributeValue::S(suppression.expires_at.to_rfc3339()),
        ),
    ])
}

//! In-memory fakes for the transport and triage ports
//!
//! Every fake records what it was asked to do so tests can assert on side
//! effects without AWS.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use cbs_core::ports::{
    MessageQueue, Notifier, ObjectStore, PartnerRegistry, PipelineTrigger, SuppressionStore,
    UnknownWorkloadRegistry,
};
use cbs_core::{
    Accelerator, AlarmSuppression, InvocationContext, ObjectStoreError, Partner, PartnerUpdate,
    TableClassifier, Transport, TransportPorts, TransportSettings, UnknownWorkloadEntry, Workload,
    WorkloadClassifier,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ACCOUNT_ID: &str = "123456789012";
pub const CBS_ID: &str = "ABC";
pub const BUCKET: &str = "cbs-abc-replication";
pub const READER_ROLE_ARN: &str = "arn:aws:iam::999999999999:role/CbsReaderRole";
pub const RELEASE: &str = "2.4.0";

pub fn partner(accelerator: Option<&str>, deployed: bool) -> Partner {
    let mut partner = Partner::new(
        ACCOUNT_ID,
        CBS_ID,
        BUCKET,
        "arn:aws:kms:ca-central-1:123456789012:key/abc",
    );
    partner.accelerator = accelerator.map(str::to_string);
    partner.deployed = deployed;
    partner
}

/// CloudTrail "replicated via API call" event
pub fn replication_event(object_key: &str) -> Value {
    json!({
        "version": "0",
        "id": "7bf73129-1428-4cd3-a780-95db273d1602",
        "detail-type": "AWS API Call via CloudTrail",
        "source": "aws.s3",
        "account": "999999999999",
        "time": "2024-03-01T12:00:00Z",
        "region": "ca-central-1",
        "detail": {
            "eventName": "PutObject",
            "userIdentity": {"accountId": ACCOUNT_ID},
            "requestParameters": {"bucketName": BUCKET, "key": object_key},
            "additionalEventData": {"bytesTransferredIn": 1024.0},
        }
    })
}

/// S3 "Object Created" event, which carries no identity
pub fn object_created_event(object_key: &str) -> Value {
    json!({
        "version": "0",
        "detail-type": "Object Created",
        "source": "aws.s3",
        "account": "999999999999",
        "detail": {
            "bucket": {"name": BUCKET},
            "object": {"key": object_key, "size": 2048},
        }
    })
}

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
}

pub fn context() -> InvocationContext {
    InvocationContext {
        request_id: "c6af9ac6-7b61-11e6-9a41-93e812345678".to_string(),
        memory_limit_mb: Some(256),
        received_at: at(1),
    }
}

#[derive(Default)]
pub struct InMemoryRegistry {
    partners: Mutex<BTreeMap<String, Partner>>,
    updates: Mutex<Vec<(String, PartnerUpdate)>>,
}

impl InMemoryRegistry {
    pub fn with(partners: impl IntoIterator<Item = Partner>) -> Self {
        let registry = Self::default();
        registry.partners.lock().unwrap().extend(
            partners
                .into_iter()
                .map(|partner| (partner.account_id.clone(), partner)),
        );
        registry
    }

    pub fn stored(&self, account_id: &str) -> Partner {
        self.partners.lock().unwrap()[account_id].clone()
    }

    pub fn updates(&self) -> Vec<(String, PartnerUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl PartnerRegistry for InMemoryRegistry {
    async fn get_all(&self) -> Result<Vec<Partner>> {
        Ok(self.partners.lock().unwrap().values().cloned().collect())
    }

    async fn get(&self, account_id: &str, cbs_id: &str) -> Result<Option<Partner>> {
        Ok(self
            .partners
            .lock()
            .unwrap()
            .get(account_id)
            .filter(|partner| partner.cbs_id == cbs_id)
            .cloned())
    }

    async fn update(&self, account_id: &str, cbs_id: &str, update: &PartnerUpdate) -> Result<()> {
        let mut partners = self.partners.lock().unwrap();
        let partner = partners
            .get_mut(account_id)
            .filter(|partner| partner.cbs_id == cbs_id)
            .ok_or_else(|| anyhow!("Failed to find '{}' in DynamoDB table", cbs_id))?;
        partner.apply(update);
        self.updates
            .lock()
            .unwrap()
            .push((account_id.to_string(), update.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBucket {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    reads: Mutex<Vec<String>>,
}

impl InMemoryBucket {
    pub fn put(&self, key: &str, body: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert((BUCKET.to_string(), key.to_string()), body.as_bytes().to_vec());
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryBucket {
    async fn read(&self, bucket: &str, key: &str) -> std::result::Result<Vec<u8>, ObjectStoreError> {
        self.reads.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    bodies: Mutex<Vec<String>>,
}

impl RecordingQueue {
    pub fn messages(&self) -> Vec<Value> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .map(|body| serde_json::from_str(body).unwrap())
            .collect()
    }
}

#[async_trait]
impl MessageQueue for RecordingQueue {
    async fn send(&self, body: String) -> Result<()> {
        self.bodies.lock().unwrap().push(body);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPipeline {
    tokens: Mutex<Vec<String>>,
}

impl RecordingPipeline {
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineTrigger for RecordingPipeline {
    async fn trigger(&self, client_request_token: &str) -> Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .push(client_request_token.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSuppressions {
    records: Mutex<Vec<AlarmSuppression>>,
}

impl RecordingSuppressions {
    pub fn records(&self) -> Vec<AlarmSuppression> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuppressionStore for RecordingSuppressions {
    async fn put(&self, suppression: &AlarmSuppression) -> Result<()> {
        self.records.lock().unwrap().push(suppression.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryUnknownWorkloads {
    entries: Mutex<HashMap<String, UnknownWorkloadEntry>>,
}

impl InMemoryUnknownWorkloads {
    pub fn insert(&self, sanitized_key: &str, entry: UnknownWorkloadEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert(sanitized_key.to_string(), entry);
    }

    pub fn entry(&self, sanitized_key: &str) -> Option<UnknownWorkloadEntry> {
        self.entries.lock().unwrap().get(sanitized_key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[async_trait]
impl UnknownWorkloadRegistry for InMemoryUnknownWorkloads {
    async fn get(&self, sanitized_key: &str) -> Result<Option<UnknownWorkloadEntry>> {
        Ok(self.entry(sanitized_key))
    }

    async fn upsert(&self, sanitized_key: &str, entry: &UnknownWorkloadEntry) -> Result<()> {
        self.insert(sanitized_key, entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, subject: &str, body: &str) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Table classifier that counts how often it is consulted
#[derive(Default)]
pub struct SpyClassifier {
    calls: AtomicUsize,
}

impl SpyClassifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WorkloadClassifier for SpyClassifier {
    fn classify(&self, object_key: &str, accelerator: Option<Accelerator>) -> Option<Workload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TableClassifier.classify(object_key, accelerator)
    }
}

/// Transport wired to fakes
pub struct TransportFixture {
    pub registry: Arc<InMemoryRegistry>,
    pub bucket: Arc<InMemoryBucket>,
    pub queue: Arc<RecordingQueue>,
    pub dead_letters: Arc<RecordingQueue>,
    pub pipeline: Arc<RecordingPipeline>,
    pub suppressions: Arc<RecordingSuppressions>,
}

impl TransportFixture {
    pub fn new(partners: impl IntoIterator<Item = Partner>) -> Self {
        Self {
            registry: Arc::new(InMemoryRegistry::with(partners)),
            bucket: Arc::new(InMemoryBucket::default()),
            queue: Arc::new(RecordingQueue::default()),
            dead_letters: Arc::new(RecordingQueue::default()),
            pipeline: Arc::new(RecordingPipeline::default()),
            suppressions: Arc::new(RecordingSuppressions::default()),
        }
    }

    fn ports(&self) -> TransportPorts {
        TransportPorts {
            registry: self.registry.clone(),
            reader: self.bucket.clone(),
            queue: self.queue.clone(),
            dead_letters: self.dead_letters.clone(),
            pipeline: self.pipeline.clone(),
            suppressions: self.suppressions.clone(),
        }
    }

    fn settings() -> TransportSettings {
        TransportSettings {
            release: RELEASE.to_string(),
            reader_role_arn: READER_ROLE_ARN.to_string(),
        }
    }

    pub fn transport(&self) -> Transport {
        Transport::new(Self::settings(), self.ports())
    }

    pub fn transport_with(&self, classifier: Arc<dyn WorkloadClassifier>) -> Transport {
        Transport::with_classifier(Self::settings(), self.ports(), classifier)
    }
}

//! Dead-letter triage.
//!
//! Groups unclassified objects by their sanitized shape, counts how often each
//! shape shows up and notifies once when a shape is seen for the first time.

use crate::classify::{TableClassifier, Workload, WorkloadClassifier};
use crate::message::DeadLetter;
use crate::partner::Accelerator;
use crate::ports::{Notifier, UnknownWorkloadRegistry};
use crate::sanitize::sanitize;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const NEW_UNKNOWN_WORKLOAD_SUBJECT: &str = "New Unknown Workload Detected";

/// Incremented once per dead letter that still does not classify
pub const UNKNOWN_WORKLOAD_COUNTER: &str = "cbs.triage.unknown_workload";

/// Stored state for one sanitized key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownWorkloadEntry {
    pub first_received: DateTime<Utc>,
    pub hit_count: u64,
}

impl UnknownWorkloadEntry {
    /// Fold another sighting into the entry
    pub fn hit(&self, now: DateTime<Utc>) -> Self {
        Self {
            first_received: self.first_received.min(now),
            hit_count: self.hit_count + 1,
        }
    }
}

/// Parse a stored `first_received` value
///
/// RFC 3339 is what gets written. Older rows hold
/// `YYYY-MM-DD HH:MM:SS[.ffffff][+00:00]`; a missing offset means UTC.
pub fn parse_first_received(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .with_context(|| format!("Unrecognised first_received timestamp '{}'", value))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageOutcome {
    /// Body was not a dead letter; dropped
    Malformed,
    /// Nothing left after sanitizing
    Skipped,
    /// The key classifies now (tables changed since it was dead-lettered)
    Known(Workload),
    New { sanitized_key: String },
    Repeat { sanitized_key: String, hit_count: u64 },
}

#[derive(Serialize)]
struct Notification<'a> {
    timestamp: String,
    cbs_id: &'a str,
    accelerator: Option<&'a str>,
    object_key: &'a str,
}

pub struct Triage {
    registry: Arc<dyn UnknownWorkloadRegistry>,
    notifier: Arc<dyn Notifier>,
    classifier: Arc<dyn WorkloadClassifier>,
}

impl Triage {
    pub fn new(registry: Arc<dyn UnknownWorkloadRegistry>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_classifier(registry, notifier, Arc::new(TableClassifier))
    }

    pub fn with_classifier(
        registry: Arc<dyn UnknownWorkloadRegistry>,
        notifier: Arc<dyn Notifier>,
        classifier: Arc<dyn WorkloadClassifier>,
    ) -> Self {
        Self {
            registry,
            notifier,
            classifier,
        }
    }

    /// Triage one dead-letter body received at `now`
    pub async fn triage(&self, body: &str, now: DateTime<Utc>) -> Result<TriageOutcome> {
        let letter = match DeadLetter::from_body(body) {
            Ok(letter) => letter,
            Err(err) => {
                error!("Malformed SQS message: {}", err);
                return Ok(TriageOutcome::Malformed);
            }
        };

        let sanitized_key = sanitize(&letter.object_key);
        if sanitized_key.is_empty() {
            info!(object_key = %letter.object_key, "Nothing left to track after sanitizing");
            return Ok(TriageOutcome::Skipped);
        }

        let accelerator = self.declared_accelerator(&letter);
        if let Some(workload) = self.classifier.classify(&letter.object_key, accelerator) {
            warn!("Known workload found '{}'", workload);
            return Ok(TriageOutcome::Known(workload));
        }

        counter!(UNKNOWN_WORKLOAD_COUNTER, 1);

        let existing = self.registry.get(&sanitized_key).await?;
        let (entry, outcome) = match existing {
            Some(existing) => {
                let entry = existing.hit(now);
                let outcome = TriageOutcome::Repeat {
                    sanitized_key: sanitized_key.clone(),
                    hit_count: entry.hit_count,
                };
                (entry, outcome)
            }
            None => {
                self.notify(&letter, now).await?;
                let entry = UnknownWorkloadEntry {
                    first_received: now,
                    hit_count: 1,
                };
                let outcome = TriageOutcome::New {
                    sanitized_key: sanitized_key.clone(),
                };
                (entry, outcome)
            }
        };

        self.registry.upsert(&sanitized_key, &entry).await?;
        info!(
            sanitized_key = %sanitized_key,
            hit_count = entry.hit_count,
            "Recorded unknown workload"
        );
        Ok(outcome)
    }

    /// Table to re-classify with; an unrecognised name uses the default table
    fn declared_accelerator(&self, letter: &DeadLetter) -> Option<Accelerator> {
        let declared = letter.accelerator.as_deref()?;
        match declared.parse() {
            Ok(accelerator) => Some(accelerator),
            Err(_) => {
                warn!(
                    cbs_id = %letter.cbs_id,
                    accelerator = declared,
                    "Unrecognised accelerator in dead letter, using the default table"
                );
                None
            }
        }
    }

    async fn notify(&self, letter: &DeadLetter, now: DateTime<Utc>) -> Result<()> {
        let notification = Notification {
            timestamp: now.to_rfc3339(),
            cbs_id: &letter.cbs_id,
            accelerator: letter.accelerator.as_deref(),
            object_key: &letter.object_key,
        };
        let body = serde_json::to_string(&notification)?;
        self.notifier
            .publish(NEW_UNKNOWN_WORKLOAD_SUBJECT, &body)
            .await
            .context("Failed to publish unknown workload notification")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_first_received_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 15).unwrap();

        assert_eq!(parse_first_received("2024-03-01T12:30:15+00:00").unwrap(), expected);
        assert_eq!(parse_first_received("2024-03-01 12:30:15+00:00").unwrap(), expected);
        assert_eq!(parse_first_received("2024-03-01 12:30:15").unwrap(), expected);
        assert_eq!(
            parse_first_received("1970-01-01 22:46:42.222").unwrap(),
            Utc.timestamp_millis_opt(82_002_222).unwrap()
        );
        assert!(parse_first_received("yesterday").is_err());
    }

    #[test]
    fn test_hit_keeps_earliest() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let entry = UnknownWorkloadEntry {
            first_received: late,
            hit_count: 4,
        };
        let next = entry.hit(early);
        assert_eq!(next.first_received, early);
        assert_eq!(next.hit_count, 5);

        assert_eq!(next.hit(late).first_received, early);
    }
}

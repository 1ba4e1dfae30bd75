//! DLQ triage Lambda: one SQS batch of dead letters per invocation.

use anyhow::Result;
use aws_lambda_events::event::sqs::{SqsEvent, SqsMessage};
use cbs_aws::session;
use cbs_aws::{SnsNotifier, UnknownWorkloadTable};
use cbs_config::RuntimeConfig;
use cbs_core::{Triage, TriageOutcome};
use chrono::{DateTime, Utc};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

pub async fn build_triage(config: &RuntimeConfig) -> Result<Triage> {
    let settings = config.triage()?;
    let base = session::load(&config.aws.region).await;

    Ok(Triage::new(
        Arc::new(UnknownWorkloadTable::from_config(
            &base,
            &settings.unknown_workloads_table,
        )),
        Arc::new(SnsNotifier::from_config(
            &base,
            &settings.unknown_workloads_topic_arn,
        )),
    ))
}

/// Triage every record in order; a collaborator failure stops the batch
pub async fn triage_batch(
    triage: &Triage,
    records: &[SqsMessage],
    now: DateTime<Utc>,
) -> Result<Vec<TriageOutcome>> {
    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        let Some(body) = record.body.as_deref() else {
            error!(message_id = ?record.message_id, "SQS record has no body");
            outcomes.push(TriageOutcome::Malformed);
            continue;
        };
        outcomes.push(triage.triage(body, now).await?);
    }
    Ok(outcomes)
}

async fn handle(event: LambdaEvent<SqsEvent>, triage: &Triage) -> Result<(), Error> {
    let (batch, _context) = event.into_parts();
    let outcomes = triage_batch(triage, &batch.records, Utc::now()).await?;
    info!(records = outcomes.len(), "Triaged dead letters");
    Ok(())
}

pub async fn run() -> Result<(), Error> {
    let config = crate::load_config()?;
    crate::init_tracing(&config.logging());
    crate::log_build_info("dlq-triage");

    let triage = Arc::new(build_triage(&config).await?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let triage = triage.clone();
        let span = info_span!("dlq_triage", version = env!("CARGO_PKG_VERSION"));
        async move { handle(event, &triage).await }.instrument(span)
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cbs_core::ports::{Notifier, UnknownWorkloadRegistry};
    use cbs_core::UnknownWorkloadEntry;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryTable {
        entries: Mutex<HashMap<String, UnknownWorkloadEntry>>,
    }

    #[async_trait]
    impl UnknownWorkloadRegistry for MemoryTable {
        async fn get(&self, sanitized_key: &str) -> Result<Option<UnknownWorkloadEntry>> {
            Ok(self.entries.lock().unwrap().get(sanitized_key).cloned())
        }

        async fn upsert(&self, sanitized_key: &str, entry: &UnknownWorkloadEntry) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .insert(sanitized_key.to_string(), entry.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        count: Mutex<usize>,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn publish(&self, _subject: &str, _body: &str) -> Result<()> {
            *self.count.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn record(body: Option<&str>) -> SqsMessage {
        let mut message = SqsMessage::default();
        message.message_id = Some("059f36b4-87a3-44ab-83d2-661975830a7d".to_string());
        message.body = body.map(str::to_string);
        message
    }

    #[tokio::test]
    async fn test_batch_is_processed_in_order() {
        let table = Arc::new(MemoryTable::default());
        let notifier = Arc::new(CountingNotifier::default());
        let triage = Triage::new(table.clone(), notifier.clone());
        let letter = r#"{"cbs_id": "ABC", "accelerator": "lza", "object_key": "useless/1234/notuseful.txt"}"#;
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let outcomes = triage_batch(
            &triage,
            &[record(Some(letter)), record(None), record(Some(letter))],
            now,
        )
        .await
        .unwrap();

        assert_eq!(
            outcomes,
            vec![
                TriageOutcome::New {
                    sanitized_key: "useless/1234".to_string()
                },
                TriageOutcome::Malformed,
                TriageOutcome::Repeat {
                    sanitized_key: "useless/1234".to_string(),
                    hit_count: 2
                },
            ]
        );
        assert_eq!(*notifier.count.lock().unwrap(), 1);
        assert_eq!(table.entries.lock().unwrap()["useless/1234"].first_received, now);
    }
}

// Unknown workload counter
//
// Kept in its own test binary: the debugging recorder is installed globally.

mod harness;

use cbs_core::triage::UNKNOWN_WORKLOAD_COUNTER;
use cbs_core::Triage;
use harness::*;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use std::sync::Arc;

fn unknown_workload_count(snapshotter: &Snapshotter) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(key, _, _, _)| key.key().name() == UNKNOWN_WORKLOAD_COUNTER)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_counts_only_unclassified_dead_letters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().unwrap();

    let triage = Triage::new(
        Arc::new(InMemoryUnknownWorkloads::default()),
        Arc::new(RecordingNotifier::default()),
    );
    let letter = |object_key: &str| {
        json!({"cbs_id": CBS_ID, "accelerator": "lza", "object_key": object_key}).to_string()
    };

    // Still classifies, malformed, nothing left after sanitizing
    for body in [
        letter("cloudwatchlogs/ssm"),
        r#"{"cbs_id": "ABC"}"#.to_string(),
        letter("123456789012/file.json"),
    ] {
        triage.triage(&body, at(1)).await.unwrap();
    }
    assert_eq!(unknown_workload_count(&snapshotter), 0);

    // New, then repeat
    for day in [1, 2] {
        triage
            .triage(&letter("AWSLogs/123456789012/mystery/x.gz"), at(day))
            .await
            .unwrap();
    }
    assert_eq!(unknown_workload_count(&snapshotter), 2);
}

//! Transport Lambda: one EventBridge event per invocation.

use anyhow::Result;
use cbs_aws::session;
use cbs_aws::{
    AlarmSuppressionTable, CodePipelineTrigger, PartnerInventoryTable, S3ObjectStore, SqsQueue,
};
use cbs_config::RuntimeConfig;
use cbs_core::{InvocationContext, Transport, TransportError, TransportPorts, TransportSettings};
use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};

/// Wire the transport to AWS
///
/// The inventory table and alarm pipeline live in the DevOps account, partner
/// buckets are read through the reader role, and the queues and suppression
/// table use the function's own credentials.
pub async fn build_transport(config: &RuntimeConfig) -> Result<Transport> {
    let settings = config.transport()?;
    let function_name = config.aws.function_name.as_deref();

    let base = session::load(&config.aws.region).await;
    let devops = session::assume_role(
        &base,
        &settings.devops_role_arn,
        &session::session_name(function_name, "DevOps"),
    )
    .await;
    let reader = session::assume_role(
        &base,
        &settings.reader_role_arn,
        &session::session_name(function_name, "ReadAcceleratorMetadata"),
    )
    .await;

    let ports = TransportPorts {
        registry: Arc::new(PartnerInventoryTable::from_config(
            &devops,
            &settings.inventory_table,
        )),
        reader: Arc::new(S3ObjectStore::from_config(&reader)),
        queue: Arc::new(SqsQueue::from_config(&base, &settings.queue_url)),
        dead_letters: Arc::new(SqsQueue::from_config(
            &base,
            &settings.dead_letter_queue_url,
        )),
        pipeline: Arc::new(CodePipelineTrigger::from_config(
            &devops,
            &settings.pipeline_name,
        )),
        suppressions: Arc::new(AlarmSuppressionTable::from_config(
            &base,
            &settings.alarm_suppression_table,
        )),
    };

    Ok(Transport::new(
        TransportSettings {
            release: settings.release.clone(),
            reader_role_arn: settings.reader_role_arn.clone(),
        },
        ports,
    ))
}

/// Decide the invocation result from the transport outcome
///
/// Errors tied to an object are logged and swallowed so the event is not
/// retried; anything else fails the invocation.
pub fn settle(result: Result<(), TransportError>) -> Result<()> {
    let Err(err) = result else {
        return Ok(());
    };

    match (err.object_key(), err.workload()) {
        (Some(object_key), Some(workload)) => {
            warn!(
                "'{}' with workload type '{}' failed to process: '{}'",
                object_key, workload, err
            );
            Ok(())
        }
        (Some(object_key), None) => {
            warn!("'{}' is unsupported: '{}'", object_key, err);
            Ok(())
        }
        _ => Err(err.into()),
    }
}

async fn handle(event: LambdaEvent<Value>, transport: &Transport) -> Result<(), Error> {
    let (payload, context) = event.into_parts();
    let invocation = InvocationContext {
        request_id: context.request_id.clone(),
        memory_limit_mb: Some(context.env_config.memory),
        received_at: Utc::now(),
    };

    settle(transport.process(payload, &invocation).await)?;
    Ok(())
}

pub async fn run() -> Result<(), Error> {
    let config = crate::load_config()?;
    crate::init_tracing(&config.logging());
    crate::log_build_info("transport");

    let release = config.transport()?.release.clone();
    let transport = Arc::new(build_transport(&config).await?);

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let transport = transport.clone();
        let span = info_span!("transport", version = %release);
        async move { handle(event, &transport).await }.instrument(span)
    }))
    .await
}

use object_reporter_core::contract::{parse_s3_event, plan_ingest, IngestSummary};
use serde_json::Value;
use tracing::{error, info};

use crate::adapters::metadata_table::MetadataTable;
use crate::adapters::retry::RetryPolicy;
use crate::error::{FailedWrite, IngestError};

const COMPONENT: &str = "ingest_handler";

/// Records key and size of every created object in the notification.
///
/// Each record is written independently. When any write still fails after
/// retries the whole invocation fails, so the platform redelivers the event;
/// records that were written are simply overwritten on redelivery.
pub fn handle_object_created_event(
    event: Value,
    table: &impl MetadataTable,
    retry: &RetryPolicy,
) -> Result<IngestSummary, IngestError> {
    let event = parse_s3_event(event).inspect_err(|error| {
        error!(component = COMPONENT, error = %error, "event_rejected");
    })?;
    let plan = plan_ingest(&event).inspect_err(|error| {
        error!(component = COMPONENT, error = %error, "event_rejected");
    })?;

    info!(
        component = COMPONENT,
        notifications = event.records.len(),
        records = plan.records.len(),
        skipped = plan.skipped.len(),
        buckets = ?plan.source_buckets,
        "event_received"
    );
    for skipped in &plan.skipped {
        info!(
            component = COMPONENT,
            record_index = skipped.record_index,
            event_name = %skipped.event_name,
            "notification_skipped"
        );
    }

    let mut written = Vec::with_capacity(plan.records.len());
    let mut failed = Vec::new();
    for record in &plan.records {
        match retry.run("put_item", || table.put_record(record)) {
            Ok(()) => {
                info!(
                    component = COMPONENT,
                    object_key = %record.object_key,
                    object_size = record.object_size,
                    "record_written"
                );
                written.push(record.object_key.clone());
            }
            Err(store_error) => {
                error!(
                    component = COMPONENT,
                    object_key = %record.object_key,
                    error = %store_error,
                    "record_write_failed"
                );
                failed.push(FailedWrite {
                    object_key: record.object_key.clone(),
                    error: store_error,
                });
            }
        }
    }

    if !failed.is_empty() {
        return Err(IngestError::StoreWrite {
            attempted: plan.records.len(),
            failed,
        });
    }

    Ok(IngestSummary {
        status: "ok".to_string(),
        records_written: written.len(),
        records_skipped: plan.skipped.len(),
        object_keys: written,
    })
}

use aws_config::BehaviorVersion;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use object_reporter_core::contract::IngestSummary;
use object_reporter_lambda::adapters::dynamodb::DynamoMetadataTable;
use object_reporter_lambda::adapters::retry::RetryPolicy;
use object_reporter_lambda::config::IngestConfig;
use object_reporter_lambda::handlers::ingest::handle_object_created_event;
use object_reporter_lambda::handlers::run_blocking;
use object_reporter_lambda::telemetry::init_tracing;
use serde_json::Value;
use tracing::info;

async fn handle_request(
    event: LambdaEvent<Value>,
    table: &DynamoMetadataTable,
    retry: &RetryPolicy,
) -> Result<IngestSummary, Error> {
    run_blocking(|| handle_object_created_event(event.payload, table, retry)).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = IngestConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let table = DynamoMetadataTable::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.metadata_table_name.clone(),
    );
    let retry = config.retry_policy();
    info!(
        component = "ingest_lambda",
        table = table.table_name(),
        max_attempts = retry.max_attempts(),
        "handler_ready"
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        handle_request(event, &table, &retry)
    }))
    .await
}

use aws_config::BehaviorVersion;
use aws_lambda_events::event::alb::AlbTargetGroupResponse;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use object_reporter_lambda::adapters::dynamodb::DynamoMetadataTable;
use object_reporter_lambda::config::ReportConfig;
use object_reporter_lambda::handlers::report::handle_report_request;
use object_reporter_lambda::handlers::run_blocking;
use object_reporter_lambda::telemetry::init_tracing;
use serde_json::Value;
use tracing::info;

async fn handle_request(
    event: LambdaEvent<Value>,
    config: &ReportConfig,
    table: &DynamoMetadataTable,
) -> Result<AlbTargetGroupResponse, Error> {
    Ok(run_blocking(|| handle_report_request(event.payload, config, table)))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = ReportConfig::from_env()
        .map_err(|error| Error::from(format!("invalid configuration: {error}")))?;
    let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let table = DynamoMetadataTable::new(
        aws_sdk_dynamodb::Client::new(&aws_config),
        config.metadata_table_name.clone(),
    );
    info!(
        component = "report_lambda",
        table = table.table_name(),
        bucket = %config.object_bucket_name,
        "handler_ready"
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<Value>| {
        handle_request(event, &config, &table)
    }))
    .await
}

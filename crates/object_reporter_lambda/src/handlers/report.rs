use aws_lambda_events::event::alb::AlbTargetGroupResponse;
use object_reporter_core::contract::{
    html_response, parse_alb_request, plain_text_response, request_host, ObjectRecord,
};
use object_reporter_core::report::render_report_page;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::adapters::metadata_table::{MetadataTable, RecordScan};
use crate::config::ReportConfig;
use crate::error::ReportError;

const COMPONENT: &str = "report_handler";
pub const REPORT_FAILURE_BODY: &str = "Unable to load the object listing.";

/// Answers one load balancer request with the HTML listing of the table.
///
/// The request itself is only logged. A failed scan becomes a 500 with a
/// fixed body; the cause stays in the logs.
pub fn handle_report_request(
    request: Value,
    config: &ReportConfig,
    table: &impl MetadataTable,
) -> AlbTargetGroupResponse {
    match parse_alb_request(request) {
        Ok(request) => info!(
            component = COMPONENT,
            method = %request.http_method,
            path = request.path.as_deref().unwrap_or("-"),
            host = request_host(&request).unwrap_or("-"),
            "report_requested"
        ),
        Err(parse_error) => warn!(
            component = COMPONENT,
            error = %parse_error,
            "report_requested_with_unrecognised_shape"
        ),
    }

    match render_report(config, table) {
        Ok(page) => html_response(200, page),
        Err(report_error) => {
            error!(
                component = COMPONENT,
                kind = report_error.kind(),
                error = %report_error,
                "report_failed"
            );
            plain_text_response(500, REPORT_FAILURE_BODY)
        }
    }
}

pub fn render_report(
    config: &ReportConfig,
    table: &impl MetadataTable,
) -> Result<String, ReportError> {
    let records = load_all_records(config, table)?;
    info!(
        component = COMPONENT,
        records = records.len(),
        "report_rendered"
    );
    Ok(render_report_page(&config.object_bucket_name, &records))
}

pub fn load_all_records(
    config: &ReportConfig,
    table: &impl MetadataTable,
) -> Result<Vec<ObjectRecord>, ReportError> {
    RecordScan::new(table, config.retry_policy())
        .with_page_limit(config.scan_page_size)
        .collect::<Result<Vec<_>, _>>()
        .map_err(ReportError::StoreRead)
}

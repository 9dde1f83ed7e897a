use aws_lambda_events::event::alb::AlbTargetGroupResponse;
use object_reporter_core::contract::response_text;
use object_reporter_lambda::config::ReportConfig;
use serde_json::{json, Value};

pub const BUCKET: &str = "uploads-bucket";
pub const LOAD_BALANCER_DNS: &str = "object-reporter-123.eu-west-1.elb.amazonaws.com";

pub fn notification(event_name: &str, object: Value) -> Value {
    json!({
        "eventVersion": "2.1",
        "eventSource": "aws:s3",
        "awsRegion": "eu-west-1",
        "eventTime": "2024-05-01T12:00:00.000Z",
        "eventName": event_name,
        "userIdentity": { "principalId": "AWS:EXAMPLE" },
        "requestParameters": { "sourceIPAddress": "203.0.113.5" },
        "responseElements": {},
        "s3": {
            "s3SchemaVersion": "1.0",
            "configurationId": "object-created",
            "bucket": {
                "name": BUCKET,
                "ownerIdentity": { "principalId": "EXAMPLE" },
                "arn": format!("arn:aws:s3:::{BUCKET}")
            },
            "object": object
        }
    })
}

pub fn created(key: &str, size: u64) -> Value {
    notification("ObjectCreated:Put", json!({ "key": key, "size": size }))
}

pub fn removed(key: &str) -> Value {
    notification("ObjectRemoved:Delete", json!({ "key": key }))
}

pub fn s3_event(records: Vec<Value>) -> Value {
    json!({ "Records": records })
}

pub fn alb_request(host: Option<&str>) -> Value {
    let mut request = json!({
        "requestContext": {
            "elb": { "targetGroupArn": "arn:aws:elasticloadbalancing:eu-west-1:123:targetgroup/report/abc" }
        },
        "httpMethod": "GET",
        "path": "/",
        "headers": {},
        "body": "",
        "isBase64Encoded": false
    });
    if let Some(host) = host {
        request["headers"]["host"] = json!(host);
    }
    request
}

pub fn report_config(scan_page_size: Option<u32>) -> ReportConfig {
    ReportConfig {
        metadata_table_name: "object-metadata".to_string(),
        object_bucket_name: BUCKET.to_string(),
        scan_page_size,
        store_max_attempts: 1,
        store_retry_base_delay_ms: 0,
    }
}

pub fn listing_lines(response: &AlbTargetGroupResponse) -> Vec<String> {
    response_text(response)
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("<li>"))
        .map(|line| {
            line.trim_start_matches("<li>")
                .trim_end_matches("</li>")
                .to_string()
        })
        .collect()
}

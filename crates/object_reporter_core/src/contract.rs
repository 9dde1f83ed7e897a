use std::collections::BTreeSet;

use aws_lambda_events::encodings::Body;
use aws_lambda_events::event::alb::{AlbTargetGroupRequest, AlbTargetGroupResponse};
use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use http::header::{HeaderValue, CONTENT_TYPE, HOST};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object_key::decode_object_key;

pub const OBJECT_KEY_ATTRIBUTE: &str = "object_key";
pub const OBJECT_SIZE_ATTRIBUTE: &str = "object_size";
pub const OBJECT_CREATED_EVENT_PREFIX: &str = "ObjectCreated:";
pub const TEXT_HTML: &str = "text/html";
pub const TEXT_PLAIN: &str = "text/plain";

/// One row of the metadata table. The size is persisted as a decimal string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ObjectRecord {
    pub object_key: String,
    pub object_size: u64,
}

impl ObjectRecord {
    pub fn new(object_key: impl Into<String>, object_size: u64) -> Self {
        Self {
            object_key: object_key.into(),
            object_size,
        }
    }

    pub fn size_attribute(&self) -> String {
        self.object_size.to_string()
    }

    pub fn from_attributes(object_key: &str, object_size: &str) -> Result<Self, ValidationError> {
        if object_key.is_empty() {
            return Err(ValidationError::new("object_key cannot be empty"));
        }
        let object_size = object_size.trim().parse::<u64>().map_err(|error| {
            ValidationError::new(format!(
                "object_size '{object_size}' for '{object_key}' is not a byte count: {error}"
            ))
        })?;
        Ok(Self::new(object_key, object_size))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNotification {
    pub record_index: usize,
    pub event_name: String,
}

/// Object records to write for one notification event, in payload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestPlan {
    pub records: Vec<ObjectRecord>,
    pub skipped: Vec<SkippedNotification>,
    /// Buckets named by the planned records.
    pub source_buckets: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub status: String,
    pub records_written: usize,
    pub records_skipped: usize,
    pub object_keys: Vec<String>,
}

/// Builds the load balancer response for a Lambda target. The body is
/// always text.
pub fn alb_response(
    status_code: u16,
    content_type: &str,
    body: impl Into<String>,
) -> AlbTargetGroupResponse {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(CONTENT_TYPE, value);
    }

    AlbTargetGroupResponse {
        status_code: i64::from(status_code),
        status_description: Some(status_description(status_code)),
        headers,
        multi_value_headers: HeaderMap::new(),
        body: Some(Body::Text(body.into())),
        is_base64_encoded: false,
    }
}

pub fn html_response(status_code: u16, body: impl Into<String>) -> AlbTargetGroupResponse {
    alb_response(status_code, TEXT_HTML, body)
}

pub fn plain_text_response(status_code: u16, body: impl Into<String>) -> AlbTargetGroupResponse {
    alb_response(status_code, TEXT_PLAIN, body)
}

pub fn response_content_type(response: &AlbTargetGroupResponse) -> Option<&str> {
    response
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

pub fn response_text(response: &AlbTargetGroupResponse) -> Option<&str> {
    match &response.body {
        Some(Body::Text(text)) => Some(text.as_str()),
        _ => None,
    }
}

/// `Host` header of a load balancer request, from whichever header map the
/// target group delivers.
pub fn request_host(request: &AlbTargetGroupRequest) -> Option<&str> {
    request
        .headers
        .get(HOST)
        .or_else(|| request.multi_value_headers.get(HOST))
        .and_then(|value| value.to_str().ok())
}

fn status_description(status_code: u16) -> String {
    let reason = match status_code {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => return status_code.to_string(),
    };
    format!("{status_code} {reason}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn parse_s3_event(payload: Value) -> Result<S3Event, ValidationError> {
    let event = serde_json::from_value::<S3Event>(payload)
        .map_err(|error| ValidationError::new(format!("Malformed S3 event: {error}")))?;
    if event.records.is_empty() {
        return Err(ValidationError::new("S3 event contains no records"));
    }
    Ok(event)
}

/// Validates every notification up front so a bad record fails the whole
/// event before anything is written.
pub fn plan_ingest(event: &S3Event) -> Result<IngestPlan, ValidationError> {
    let mut plan = IngestPlan::default();

    for (record_index, record) in event.records.iter().enumerate() {
        if !is_object_created(record) {
            plan.skipped.push(SkippedNotification {
                record_index,
                event_name: record.event_name.clone().unwrap_or_default(),
            });
            continue;
        }

        let Some(raw_key) = record.s3.object.key.as_deref() else {
            return Err(ValidationError::new(format!(
                "Record {record_index}: object-created notification has no key"
            )));
        };
        let object_key = decode_object_key(raw_key).map_err(|error| {
            ValidationError::new(format!("Record {record_index}: {}", error.message()))
        })?;
        if object_key.is_empty() {
            return Err(ValidationError::new(format!(
                "Record {record_index}: object key cannot be empty"
            )));
        }

        let Some(object_size) = record.s3.object.size else {
            return Err(ValidationError::new(format!(
                "Record {record_index}: object-created notification for '{object_key}' has no size"
            )));
        };
        let object_size = u64::try_from(object_size).map_err(|_| {
            ValidationError::new(format!(
                "Record {record_index}: object '{object_key}' has negative size {object_size}"
            ))
        })?;

        if let Some(bucket) = record.s3.bucket.name.as_deref() {
            plan.source_buckets.insert(bucket.to_string());
        }
        plan.records.push(ObjectRecord::new(object_key, object_size));
    }

    Ok(plan)
}

/// Records without an `eventName` are assumed to be creations.
fn is_object_created(record: &S3EventRecord) -> bool {
    record
        .event_name
        .as_deref()
        .map(|name| name.starts_with(OBJECT_CREATED_EVENT_PREFIX))
        .unwrap_or(true)
}

pub fn parse_alb_request(payload: Value) -> Result<AlbTargetGroupRequest, ValidationError> {
    serde_json::from_value(payload)
        .map_err(|error| ValidationError::new(format!("Malformed load balancer request: {error}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notification(event_name: Option<&str>, key: &str, size: Option<i64>) -> Value {
        let mut object = json!({ "key": key, "eTag": "0123456789abcdef", "sequencer": "0A1B2C3D4E5F678901" });
        if let Some(size) = size {
            object["size"] = json!(size);
        }
        let mut record = json!({
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "awsRegion": "eu-west-1",
            "eventTime": "2024-05-01T12:00:00.000Z",
            "userIdentity": { "principalId": "AWS:EXAMPLE" },
            "requestParameters": { "sourceIPAddress": "203.0.113.5" },
            "responseElements": {
                "x-amz-request-id": "C3D13FE58DE4C810",
                "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
            },
            "s3": {
                "s3SchemaVersion": "1.0",
                "configurationId": "object-created",
                "bucket": {
                    "name": "uploads",
                    "ownerIdentity": { "principalId": "EXAMPLE" },
                    "arn": "arn:aws:s3:::uploads"
                },
                "object": object,
            }
        });
        if let Some(event_name) = event_name {
            record["eventName"] = json!(event_name);
        }
        record
    }

    #[test]
    fn rejects_event_without_records() {
        let error = parse_s3_event(json!({"detail": {}})).expect_err("event should fail");
        assert!(error.message().starts_with("Malformed S3 event"));

        let error = parse_s3_event(json!({"Records": []})).expect_err("event should fail");
        assert_eq!(error.message(), "S3 event contains no records");
    }

    #[test]
    fn plans_every_created_record() {
        let event = parse_s3_event(json!({
            "Records": [
                notification(Some("ObjectCreated:Put"), "a.txt", Some(42)),
                notification(Some("ObjectCreated:CompleteMultipartUpload"), "reports/b+c.csv", Some(7)),
            ]
        }))
        .expect("event should parse");

        let plan = plan_ingest(&event).expect("plan should pass");
        assert_eq!(
            plan.records,
            vec![
                ObjectRecord::new("a.txt", 42),
                ObjectRecord::new("reports/b c.csv", 7),
            ]
        );
        assert!(plan.skipped.is_empty());
        assert_eq!(plan.source_buckets, BTreeSet::from(["uploads".to_string()]));
    }

    #[test]
    fn skips_removal_notifications() {
        let event = parse_s3_event(json!({
            "Records": [
                notification(Some("ObjectRemoved:Delete"), "gone.txt", None),
                notification(Some("ObjectCreated:Copy"), "kept.txt", Some(1)),
            ]
        }))
        .expect("event should parse");

        let plan = plan_ingest(&event).expect("plan should pass");
        assert_eq!(plan.records, vec![ObjectRecord::new("kept.txt", 1)]);
        assert_eq!(
            plan.skipped,
            vec![SkippedNotification {
                record_index: 0,
                event_name: "ObjectRemoved:Delete".to_string(),
            }]
        );
    }

    #[test]
    fn created_record_without_size_fails_the_event() {
        let event = parse_s3_event(json!({
            "Records": [
                notification(Some("ObjectCreated:Put"), "ok.txt", Some(3)),
                notification(Some("ObjectCreated:Put"), "no-size.txt", None),
            ]
        }))
        .expect("event should parse");

        let error = plan_ingest(&event).expect_err("plan should fail");
        assert_eq!(
            error.message(),
            "Record 1: object-created notification for 'no-size.txt' has no size"
        );
    }

    #[test]
    fn negative_size_fails_the_event() {
        let event = parse_s3_event(json!({
            "Records": [notification(Some("ObjectCreated:Put"), "odd.bin", Some(-1))]
        }))
        .expect("event should parse");

        let error = plan_ingest(&event).expect_err("plan should fail");
        assert_eq!(
            error.message(),
            "Record 0: object 'odd.bin' has negative size -1"
        );
    }

    #[test]
    fn record_without_event_name_counts_as_created() {
        let event = parse_s3_event(json!({
            "Records": [notification(None, "bare.bin", Some(5))]
        }))
        .expect("event should parse");

        let plan = plan_ingest(&event).expect("plan should pass");
        assert_eq!(plan.records, vec![ObjectRecord::new("bare.bin", 5)]);
    }

    #[test]
    fn object_record_parses_string_size() {
        let record = ObjectRecord::from_attributes("a.txt", "42").expect("record should parse");
        assert_eq!(record, ObjectRecord::new("a.txt", 42));
        assert_eq!(record.size_attribute(), "42");

        let error = ObjectRecord::from_attributes("a.txt", "forty").expect_err("size should fail");
        assert!(error.message().contains("is not a byte count"));
    }

    #[test]
    fn alb_request_host_is_found_case_insensitively() {
        let request = parse_alb_request(json!({
            "requestContext": { "elb": { "targetGroupArn": "arn:aws:elasticloadbalancing:tg" } },
            "httpMethod": "GET",
            "path": "/",
            "queryStringParameters": {},
            "headers": { "Host": "reporter-123.elb.amazonaws.com", "accept": "text/html" },
            "body": "",
            "isBase64Encoded": false
        }))
        .expect("request should parse");

        assert_eq!(request_host(&request), Some("reporter-123.elb.amazonaws.com"));
        assert_eq!(request.path.as_deref(), Some("/"));
    }

    #[test]
    fn alb_request_reads_multi_value_host() {
        let request = parse_alb_request(json!({
            "requestContext": { "elb": { "targetGroupArn": "arn:aws:elasticloadbalancing:tg" } },
            "httpMethod": "GET",
            "path": "/",
            "multiValueHeaders": { "host": ["reporter-123.elb.amazonaws.com"] },
            "isBase64Encoded": false
        }))
        .expect("request should parse");

        assert_eq!(request_host(&request), Some("reporter-123.elb.amazonaws.com"));
    }

    #[test]
    fn response_serializes_in_load_balancer_shape() {
        let response = html_response(200, "<p>hi</p>");
        assert_eq!(response_content_type(&response), Some("text/html"));
        assert_eq!(response_text(&response), Some("<p>hi</p>"));

        let value = serde_json::to_value(&response).expect("response should serialize");
        assert_eq!(value["statusCode"], json!(200));
        assert_eq!(value["statusDescription"], json!("200 OK"));
        assert_eq!(value["headers"]["content-type"], json!("text/html"));
        assert_eq!(value["body"], json!("<p>hi</p>"));
        assert_eq!(value["isBase64Encoded"], json!(false));
    }

    #[test]
    fn error_response_is_plain_text() {
        let response = plain_text_response(500, "Unable to load the object listing.");
        assert_eq!(response.status_code, 500);
        assert_eq!(
            response.status_description.as_deref(),
            Some("500 Internal Server Error")
        );
        assert_eq!(response_content_type(&response), Some("text/plain"));
    }
}

use std::collections::HashMap;
use std::future::Future;

use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::AttributeValue;
use object_reporter_core::contract::{ObjectRecord, OBJECT_KEY_ATTRIBUTE, OBJECT_SIZE_ATTRIBUTE};

use crate::adapters::metadata_table::{MetadataTable, ScanPage, ScanRequest};
use crate::error::StoreError;

const TRANSIENT_ERROR_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
];

/// DynamoDB-backed table. Calls bridge onto the async SDK with
/// `block_in_place`, so this must run on a multi-threaded tokio runtime.
pub struct DynamoMetadataTable {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
}

impl DynamoMetadataTable {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl MetadataTable for DynamoMetadataTable {
    fn put_record(&self, record: &ObjectRecord) -> Result<(), StoreError> {
        let request = self
            .client
            .put_item()
            .table_name(self.table_name.clone())
            .set_item(Some(record_to_item(record)));

        block_on_store(async move {
            request
                .send()
                .await
                .map(|_| ())
                .map_err(|error| classify_sdk_error("put_item", &error))
        })
    }

    fn scan_page(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        let mut scan = self
            .client
            .scan()
            .table_name(self.table_name.clone())
            .set_exclusive_start_key(request.exclusive_start_key.as_deref().map(start_key));
        if let Some(limit) = request.limit {
            scan = scan.limit(i32::try_from(limit).unwrap_or(i32::MAX));
        }

        let output = block_on_store(async move {
            scan.send()
                .await
                .map_err(|error| classify_sdk_error("scan", &error))
        })?;

        let records = output
            .items()
            .iter()
            .map(item_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        let last_evaluated_key = output
            .last_evaluated_key()
            .map(|key| string_attribute(key, OBJECT_KEY_ATTRIBUTE).map(str::to_string))
            .transpose()?;

        Ok(ScanPage {
            records,
            last_evaluated_key,
        })
    }
}

pub fn record_to_item(record: &ObjectRecord) -> HashMap<String, AttributeValue> {
    HashMap::from([
        (
            OBJECT_KEY_ATTRIBUTE.to_string(),
            AttributeValue::S(record.object_key.clone()),
        ),
        (
            OBJECT_SIZE_ATTRIBUTE.to_string(),
            AttributeValue::S(record.size_attribute()),
        ),
    ])
}

pub fn item_to_record(item: &HashMap<String, AttributeValue>) -> Result<ObjectRecord, StoreError> {
    let object_key = string_attribute(item, OBJECT_KEY_ATTRIBUTE)?;
    let object_size = string_attribute(item, OBJECT_SIZE_ATTRIBUTE)?;
    ObjectRecord::from_attributes(object_key, object_size)
        .map_err(|error| StoreError::MalformedItem(error.message().to_string()))
}

fn start_key(object_key: &str) -> HashMap<String, AttributeValue> {
    HashMap::from([(
        OBJECT_KEY_ATTRIBUTE.to_string(),
        AttributeValue::S(object_key.to_string()),
    )])
}

// Sizes are written as strings; numeric attributes are accepted on read.
fn string_attribute<'a>(
    item: &'a HashMap<String, AttributeValue>,
    name: &str,
) -> Result<&'a str, StoreError> {
    match item.get(name) {
        Some(AttributeValue::S(value)) | Some(AttributeValue::N(value)) => Ok(value.as_str()),
        Some(_) => Err(StoreError::MalformedItem(format!(
            "attribute '{name}' is not a string"
        ))),
        None => Err(StoreError::MalformedItem(format!(
            "item is missing attribute '{name}'"
        ))),
    }
}

fn classify_sdk_error<E, R>(operation: &'static str, error: &SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(error).to_string();
    let transient = match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(context) => context
            .err()
            .code()
            .map(|code| TRANSIENT_ERROR_CODES.contains(&code))
            .unwrap_or(false),
        _ => false,
    };

    if transient {
        StoreError::Transient { operation, message }
    } else {
        StoreError::Rejected { operation, message }
    }
}

fn block_on_store<T>(future: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

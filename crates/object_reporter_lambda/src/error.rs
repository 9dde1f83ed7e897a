use object_reporter_core::contract::ValidationError;
use thiserror::Error;

/// Failure talking to the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Throttling, timeouts and server-side faults; safe to retry.
    #[error("transient {operation} failure: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} rejected: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
    #[error("malformed table item: {0}")]
    MalformedItem(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedWrite {
    pub object_key: String,
    pub error: StoreError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("invalid object-created event: {0}")]
    Validation(#[from] ValidationError),
    #[error(
        "failed to record {} of {attempted} object(s): {}",
        .failed.len(),
        describe_failures(.failed)
    )]
    StoreWrite {
        attempted: usize,
        failed: Vec<FailedWrite>,
    },
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::StoreWrite { .. } => "store_write_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("failed to scan metadata table: {0}")]
    StoreRead(#[source] StoreError),
}

impl ReportError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StoreRead(_) => "store_read_error",
        }
    }
}

fn describe_failures(failed: &[FailedWrite]) -> String {
    failed
        .iter()
        .map(|failure| format!("'{}' ({})", failure.object_key, failure.error))
        .collect::<Vec<_>>()
        .join(", ")
}

use std::collections::VecDeque;

use object_reporter_core::contract::ObjectRecord;

use crate::adapters::retry::RetryPolicy;
use crate::error::StoreError;

/// Port onto the metadata table. Puts overwrite unconditionally, so writing
/// the same record twice is harmless.
pub trait MetadataTable {
    fn put_record(&self, record: &ObjectRecord) -> Result<(), StoreError>;

    fn scan_page(&self, request: &ScanRequest) -> Result<ScanPage, StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRequest {
    pub exclusive_start_key: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub records: Vec<ObjectRecord>,
    /// Present while more pages remain.
    pub last_evaluated_key: Option<String>,
}

/// Lazy sequence over every record in the table, fetched one page at a time.
///
/// The scan stops at the first page that still fails after retries. Its
/// `cursor` then names the failed page, so a new scan started with
/// `resume_from(cursor)` picks up where this one stopped.
pub struct RecordScan<'a, T: MetadataTable + ?Sized> {
    table: &'a T,
    retry: RetryPolicy,
    page_limit: Option<u32>,
    cursor: Option<String>,
    buffered: VecDeque<ObjectRecord>,
    exhausted: bool,
    pages_fetched: usize,
}

impl<'a, T: MetadataTable + ?Sized> RecordScan<'a, T> {
    pub fn new(table: &'a T, retry: RetryPolicy) -> Self {
        Self {
            table,
            retry,
            page_limit: None,
            cursor: None,
            buffered: VecDeque::new(),
            exhausted: false,
            pages_fetched: 0,
        }
    }

    /// A limit of zero is raised to one; an empty page would end the scan.
    pub fn with_page_limit(mut self, page_limit: Option<u32>) -> Self {
        self.page_limit = page_limit.map(|limit| limit.max(1));
        self
    }

    pub fn resume_from(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Start key of the next page to fetch.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn fetch_next_page(&mut self) -> Result<(), StoreError> {
        let table = self.table;
        let request = ScanRequest {
            exclusive_start_key: self.cursor.clone(),
            limit: self.page_limit,
        };
        let page = self.retry.run("scan", || table.scan_page(&request))?;

        self.pages_fetched += 1;
        self.exhausted = page.last_evaluated_key.is_none();
        self.cursor = page.last_evaluated_key;
        self.buffered.extend(page.records);
        Ok(())
    }
}

impl<T: MetadataTable + ?Sized> Iterator for RecordScan<'_, T> {
    type Item = Result<ObjectRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        // Empty pages with a continuation key are legal, hence the loop.
        loop {
            if let Some(record) = self.buffered.pop_front() {
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }
            if let Err(error) = self.fetch_next_page() {
                self.exhausted = true;
                return Some(Err(error));
            }
        }
    }
}

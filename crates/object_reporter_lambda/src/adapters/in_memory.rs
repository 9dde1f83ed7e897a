use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard, PoisonError};

use object_reporter_core::contract::ObjectRecord;

use crate::adapters::metadata_table::{MetadataTable, ScanPage, ScanRequest};
use crate::error::StoreError;

/// Table kept in process memory, for tests and local runs. `page_size` plays
/// the part of the store's own page cap.
#[derive(Debug, Default)]
pub struct InMemoryMetadataTable {
    records: Mutex<BTreeMap<String, u64>>,
    page_size: Option<usize>,
}

impl InMemoryMetadataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            records: Mutex::default(),
            page_size: Some(page_size.max(1)),
        }
    }

    pub fn seed(&self, records: impl IntoIterator<Item = ObjectRecord>) {
        let mut stored = self.lock();
        for record in records {
            stored.insert(record.object_key, record.object_size);
        }
    }

    pub fn records(&self) -> Vec<ObjectRecord> {
        self.lock()
            .iter()
            .map(|(key, size)| ObjectRecord::new(key.clone(), *size))
            .collect()
    }

    pub fn size_of(&self, object_key: &str) -> Option<u64> {
        self.lock().get(object_key).copied()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, u64>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataTable for InMemoryMetadataTable {
    fn put_record(&self, record: &ObjectRecord) -> Result<(), StoreError> {
        self.lock()
            .insert(record.object_key.clone(), record.object_size);
        Ok(())
    }

    fn scan_page(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        let stored = self.lock();
        let limit = match (request.limit, self.page_size) {
            (Some(limit), Some(cap)) => (limit as usize).min(cap),
            (Some(limit), None) => limit as usize,
            (None, Some(cap)) => cap,
            (None, None) => usize::MAX,
        }
        .max(1);
        let lower = match &request.exclusive_start_key {
            Some(key) => Bound::Excluded(key.clone()),
            None => Bound::Unbounded,
        };

        let mut remaining = stored.range((lower, Bound::Unbounded));
        let records: Vec<ObjectRecord> = remaining
            .by_ref()
            .take(limit)
            .map(|(key, size)| ObjectRecord::new(key.clone(), *size))
            .collect();
        let last_evaluated_key = if remaining.next().is_some() {
            records.last().map(|record| record.object_key.clone())
        } else {
            None
        };

        Ok(ScanPage {
            records,
            last_evaluated_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::metadata_table::RecordScan;
    use crate::adapters::retry::RetryPolicy;

    #[test]
    fn put_overwrites_existing_key() {
        let table = InMemoryMetadataTable::new();
        table
            .put_record(&ObjectRecord::new("a.txt", 42))
            .expect("put should succeed");
        table
            .put_record(&ObjectRecord::new("a.txt", 99))
            .expect("put should succeed");

        assert_eq!(table.records(), vec![ObjectRecord::new("a.txt", 99)]);
    }

    #[test]
    fn zero_limit_scan_returns_one_record_and_a_continuation() {
        let table = InMemoryMetadataTable::new();
        table.seed(["a", "b"].map(|key| ObjectRecord::new(key, 1)));

        let page = table
            .scan_page(&ScanRequest {
                exclusive_start_key: None,
                limit: Some(0),
            })
            .expect("scan should succeed");
        assert_eq!(page.records, vec![ObjectRecord::new("a", 1)]);
        assert_eq!(page.last_evaluated_key.as_deref(), Some("a"));

        let all = RecordScan::new(&table, RetryPolicy::no_retry())
            .with_page_limit(Some(0))
            .collect::<Result<Vec<_>, _>>()
            .expect("scan should succeed");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn scan_pages_respect_cap_and_continuation() {
        let table = InMemoryMetadataTable::with_page_size(2);
        table.seed(["a", "b", "c"].map(|key| ObjectRecord::new(key, 1)));

        let first = table
            .scan_page(&ScanRequest::default())
            .expect("scan should succeed");
        assert_eq!(first.records.len(), 2);
        assert_eq!(first.last_evaluated_key.as_deref(), Some("b"));

        let second = table
            .scan_page(&ScanRequest {
                exclusive_start_key: first.last_evaluated_key,
                limit: Some(10),
            })
            .expect("scan should succeed");
        assert_eq!(second.records, vec![ObjectRecord::new("c", 1)]);
        assert_eq!(second.last_evaluated_key, None);
    }
}

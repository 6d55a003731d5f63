use super::protocol::{ImportRejection, ImportReport};
use super::types::{Record, RecordInput};
use super::RecordStore;
use crate::error::{Result, SearchError};

use chrono::Utc;
use dashmap::DashMap;
use std::path::Path;

/// In-memory record store keyed by record id.
///
/// Searches take a snapshot through [`RecordStore::snapshot`], so writes that
/// land while a search is running are simply not seen by it.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: DashMap<String, Record>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Inserts a fully formed record, replacing any record with the same id.
    pub fn insert(&self, record: Record) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn create(&self, input: RecordInput) -> Result<Record> {
        input.validate().map_err(SearchError::Validation)?;
        let record = Record::from_input(input);
        self.insert(record.clone());
        tracing::debug!("Created record {} ({})", record.id, record.title);
        Ok(record)
    }

    /// Replaces the editable fields of an existing record.
    ///
    /// Returns `Ok(None)` if no record has the given id.
    pub fn update(&self, id: &str, input: RecordInput) -> Result<Option<Record>> {
        input.validate().map_err(SearchError::Validation)?;

        let Some(mut entry) = self.records.get_mut(id) else {
            return Ok(None);
        };
        let fresh = Record::from_input(input);
        entry.title = fresh.title;
        entry.content = fresh.content;
        entry.tags = fresh.tags;
        entry.category = fresh.category;
        entry.updated_at = Utc::now();

        tracing::debug!("Updated record {}", id);
        Ok(Some(entry.clone()))
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = self.records.remove(id).is_some();
        if removed {
            tracing::debug!("Deleted record {}", id);
        }
        removed
    }

    /// Stores every valid input of the batch and reports the rest by index.
    pub fn import(&self, batch: Vec<RecordInput>) -> ImportReport {
        let mut report = ImportReport::default();

        for (index, input) in batch.into_iter().enumerate() {
            match self.create(input) {
                Ok(record) => report.imported.push(record),
                Err(e) => report.rejected.push(ImportRejection {
                    index,
                    reason: e.to_string(),
                }),
            }
        }

        tracing::info!(
            "Bulk import finished: {} stored, {} rejected",
            report.imported.len(),
            report.rejected.len()
        );
        report
    }

    /// Seeds the store from a JSON array of record inputs.
    pub fn load_json(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let inputs: Vec<RecordInput> = serde_json::from_str(&raw)?;
        let report = self.import(inputs);

        for rejection in &report.rejected {
            tracing::warn!(
                "Skipped seed record #{} from {}: {}",
                rejection.index,
                path.display(),
                rejection.reason
            );
        }

        Ok(report.imported.len())
    }
}

impl RecordStore for MemoryRecordStore {
    fn snapshot(&self) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        // Most recently updated first; id keeps equal timestamps stable.
        records.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        records
    }

    fn get(&self, id: &str) -> Option<Record> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

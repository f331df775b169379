//! Dataset abstraction
//!
//! The runner consumes datasets through a narrow seam: a finite,
//! restartable source of records that can be iterated multiple times
//! across optimizer candidates. File ingestion lives outside the core.

use std::collections::BTreeMap;

use pipeline_optimizer_types::Record;

/// A finite, restartable source of records
pub trait Dataset: Send + Sync {
    /// Number of records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the records in dataset order
    ///
    /// Called once per runner invocation; the same dataset must yield the
    /// same records across repeated calls. Record identity within a run
    /// is iteration position: the runner rewrites `Record::index` to the
    /// position in this snapshot, so implementations need not maintain
    /// their own indices.
    fn records(&self) -> Vec<Record>;
}

/// In-memory dataset backed by a vector of records
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    records: Vec<Record>,
}

impl InMemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from pre-indexed records
    ///
    /// Record indices are rewritten to match their position.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(index, mut record)| {
                record.index = index;
                record
            })
            .collect();
        Self { records }
    }

    /// Append an unlabeled row
    pub fn push_row(&mut self, fields: BTreeMap<String, serde_json::Value>) {
        let index = self.records.len();
        self.records.push(Record::new(index, fields));
    }

    /// Append a labeled row
    pub fn push_labeled_row(
        &mut self,
        fields: BTreeMap<String, serde_json::Value>,
        ground_truth: BTreeMap<String, serde_json::Value>,
    ) {
        let index = self.records.len();
        self.records
            .push(Record::new(index, fields).with_ground_truth(ground_truth));
    }
}

impl Dataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.records.len()
    }

    fn records(&self) -> Vec<Record> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(text: &str) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("text".to_string(), json!(text));
        map
    }

    #[test]
    fn test_push_rows_assigns_indices() {
        let mut dataset = InMemoryDataset::new();
        dataset.push_row(fields("a"));
        dataset.push_labeled_row(fields("b"), fields("b"));

        assert_eq!(dataset.len(), 2);
        let records = dataset.records();
        assert_eq!(records[0].index, 0);
        assert_eq!(records[1].index, 1);
        assert!(!records[0].has_ground_truth());
        assert!(records[1].has_ground_truth());
    }

    #[test]
    fn test_restartable_iteration() {
        let mut dataset = InMemoryDataset::new();
        dataset.push_row(fields("a"));

        let first = dataset.records();
        let second = dataset.records();
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].field("text"), second[0].field("text"));
    }

    #[test]
    fn test_from_records_rewrites_indices() {
        let records = vec![
            Record::new(7, fields("x")),
            Record::new(9, fields("y")),
        ];
        let dataset = InMemoryDataset::from_records(records);
        let records = dataset.records();
        assert_eq!(records[0].index, 0);
        assert_eq!(records[1].index, 1);
    }
}

//! Input records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One input unit from a dataset
///
/// A record is an immutable mapping from field name to value, plus an
/// optional ground-truth mapping used by evaluators. Its identity is its
/// position in the dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Position within the dataset
    pub index: usize,
    /// Input fields
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Expected outputs, if labeled
    pub ground_truth: Option<BTreeMap<String, serde_json::Value>>,
}

impl Record {
    /// Create an unlabeled record
    pub fn new(index: usize, fields: BTreeMap<String, serde_json::Value>) -> Self {
        Self {
            index,
            fields,
            ground_truth: None,
        }
    }

    /// Attach ground truth
    pub fn with_ground_truth(
        mut self,
        ground_truth: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// Look up an input field
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Whether this record carries ground truth
    pub fn has_ground_truth(&self) -> bool {
        self.ground_truth.is_some()
    }
}

//! Evaluation scores

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Correctness signal produced by an evaluator
///
/// `Undefined` marks records that could not be scored (missing ground
/// truth or a failed evaluator); such records are excluded from aggregate
/// accuracy rather than counted as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreResult {
    /// Whole-output score in [0, 1]
    Scalar(f64),
    /// Per-field scores in [0, 1]
    PerField(BTreeMap<String, f64>),
    /// No score available for this record
    Undefined,
}

impl ScoreResult {
    /// Build a per-field score from (field, score) pairs
    pub fn per_field<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self::PerField(scores.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a boolean pass/fail score
    pub fn passed(passed: bool) -> Self {
        Self::Scalar(if passed { 1.0 } else { 0.0 })
    }

    /// Whether a score is available
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Undefined)
    }

    /// Collapse to a single scalar
    ///
    /// Per-field scores collapse to their mean; `Undefined` has no scalar.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(*v),
            Self::PerField(fields) => {
                if fields.is_empty() {
                    None
                } else {
                    Some(fields.values().sum::<f64>() / fields.len() as f64)
                }
            }
            Self::Undefined => None,
        }
    }
}

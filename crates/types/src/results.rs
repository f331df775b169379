//! Run results and aggregated statistics
//!
//! A `RunResult` captures one pipeline execution over one record; a
//! `DatasetResult` is the full table for one pipeline, one parameter
//! assignment, and one dataset, plus its aggregated statistics. Both are
//! immutable once written and round-trip losslessly through serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::params::ParameterAssignment;
use crate::score::ScoreResult;
use crate::telemetry::{ModelUsage, RecordTelemetry};

/// The outcome of executing one pipeline over one record
///
/// A failed record never carries partial output or a score: the error is
/// captured here and in the telemetry, nothing else is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// All steps ran; output fields and the evaluation score are present
    Completed {
        output: BTreeMap<String, serde_json::Value>,
        score: ScoreResult,
    },
    /// A step failed; downstream steps were skipped
    Failed { step: String, error: String },
    /// The run was canceled before this record started
    Canceled,
}

/// The outcome of executing one pipeline, under one parameter assignment,
/// over one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Record identity within the dataset
    pub record_index: usize,
    /// Execution outcome
    pub outcome: RunOutcome,
    /// Telemetry collected up to the point of completion or failure
    pub telemetry: RecordTelemetry,
}

impl RunResult {
    /// Output fields, if the record completed
    pub fn output(&self) -> Option<&BTreeMap<String, serde_json::Value>> {
        match &self.outcome {
            RunOutcome::Completed { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Evaluation score, if the record completed
    pub fn score(&self) -> Option<&ScoreResult> {
        match &self.outcome {
            RunOutcome::Completed { score, .. } => Some(score),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, RunOutcome::Failed { .. })
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.outcome, RunOutcome::Canceled)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    /// Replace the score on a completed outcome
    pub fn with_score(mut self, new_score: ScoreResult) -> Self {
        if let RunOutcome::Completed { score, .. } = &mut self.outcome {
            *score = new_score;
        }
        self
    }
}

/// Accuracy with its denominator
///
/// The denominator is the count of records with a defined score, reported
/// alongside the rate so callers can detect partial coverage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy {
    pub rate: f64,
    pub denominator: u64,
}

/// Aggregated statistics over one dataset run
///
/// Mean cost and latency are computed over completed records only;
/// `total_cost` also includes partial telemetry from failed records,
/// since that money was spent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total records in the dataset
    pub total_records: u64,
    /// Records that completed every step
    pub completed: u64,
    /// Records halted by a step failure
    pub failed: u64,
    /// Records never started due to cancellation
    pub canceled: u64,
    /// Records with a defined evaluation score
    pub scored: u64,
    /// Cost across all executed steps, including failed records
    pub total_cost: f64,
    /// Mean cost over completed records
    pub mean_cost: f64,
    /// Mean wall-clock latency over completed records
    pub mean_latency_ms: f64,
    /// Prompt tokens across all executed steps
    pub total_tokens_in: u64,
    /// Completion tokens across all executed steps
    pub total_tokens_out: u64,
    /// Accuracy over scored records, if any were scored
    pub accuracy: Option<Accuracy>,
    /// Usage rolled up per model
    pub by_model: BTreeMap<String, ModelUsage>,
}

/// The full result table for one pipeline x assignment x dataset triple
///
/// Row count equals the dataset's record count exactly; read-only once
/// produced by the dataset runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetResult {
    /// Unique identifier of this runner invocation
    pub run_id: Uuid,
    /// Pipeline name
    pub pipeline: String,
    /// The assignment this run executed under
    pub assignment: ParameterAssignment,
    /// Per-record results in dataset order
    pub results: Vec<RunResult>,
    /// Aggregated statistics
    pub summary: RunSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

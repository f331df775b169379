//! Core types and data models for the pipeline optimizer
//!
//! This crate provides the fundamental data structures shared by the
//! dataset runner and the parameter search: input records, parameter
//! schemas and assignments, per-step telemetry, evaluation scores, and
//! the result tables produced by a dataset run.

pub mod errors;
pub mod params;
pub mod record;
pub mod results;
pub mod score;
pub mod telemetry;

pub use errors::{OptimizerError, Result};
pub use params::{ParamDomain, ParamValue, ParameterAssignment, StepAssignment, StepSpec};
pub use record::Record;
pub use results::{Accuracy, DatasetResult, RunOutcome, RunResult, RunSummary};
pub use score::ScoreResult;
pub use telemetry::{ModelUsage, RecordTelemetry, StepTelemetry};

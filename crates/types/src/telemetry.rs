//! Per-execution telemetry
//!
//! Every step execution reports tokens consumed, derived monetary cost,
//! wall-clock latency, and error status. Record-level telemetry composes
//! the per-step measurements and rolls usage up per model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Telemetry for one step execution over one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepTelemetry {
    /// Step name
    pub step: String,
    /// Prompt tokens consumed
    pub tokens_in: u64,
    /// Completion tokens produced
    pub tokens_out: u64,
    /// Monetary cost in dollars
    pub cost: f64,
    /// Wall-clock latency of the step
    pub latency_ms: f64,
    /// Model that served the call, if any
    pub model: Option<String>,
    /// Failure message, if the computation failed
    pub error: Option<String>,
}

impl StepTelemetry {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            ..Default::default()
        }
    }

    /// Whether this step execution failed
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Token and cost usage attributed to one model
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost: f64,
}

impl ModelUsage {
    pub fn add(&mut self, other: &ModelUsage) {
        self.tokens_in += other.tokens_in;
        self.tokens_out += other.tokens_out;
        self.cost += other.cost;
    }
}

/// Telemetry for one record's pipeline execution
///
/// `latency_ms` is measured as wall-clock time across the whole step
/// chain, not the sum of per-step latencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordTelemetry {
    /// Per-step telemetry in pipeline order, up to and including a
    /// failing step
    pub steps: Vec<StepTelemetry>,
    /// Wall-clock latency of the whole chain
    pub latency_ms: f64,
}

impl RecordTelemetry {
    /// Append one step's telemetry
    pub fn push(&mut self, step: StepTelemetry) {
        self.steps.push(step);
    }

    /// Total cost across steps
    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|s| s.cost).sum()
    }

    /// Total prompt tokens across steps
    pub fn total_tokens_in(&self) -> u64 {
        self.steps.iter().map(|s| s.tokens_in).sum()
    }

    /// Total completion tokens across steps
    pub fn total_tokens_out(&self) -> u64 {
        self.steps.iter().map(|s| s.tokens_out).sum()
    }

    /// The halting failure, if any step failed
    pub fn error(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| s.error.as_deref())
    }

    /// Usage rolled up per model
    pub fn by_model(&self) -> BTreeMap<String, ModelUsage> {
        let mut usage: BTreeMap<String, ModelUsage> = BTreeMap::new();
        for step in &self.steps {
            if let Some(model) = &step.model {
                usage.entry(model.clone()).or_default().add(&ModelUsage {
                    tokens_in: step.tokens_in,
                    tokens_out: step.tokens_out,
                    cost: step.cost,
                });
            }
        }
        usage
    }
}

//! Step and pipeline abstraction
//!
//! A step is a single parametrized unit of work applied to one record,
//! typically backed by an LLM call supplied by the pipeline author as an
//! opaque capability. A pipeline composes steps in order, threading the
//! growing output context from each step into the next.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use pipeline_optimizer_types::{
    OptimizerError, ParameterAssignment, Record, RecordTelemetry, Result, RunOutcome, RunResult,
    ScoreResult, StepAssignment, StepSpec, StepTelemetry,
};

use crate::pricing::CostModel;

/// Output of one step computation
///
/// The computation reports its produced fields and token usage; monetary
/// cost may be reported directly or left unset and derived from the cost
/// model using the reported model name.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// Produced output fields
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Prompt tokens consumed
    pub tokens_in: u64,
    /// Completion tokens produced
    pub tokens_out: u64,
    /// Model that served the call, if any
    pub model: Option<String>,
    /// Reported cost, if the computation derived one itself
    pub cost: Option<f64>,
}

impl StepOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one produced field
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Report token usage for a model call
    pub fn with_usage(mut self, model: impl Into<String>, tokens_in: u64, tokens_out: u64) -> Self {
        self.model = Some(model.into());
        self.tokens_in = tokens_in;
        self.tokens_out = tokens_out;
        self
    }

    /// Report an externally derived cost
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Read-only view of a record's fields plus upstream step outputs
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    fields: BTreeMap<String, serde_json::Value>,
}

impl RecordContext {
    /// Seed the context from a record's input fields
    pub fn from_record(record: &Record) -> Self {
        Self {
            fields: record.fields.clone(),
        }
    }

    /// Look up a field from the record or an upstream step
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Field as a string, if present and textual
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(|v| v.as_str())
    }

    /// All visible fields
    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }

    fn absorb(&mut self, output: &BTreeMap<String, serde_json::Value>) {
        for (key, value) in output {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

/// A single parametrized transformation/extraction unit
///
/// The core treats the computation as an opaque capability: it may call
/// out to an LLM provider, run a local heuristic, or anything else.
/// Retries and provider formatting belong inside the implementation, not
/// to the runner.
#[async_trait]
pub trait Step: Send + Sync {
    /// Declared schema of this step
    fn spec(&self) -> &StepSpec;

    /// Apply the step to one record context under concrete parameters
    async fn run(&self, ctx: &RecordContext, params: &StepAssignment)
        -> anyhow::Result<StepOutput>;
}

/// Step backed by a plain closure
pub struct FnStep {
    spec: StepSpec,
    #[allow(clippy::type_complexity)]
    func: Arc<dyn Fn(&RecordContext, &StepAssignment) -> anyhow::Result<StepOutput> + Send + Sync>,
}

impl FnStep {
    pub fn new<F>(spec: StepSpec, func: F) -> Self
    where
        F: Fn(&RecordContext, &StepAssignment) -> anyhow::Result<StepOutput>
            + Send
            + Sync
            + 'static,
    {
        Self {
            spec,
            func: Arc::new(func),
        }
    }
}

#[async_trait]
impl Step for FnStep {
    fn spec(&self) -> &StepSpec {
        &self.spec
    }

    async fn run(
        &self,
        ctx: &RecordContext,
        params: &StepAssignment,
    ) -> anyhow::Result<StepOutput> {
        (self.func)(ctx, params)
    }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder {
    name: String,
    steps: Vec<Arc<dyn Step>>,
    input_fields: Option<Vec<String>>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            input_fields: None,
        }
    }

    /// Append a step
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    /// Append an already shared step
    pub fn arc_step(mut self, step: Arc<dyn Step>) -> Self {
        self.steps.push(step);
        self
    }

    /// Declare the dataset's record fields
    ///
    /// When declared, the builder checks at construction time that every
    /// step's required fields are satisfied by the record schema or an
    /// upstream step's produced fields, converting a runtime mismatch
    /// into a construction-time configuration error.
    pub fn with_input_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.spec().name.clone()) {
                return Err(OptimizerError::Configuration(format!(
                    "duplicate step name '{}'",
                    step.spec().name
                )));
            }
        }

        if let Some(input_fields) = &self.input_fields {
            let mut available: BTreeSet<String> = input_fields.iter().cloned().collect();
            for step in &self.steps {
                let spec = step.spec();
                for required in &spec.requires {
                    if !available.contains(required) {
                        return Err(OptimizerError::Configuration(format!(
                            "step '{}' requires field '{required}' which is neither a record field nor produced upstream",
                            spec.name
                        )));
                    }
                }
                available.extend(spec.produces.iter().cloned());
            }
        }

        Ok(Pipeline {
            name: self.name,
            steps: self.steps,
        })
    }
}

/// An ordered composition of steps
pub struct Pipeline {
    name: String,
    steps: Vec<Arc<dyn Step>>,
}

impl Pipeline {
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Declared specs of every step, in order
    pub fn specs(&self) -> Vec<StepSpec> {
        self.steps.iter().map(|s| s.spec().clone()).collect()
    }

    /// Total size of the cartesian parameter grid across steps
    pub fn grid_size(&self) -> usize {
        self.steps.iter().map(|s| s.spec().grid_size()).product()
    }

    /// Validate an assignment against every step's declared schema
    pub fn validate_assignment(&self, assignment: &ParameterAssignment) -> Result<()> {
        assignment.validate_against(&self.specs())
    }

    /// Execute every step in order over one record
    ///
    /// Steps are strictly sequential: step i+1 reads step i's output from
    /// the growing context. On a step failure the chain halts, downstream
    /// steps are skipped, and the partial telemetry collected so far is
    /// preserved in the result. The score on a completed outcome is left
    /// `Undefined`; the runner attaches it after evaluation.
    pub async fn run_record(
        &self,
        record: &Record,
        assignment: &ParameterAssignment,
        cost_model: &dyn CostModel,
    ) -> RunResult {
        let mut ctx = RecordContext::from_record(record);
        let mut telemetry = RecordTelemetry::default();
        let chain_started = Instant::now();

        for step in &self.steps {
            let spec = step.spec();
            let params = assignment.for_step(&spec.name);
            let step_started = Instant::now();

            let outcome = step
                .run(&ctx, &params)
                .await
                .map_err(|cause| OptimizerError::step(&spec.name, &cause))
                .and_then(|output| {
                    for produced in &spec.produces {
                        if !output.fields.contains_key(produced) {
                            return Err(OptimizerError::Step {
                                step: spec.name.clone(),
                                message: format!(
                                    "declared output field '{produced}' is missing"
                                ),
                            });
                        }
                    }
                    Ok(output)
                });

            let latency_ms = step_started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(output) => {
                    let cost = match output.cost {
                        Some(cost) => cost,
                        None => output
                            .model
                            .as_deref()
                            .map(|model| cost_model.cost(model, output.tokens_in, output.tokens_out))
                            .unwrap_or(0.0),
                    };

                    telemetry.push(StepTelemetry {
                        step: spec.name.clone(),
                        tokens_in: output.tokens_in,
                        tokens_out: output.tokens_out,
                        cost,
                        latency_ms,
                        model: output.model.clone(),
                        error: None,
                    });

                    ctx.absorb(&output.fields);
                }
                Err(failure) => {
                    warn!(
                        record = record.index,
                        step = %spec.name,
                        error = %failure,
                        "step failed, skipping downstream steps"
                    );

                    let message = match &failure {
                        OptimizerError::Step { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    telemetry.push(StepTelemetry {
                        latency_ms,
                        error: Some(message.clone()),
                        ..StepTelemetry::new(&spec.name)
                    });
                    telemetry.latency_ms = chain_started.elapsed().as_secs_f64() * 1000.0;

                    return RunResult {
                        record_index: record.index,
                        outcome: RunOutcome::Failed {
                            step: spec.name.clone(),
                            error: message,
                        },
                        telemetry,
                    };
                }
            }
        }

        telemetry.latency_ms = chain_started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            record = record.index,
            pipeline = %self.name,
            latency_ms = telemetry.latency_ms,
            "record completed"
        );

        RunResult {
            record_index: record.index,
            outcome: RunOutcome::Completed {
                output: ctx.fields,
                score: ScoreResult::Undefined,
            },
            telemetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::{FreeOfCharge, PriceTable};
    use pipeline_optimizer_types::ParamDomain;
    use serde_json::json;

    fn record(text: &str) -> Record {
        let mut fields = BTreeMap::new();
        fields.insert("text".to_string(), json!(text));
        Record::new(0, fields)
    }

    fn uppercase_step() -> FnStep {
        FnStep::new(
            StepSpec::new("uppercase")
                .with_requires(["text"])
                .with_produces(["upper"]),
            |ctx, _params| {
                let text = ctx.text("text").unwrap_or_default();
                Ok(StepOutput::new().with_field("upper", json!(text.to_uppercase())))
            },
        )
    }

    fn length_step() -> FnStep {
        FnStep::new(
            StepSpec::new("length")
                .with_requires(["upper"])
                .with_produces(["length"]),
            |ctx, _params| {
                let upper = ctx.text("upper").unwrap_or_default();
                Ok(StepOutput::new().with_field("length", json!(upper.len())))
            },
        )
    }

    #[tokio::test]
    async fn test_context_threads_through_steps() {
        let pipeline = Pipeline::builder("chars")
            .step(uppercase_step())
            .step(length_step())
            .with_input_fields(["text"])
            .build()
            .unwrap();

        let result = pipeline
            .run_record(&record("hello"), &ParameterAssignment::empty(), &FreeOfCharge)
            .await;

        assert!(result.is_completed());
        let output = result.output().unwrap();
        assert_eq!(output.get("upper"), Some(&json!("HELLO")));
        assert_eq!(output.get("length"), Some(&json!(5)));
        assert_eq!(result.telemetry.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_step_failure_halts_chain() {
        let failing = FnStep::new(StepSpec::new("boom"), |_ctx, _params| {
            anyhow::bail!("provider unavailable")
        });

        let pipeline = Pipeline::builder("fails")
            .step(uppercase_step())
            .step(failing)
            .step(length_step())
            .build()
            .unwrap();

        let result = pipeline
            .run_record(&record("hello"), &ParameterAssignment::empty(), &FreeOfCharge)
            .await;

        assert!(result.is_error());
        assert!(result.output().is_none());
        assert!(result.score().is_none());
        // partial telemetry: successful first step plus the failing step
        assert_eq!(result.telemetry.steps.len(), 2);
        assert!(result.telemetry.steps[1].is_error());
        match &result.outcome {
            RunOutcome::Failed { step, error } => {
                assert_eq!(step, "boom");
                assert!(error.contains("provider unavailable"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_declared_output_is_a_step_failure() {
        let sloppy = FnStep::new(
            StepSpec::new("sloppy").with_produces(["label"]),
            |_ctx, _params| Ok(StepOutput::new()),
        );

        let pipeline = Pipeline::builder("p").step(sloppy).build().unwrap();
        let result = pipeline
            .run_record(&record("x"), &ParameterAssignment::empty(), &FreeOfCharge)
            .await;

        assert!(result.is_error());
        match &result.outcome {
            RunOutcome::Failed { error, .. } => assert!(error.contains("label")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cost_derived_from_price_table() {
        let llm = FnStep::new(
            StepSpec::new("llm").with_produces(["label"]),
            |_ctx, _params| {
                Ok(StepOutput::new()
                    .with_field("label", json!("a"))
                    .with_usage("cheap", 1000, 500))
            },
        );

        let pipeline = Pipeline::builder("p").step(llm).build().unwrap();
        let prices = PriceTable::new().with_model("cheap", 0.001, 0.002);
        let result = pipeline
            .run_record(&record("x"), &ParameterAssignment::empty(), &prices)
            .await;

        let expected = (1000.0 / 1000.0) * 0.001 + (500.0 / 1000.0) * 0.002;
        assert!((result.telemetry.total_cost() - expected).abs() < 1e-9);
        assert_eq!(result.telemetry.by_model()["cheap"].tokens_in, 1000);
    }

    #[test]
    fn test_duplicate_step_names_rejected() {
        let result = Pipeline::builder("dup")
            .step(uppercase_step())
            .step(uppercase_step())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_unsatisfied_requires_rejected_at_build() {
        let result = Pipeline::builder("bad")
            .step(length_step())
            .with_input_fields(["text"])
            .build();
        assert!(matches!(result, Err(OptimizerError::Configuration(_))));
    }

    #[test]
    fn test_grid_size_is_product_across_steps() {
        let a = FnStep::new(
            StepSpec::new("a").with_param("model", ParamDomain::strings(["x", "y"])),
            |_ctx, _params| Ok(StepOutput::new()),
        );
        let b = FnStep::new(
            StepSpec::new("b").with_param("variant", ParamDomain::strings(["p", "q", "r"])),
            |_ctx, _params| Ok(StepOutput::new()),
        );
        let pipeline = Pipeline::builder("p").step(a).step(b).build().unwrap();
        assert_eq!(pipeline.grid_size(), 6);
    }
}

//! Sweep driver
//!
//! Pulls candidates from a [`CandidateStrategy`], evaluates each with a
//! [`DatasetRunner`] invocation, and folds the resulting summaries into a
//! Pareto frontier until the strategy or the budget runs out. Candidate
//! evaluations are fully independent; the concurrency cap here bounds
//! runner invocations in flight and is distinct from the runner's own
//! per-record cap.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};

use pipeline_optimizer_runner::{
    CancelToken, CostModel, Dataset, DatasetRunner, Evaluator, Pipeline, RunnerConfig,
};
use pipeline_optimizer_types::{DatasetResult, OptimizerError, Result};

use crate::budget::{Budget, BudgetTracker};
use crate::candidates::CandidateStrategy;
use crate::pareto::{ParetoFrontier, ParetoPoint};

/// Tuning for one optimization sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Runner invocations in flight at once
    pub candidate_concurrency: usize,
    /// Objective-space distance under which frontier points are
    /// classified as near-duplicates (classification only, never
    /// deduplication)
    pub epsilon: f64,
    /// Per-invocation runner tuning
    pub runner: RunnerConfig,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            candidate_concurrency: 1,
            epsilon: 0.0,
            runner: RunnerConfig::default(),
        }
    }
}

impl OptimizeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.candidate_concurrency == 0 {
            return Err(OptimizerError::Configuration(
                "candidate_concurrency must be at least 1".to_string(),
            ));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(OptimizerError::Configuration(format!(
                "epsilon must be non-negative and finite, got {}",
                self.epsilon
            )));
        }
        self.runner.validate()
    }
}

/// Why a sweep stopped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The strategy has no more candidates to propose
    Exhausted,
    /// A budget limit tripped; results gathered so far are kept
    BudgetExceeded { detail: String },
    /// The caller's cancellation token tripped
    Canceled,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeReport {
    pub frontier: ParetoFrontier,
    /// Runner invocations completed
    pub evaluations: u64,
    /// Cumulative cost across all invocations
    pub total_cost: f64,
    pub elapsed: Duration,
    pub termination: Termination,
}

/// Drives a parameter sweep over a pipeline
#[derive(Clone)]
pub struct Optimizer {
    config: OptimizeConfig,
    runner: DatasetRunner,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizeConfig::default())
    }
}

impl Optimizer {
    pub fn new(config: OptimizeConfig) -> Self {
        let runner = DatasetRunner::new(config.runner.clone());
        Self { config, runner }
    }

    /// Price runner invocations with a real cost model
    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.runner = self.runner.with_cost_model(cost_model);
        self
    }

    pub fn config(&self) -> &OptimizeConfig {
        &self.config
    }

    /// Run the sweep until the strategy or the budget is exhausted
    ///
    /// Configuration problems (invalid config, invalid budget, a runner
    /// invocation rejecting its assignment) fail the whole sweep; budget
    /// exhaustion and cancellation terminate it gracefully with the
    /// frontier built so far.
    pub async fn optimize(
        &self,
        pipeline: &Arc<Pipeline>,
        dataset: &Arc<dyn Dataset>,
        evaluator: Option<&Arc<dyn Evaluator>>,
        strategy: &mut dyn CandidateStrategy,
        budget: Budget,
        cancel: &CancelToken,
    ) -> Result<OptimizeReport> {
        self.config.validate()?;
        budget.validate()?;

        info!(
            pipeline = %pipeline.name(),
            candidate_concurrency = self.config.candidate_concurrency,
            remaining_hint = ?strategy.remaining_hint(),
            "starting optimization sweep"
        );

        let mut frontier = ParetoFrontier::with_epsilon(self.config.epsilon);
        let mut tracker = BudgetTracker::new(budget.clone());
        let mut tasks: JoinSet<Result<DatasetResult>> = JoinSet::new();
        let mut dispatched: u64 = 0;
        let mut termination = None;

        loop {
            while tasks.len() >= self.config.candidate_concurrency {
                self.absorb_next(&mut tasks, &mut tracker, &mut frontier)
                    .await?;
            }

            if cancel.is_canceled() {
                termination = Some(Termination::Canceled);
                break;
            }
            // evaluation limits count dispatches so in-flight candidates
            // never overshoot; cost and time limits see completed work only
            if let Some(max) = budget.max_evaluations {
                if dispatched >= max {
                    termination = Some(Termination::BudgetExceeded {
                        detail: format!("evaluation limit reached ({max})"),
                    });
                    break;
                }
            }
            if let Some(detail) = tracker.exceeded() {
                termination = Some(Termination::BudgetExceeded { detail });
                break;
            }

            let Some(assignment) = strategy.next_candidate(&frontier) else {
                break;
            };
            dispatched += 1;

            let runner = self.runner.clone();
            let pipeline = Arc::clone(pipeline);
            let dataset = Arc::clone(dataset);
            let evaluator = evaluator.map(Arc::clone);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                runner
                    .run(&pipeline, &assignment, dataset.as_ref(), evaluator.as_ref(), &cancel)
                    .await
            });
        }

        // in-flight evaluations always finish and are recorded
        while !tasks.is_empty() {
            self.absorb_next(&mut tasks, &mut tracker, &mut frontier)
                .await?;
        }

        let termination = termination.unwrap_or(if cancel.is_canceled() {
            Termination::Canceled
        } else {
            Termination::Exhausted
        });

        let report = OptimizeReport {
            evaluations: tracker.evaluations(),
            total_cost: tracker.cost(),
            elapsed: tracker.elapsed(),
            termination,
            frontier,
        };

        info!(
            evaluations = report.evaluations,
            total_cost = report.total_cost,
            frontier_size = report.frontier.len(),
            termination = ?report.termination,
            "optimization sweep finished"
        );

        Ok(report)
    }

    async fn absorb_next(
        &self,
        tasks: &mut JoinSet<Result<DatasetResult>>,
        tracker: &mut BudgetTracker,
        frontier: &mut ParetoFrontier,
    ) -> Result<()> {
        let Some(joined) = tasks.join_next().await else {
            return Ok(());
        };
        let result = joined
            .map_err(|e| OptimizerError::Internal(format!("candidate task failed: {e}")))??;

        tracker.record(result.summary.total_cost);

        match Self::to_point(&result) {
            Some(point) => {
                let outcome = frontier.insert(point);
                info!(
                    run_id = %result.run_id,
                    assignment = %result.assignment.key(),
                    outcome = ?outcome,
                    frontier_size = frontier.len(),
                    "candidate evaluated"
                );
            }
            None => {
                warn!(
                    run_id = %result.run_id,
                    assignment = %result.assignment.key(),
                    "candidate produced no defined scores, excluded from frontier"
                );
            }
        }
        Ok(())
    }

    /// A candidate with no defined scores has no accuracy coordinate and
    /// cannot sit on the frontier
    fn to_point(result: &DatasetResult) -> Option<ParetoPoint> {
        let accuracy = result.summary.accuracy.as_ref()?;
        Some(ParetoPoint {
            run_id: result.run_id,
            assignment: result.assignment.clone(),
            accuracy: accuracy.rate,
            cost: result.summary.total_cost,
            latency_ms: result.summary.mean_latency_ms,
            scored: accuracy.denominator,
            records: result.summary.total_records,
        })
    }
}

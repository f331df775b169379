//! Concurrent dataset runner
//!
//! Executes a pipeline under one parameter assignment over every record
//! of a dataset, bounded by a caller-configured worker pool. Per-record
//! executions are independent and share no mutable state; a failing
//! record is recorded and never aborts the run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pipeline_optimizer_types::{
    DatasetResult, OptimizerError, ParameterAssignment, RecordTelemetry, Result, RunOutcome,
    RunResult, ScoreResult,
};

use crate::aggregate::summarize;
use crate::cancel::CancelToken;
use crate::dataset::Dataset;
use crate::evaluator::Evaluator;
use crate::pipeline::Pipeline;
use crate::pricing::{CostModel, FreeOfCharge};

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum records executed concurrently
    ///
    /// Tune this down in response to provider throttling; backpressure
    /// and retries belong to the step-internal client.
    pub concurrency: usize,
    /// Accuracy counting mode: fraction of records scoring above this
    /// threshold when set, mean scalar score otherwise
    pub score_threshold: Option<f64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            score_threshold: None,
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(OptimizerError::Configuration(
                "runner concurrency must be at least 1".to_string(),
            ));
        }
        if let Some(threshold) = self.score_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(OptimizerError::Configuration(format!(
                    "score threshold {threshold} must be in [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Executes pipelines over datasets
///
/// All run state is owned by the invocation; a runner can serve
/// concurrent invocations without sharing mutable accumulators.
#[derive(Clone)]
pub struct DatasetRunner {
    config: RunnerConfig,
    cost_model: Arc<dyn CostModel>,
}

impl Default for DatasetRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl DatasetRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            cost_model: Arc::new(FreeOfCharge),
        }
    }

    /// Use a pluggable cost model instead of the free default
    pub fn with_cost_model(mut self, cost_model: Arc<dyn CostModel>) -> Self {
        self.cost_model = cost_model;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute the pipeline over every record of the dataset
    ///
    /// Guarantees:
    /// - the assignment is validated before any step executes;
    /// - at most one execution per record per invocation, no retries;
    /// - a failing record is recorded, the run completes for the rest;
    /// - on cancellation, completed results are preserved, in-flight
    ///   records finish, and unstarted records are marked canceled;
    /// - the result table always has one row per dataset record.
    pub async fn run(
        &self,
        pipeline: &Arc<Pipeline>,
        assignment: &ParameterAssignment,
        dataset: &dyn Dataset,
        evaluator: Option<&Arc<dyn Evaluator>>,
        cancel: &CancelToken,
    ) -> Result<DatasetResult> {
        self.config.validate()?;
        pipeline.validate_assignment(assignment)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        // identity within a run is iteration position; source-reported
        // indices are not trusted
        let mut records = dataset.records();
        for (position, record) in records.iter_mut().enumerate() {
            record.index = position;
        }
        let total = records.len();

        info!(
            run_id = %run_id,
            pipeline = %pipeline.name(),
            records = records.len(),
            concurrency = self.config.concurrency,
            "starting dataset run"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let shared_assignment = Arc::new(assignment.clone());
        let mut tasks: JoinSet<(usize, RunResult)> = JoinSet::new();

        for record in records {
            let pipeline = Arc::clone(pipeline);
            let assignment = Arc::clone(&shared_assignment);
            let cost_model = Arc::clone(&self.cost_model);
            let evaluator = evaluator.map(Arc::clone);
            let semaphore = Arc::clone(&semaphore);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let index = record.index;

                // Semaphore is never closed while tasks run
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            index,
                            RunResult {
                                record_index: index,
                                outcome: RunOutcome::Canceled,
                                telemetry: RecordTelemetry::default(),
                            },
                        )
                    }
                };

                if let Err(OptimizerError::Canceled) = cancel.check() {
                    debug!(record = index, "skipping record, run canceled");
                    return (
                        index,
                        RunResult {
                            record_index: index,
                            outcome: RunOutcome::Canceled,
                            telemetry: RecordTelemetry::default(),
                        },
                    );
                }

                let result = pipeline
                    .run_record(&record, &assignment, cost_model.as_ref())
                    .await;

                let result = if result.is_completed() {
                    let score = score_record(evaluator.as_deref(), &result, &record);
                    result.with_score(score)
                } else {
                    result
                };

                (index, result)
            });
        }

        let mut results: Vec<Option<RunResult>> = Vec::new();
        results.resize_with(total, || None);

        while let Some(joined) = tasks.join_next().await {
            let (index, result) = joined
                .map_err(|e| OptimizerError::Internal(format!("record task failed: {e}")))?;
            results[index] = Some(result);
        }

        let results: Vec<RunResult> = results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| {
                    OptimizerError::Internal(format!("no result produced for record {index}"))
                })
            })
            .collect::<Result<_>>()?;

        let summary = summarize(&results, self.config.score_threshold);

        info!(
            run_id = %run_id,
            completed = summary.completed,
            failed = summary.failed,
            canceled = summary.canceled,
            total_cost = summary.total_cost,
            "dataset run finished"
        );

        Ok(DatasetResult {
            run_id,
            pipeline: pipeline.name().to_string(),
            assignment: assignment.clone(),
            results,
            summary,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Score one completed record
///
/// Missing ground truth and evaluator failures both map to an undefined
/// score; evaluator failures are logged but never abort the run.
fn score_record(
    evaluator: Option<&dyn Evaluator>,
    result: &RunResult,
    record: &pipeline_optimizer_types::Record,
) -> ScoreResult {
    let (Some(evaluator), Some(output)) = (evaluator, result.output()) else {
        return ScoreResult::Undefined;
    };
    let Some(ground_truth) = &record.ground_truth else {
        return ScoreResult::Undefined;
    };

    match evaluator.score(output, ground_truth) {
        Ok(score) => score,
        Err(error) => {
            warn!(
                record = record.index,
                error = %error,
                "evaluator failed, treating score as undefined"
            );
            ScoreResult::Undefined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        assert!(RunnerConfig::default().validate().is_ok());

        let zero_workers = RunnerConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(zero_workers.validate().is_err());

        let bad_threshold = RunnerConfig {
            score_threshold: Some(1.5),
            ..Default::default()
        };
        assert!(bad_threshold.validate().is_err());
    }
}

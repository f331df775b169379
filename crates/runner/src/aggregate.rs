//! Telemetry aggregation
//!
//! A pure, stateless reducer over per-record results: sums and means of
//! cost and latency, error counts, accuracy with its denominator, and a
//! per-model usage rollup. Owned entirely by the runner invocation that
//! calls it; no persistence, no shared accumulators.

use std::collections::BTreeMap;

use pipeline_optimizer_types::{Accuracy, ModelUsage, RunResult, RunSummary};

/// Reduce per-record results into a run summary
///
/// Mean cost and latency are computed over completed records. Accuracy is
/// computed over records with a defined score: as the fraction scoring
/// above `score_threshold` when one is supplied, otherwise as the mean
/// scalar score. The denominator is reported alongside the rate.
pub fn summarize(results: &[RunResult], score_threshold: Option<f64>) -> RunSummary {
    let mut summary = RunSummary {
        total_records: results.len() as u64,
        ..Default::default()
    };

    let mut completed_cost = 0.0;
    let mut completed_latency = 0.0;
    let mut score_sum = 0.0;
    let mut above_threshold: u64 = 0;
    let mut by_model: BTreeMap<String, ModelUsage> = BTreeMap::new();

    for result in results {
        summary.total_cost += result.telemetry.total_cost();
        summary.total_tokens_in += result.telemetry.total_tokens_in();
        summary.total_tokens_out += result.telemetry.total_tokens_out();

        for (model, usage) in result.telemetry.by_model() {
            by_model.entry(model).or_default().add(&usage);
        }

        if result.is_canceled() {
            summary.canceled += 1;
            continue;
        }
        if result.is_error() {
            summary.failed += 1;
            continue;
        }

        summary.completed += 1;
        completed_cost += result.telemetry.total_cost();
        completed_latency += result.telemetry.latency_ms;

        if let Some(scalar) = result.score().and_then(|s| s.scalar()) {
            summary.scored += 1;
            score_sum += scalar;
            if let Some(threshold) = score_threshold {
                if scalar > threshold {
                    above_threshold += 1;
                }
            }
        }
    }

    if summary.completed > 0 {
        summary.mean_cost = completed_cost / summary.completed as f64;
        summary.mean_latency_ms = completed_latency / summary.completed as f64;
    }

    if summary.scored > 0 {
        let rate = match score_threshold {
            Some(_) => above_threshold as f64 / summary.scored as f64,
            None => score_sum / summary.scored as f64,
        };
        summary.accuracy = Some(Accuracy {
            rate,
            denominator: summary.scored,
        });
    }

    summary.by_model = by_model;
    summary
}

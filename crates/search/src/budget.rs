//! Sweep budgets
//!
//! A budget caps how much a sweep may spend before it stops proposing new
//! candidates. Limits compose: the sweep stops at whichever limit trips
//! first. Exceeding a budget is graceful, never an error: results gathered
//! so far are kept and reported.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use pipeline_optimizer_types::{OptimizerError, Result};

/// Spending limits for one optimization sweep
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Budget {
    /// Maximum number of runner invocations
    pub max_evaluations: Option<u64>,
    /// Maximum cumulative cost across all invocations
    pub max_cost: Option<f64>,
    /// Wall-clock limit, measured from the start of the sweep
    pub deadline: Option<Duration>,
}

impl Budget {
    /// No limits at all; the sweep runs until the strategy is exhausted
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_max_evaluations(mut self, max: u64) -> Self {
        self.max_evaluations = Some(max);
        self
    }

    pub fn with_max_cost(mut self, max: f64) -> Self {
        self.max_cost = Some(max);
        self
    }

    pub fn with_deadline(mut self, max: Duration) -> Self {
        self.deadline = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_evaluations == Some(0) {
            return Err(OptimizerError::Configuration(
                "max_evaluations must be at least 1".to_string(),
            ));
        }
        if let Some(max_cost) = self.max_cost {
            if !max_cost.is_finite() || max_cost <= 0.0 {
                return Err(OptimizerError::Configuration(format!(
                    "max_cost must be positive and finite, got {max_cost}"
                )));
            }
        }
        Ok(())
    }
}

/// Tracks spending against a [`Budget`] over one sweep
///
/// Owned by a single sweep invocation; the clock starts when the tracker
/// is created.
#[derive(Debug)]
pub struct BudgetTracker {
    budget: Budget,
    evaluations: u64,
    cost: f64,
    started: Instant,
}

impl BudgetTracker {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            evaluations: 0,
            cost: 0.0,
            started: Instant::now(),
        }
    }

    /// Record one completed runner invocation and its cost
    pub fn record(&mut self, cost: f64) {
        self.evaluations += 1;
        self.cost += cost;
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Err with [`OptimizerError::BudgetExceeded`] once any limit trips
    ///
    /// Consulted before each new candidate is proposed, so an in-flight
    /// evaluation always finishes and is recorded.
    pub fn check(&self) -> Result<()> {
        match self.exceeded() {
            Some(reason) => Err(OptimizerError::BudgetExceeded(reason)),
            None => Ok(()),
        }
    }

    /// Which limit has tripped, if any
    pub fn exceeded(&self) -> Option<String> {
        if let Some(max) = self.budget.max_evaluations {
            if self.evaluations >= max {
                return Some(format!("evaluation limit reached ({max})"));
            }
        }
        if let Some(max) = self.budget.max_cost {
            if self.cost >= max {
                return Some(format!(
                    "cost limit reached ({:.4} >= {:.4})",
                    self.cost, max
                ));
            }
        }
        if let Some(max) = self.budget.deadline {
            let elapsed = self.started.elapsed();
            if elapsed >= max {
                return Some(format!("time limit reached ({elapsed:?})"));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_budget_never_trips() {
        let mut tracker = BudgetTracker::new(Budget::unlimited());
        for _ in 0..1000 {
            tracker.record(10.0);
        }
        assert!(tracker.exceeded().is_none());
    }

    #[test]
    fn test_evaluation_limit_trips_at_count() {
        let mut tracker = BudgetTracker::new(Budget::unlimited().with_max_evaluations(3));
        tracker.record(0.0);
        tracker.record(0.0);
        assert!(tracker.exceeded().is_none());
        tracker.record(0.0);
        assert!(tracker.exceeded().is_some());
    }

    #[test]
    fn test_cost_limit_trips_on_cumulative_spend() {
        let mut tracker = BudgetTracker::new(Budget::unlimited().with_max_cost(1.0));
        tracker.record(0.4);
        tracker.record(0.4);
        assert!(tracker.exceeded().is_none());
        tracker.record(0.4);
        assert!(tracker.exceeded().unwrap().contains("cost limit"));
        assert!(matches!(
            tracker.check(),
            Err(OptimizerError::BudgetExceeded(_))
        ));
        assert_eq!(tracker.evaluations(), 3);
    }

    #[test]
    fn test_elapsed_limit() {
        let tracker = BudgetTracker::new(Budget::unlimited().with_deadline(Duration::ZERO));
        assert!(tracker.exceeded().unwrap().contains("time limit"));
    }

    #[test]
    fn test_validate_rejects_degenerate_limits() {
        assert!(Budget::unlimited().with_max_evaluations(0).validate().is_err());
        assert!(Budget::unlimited().with_max_cost(-1.0).validate().is_err());
        assert!(Budget::unlimited().with_max_cost(f64::NAN).validate().is_err());
        assert!(Budget::unlimited().with_max_evaluations(5).validate().is_ok());
    }
}

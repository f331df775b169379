//! Pareto frontier over accuracy, cost, and latency
//!
//! A parameter assignment's aggregated run becomes a `ParetoPoint`; the
//! frontier keeps every point not dominated by another. Mutually
//! non-dominated near-duplicates are kept: deduplicating them could mask
//! real coverage differences caused by sampling noise.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use pipeline_optimizer_types::ParameterAssignment;

/// One evaluated parameter assignment on the objective axes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParetoPoint {
    /// Runner invocation that produced this point
    pub run_id: Uuid,
    /// The assignment that was evaluated
    pub assignment: ParameterAssignment,
    /// Aggregated accuracy (higher is better) [0, 1]
    pub accuracy: f64,
    /// Aggregated cost in dollars (lower is better)
    pub cost: f64,
    /// Mean record latency in milliseconds (lower is better)
    pub latency_ms: f64,
    /// Records the accuracy was computed over
    pub scored: u64,
    /// Records in the dataset
    pub records: u64,
}

impl ParetoPoint {
    /// Check whether this point Pareto-dominates another
    ///
    /// A dominates B iff A is at least as good on every axis and strictly
    /// better on at least one.
    pub fn dominates(&self, other: &ParetoPoint) -> bool {
        let at_least_as_good = self.accuracy >= other.accuracy
            && self.cost <= other.cost
            && self.latency_ms <= other.latency_ms;

        let strictly_better = self.accuracy > other.accuracy
            || self.cost < other.cost
            || self.latency_ms < other.latency_ms;

        at_least_as_good && strictly_better
    }

    /// Whether another point sits within epsilon on every axis
    pub fn near(&self, other: &ParetoPoint, epsilon: f64) -> bool {
        (self.accuracy - other.accuracy).abs() <= epsilon
            && (self.cost - other.cost).abs() <= epsilon
            && (self.latency_ms - other.latency_ms).abs() <= epsilon
    }

    /// Composite score for scalarized reporting
    pub fn composite_score(&self, weights: &ObjectiveWeights) -> f64 {
        let normalized_cost = if weights.max_cost > 0.0 {
            (1.0 - (self.cost / weights.max_cost).min(1.0)).max(0.0)
        } else {
            1.0
        };

        let normalized_latency = if weights.max_latency_ms > 0.0 {
            (1.0 - (self.latency_ms / weights.max_latency_ms).min(1.0)).max(0.0)
        } else {
            1.0
        };

        weights.accuracy * self.accuracy
            + weights.cost * normalized_cost
            + weights.latency * normalized_latency
    }
}

/// Weights for objective scalarization
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub accuracy: f64,
    pub cost: f64,
    pub latency: f64,
    /// Maximum acceptable cost, used for normalization
    pub max_cost: f64,
    /// Maximum acceptable latency, used for normalization
    pub max_latency_ms: f64,
}

impl ObjectiveWeights {
    /// Create weights, normalized to sum to 1
    pub fn new(accuracy: f64, cost: f64, latency: f64, max_cost: f64, max_latency_ms: f64) -> Self {
        let total = accuracy + cost + latency;
        Self {
            accuracy: accuracy / total,
            cost: cost / total,
            latency: latency / total,
            max_cost,
            max_latency_ms,
        }
    }

    /// Balanced weights (50% accuracy, 30% cost, 20% latency)
    pub fn balanced(max_cost: f64, max_latency_ms: f64) -> Self {
        Self::new(0.5, 0.3, 0.2, max_cost, max_latency_ms)
    }

    /// Accuracy-focused weights
    pub fn accuracy_focused(max_cost: f64, max_latency_ms: f64) -> Self {
        Self::new(0.7, 0.2, 0.1, max_cost, max_latency_ms)
    }

    /// Cost-focused weights
    pub fn cost_focused(max_cost: f64, max_latency_ms: f64) -> Self {
        Self::new(0.3, 0.6, 0.1, max_cost, max_latency_ms)
    }
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self::balanced(1.0, 5000.0)
    }
}

/// Outcome of inserting a point into the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The point joined the frontier, evicting `evicted` dominated points
    Added { evicted: usize },
    /// An existing point dominates the candidate; frontier unchanged
    Dominated,
}

/// Incrementally maintained set of non-dominated points
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParetoFrontier {
    points: Vec<ParetoPoint>,
    /// Near-duplicate classification radius; informational only, never
    /// used to drop points
    epsilon: f64,
}

impl ParetoFrontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        Self {
            points: Vec::new(),
            epsilon,
        }
    }

    /// Insert a point, keeping the frontier non-dominated
    ///
    /// The point is rejected if an existing point dominates it; on
    /// insertion, every existing point it dominates is evicted.
    pub fn insert(&mut self, point: ParetoPoint) -> InsertOutcome {
        if self.points.iter().any(|existing| existing.dominates(&point)) {
            return InsertOutcome::Dominated;
        }

        let before = self.points.len();
        self.points.retain(|existing| !point.dominates(existing));
        let evicted = before - self.points.len();

        self.points.push(point);
        debug_assert!(self.is_non_dominated());

        InsertOutcome::Added { evicted }
    }

    pub fn points(&self) -> &[ParetoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Pairs of mutually non-dominated points within epsilon on every
    /// axis; kept on the frontier by design
    pub fn near_duplicates(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..self.points.len() {
            for j in (i + 1)..self.points.len() {
                if self.points[i].near(&self.points[j], self.epsilon) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Verify no point dominates another
    pub fn is_non_dominated(&self) -> bool {
        for a in &self.points {
            for b in &self.points {
                if !std::ptr::eq(a, b) && a.dominates(b) {
                    return false;
                }
            }
        }
        true
    }

    /// Scalarize the frontier and pick the best point for the given
    /// weights
    pub fn select_best(&self, weights: &ObjectiveWeights) -> Option<&ParetoPoint> {
        self.points.iter().max_by(|a, b| {
            a.composite_score(weights)
                .partial_cmp(&b.composite_score(weights))
                .unwrap_or(Ordering::Equal)
        })
    }
}

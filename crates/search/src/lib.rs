//! Parameter sweep and multi-objective optimization
//!
//! This crate explores the parameter space of a pipeline: candidate
//! assignments come from a pluggable generation strategy, each candidate
//! is evaluated by a dataset runner invocation, and the results feed an
//! accuracy/cost/latency Pareto frontier returned to the caller.

pub mod budget;
pub mod candidates;
pub mod optimizer;
pub mod pareto;

pub use budget::{Budget, BudgetTracker};
pub use candidates::{CandidateStrategy, GridEnumerator, RandomSampler, SuccessiveHalving};
pub use optimizer::{OptimizeConfig, OptimizeReport, Optimizer, Termination};
pub use pareto::{InsertOutcome, ObjectiveWeights, ParetoFrontier, ParetoPoint};

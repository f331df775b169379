//! Dataset runner for the pipeline optimizer
//!
//! This crate provides the execution half of the optimizer: the
//! step/pipeline abstraction, the evaluator interface, dataset and cost
//! model seams, and the concurrent dataset runner that executes a
//! pipeline over every record of a dataset and aggregates telemetry.

pub mod aggregate;
pub mod cancel;
pub mod dataset;
pub mod evaluator;
pub mod pipeline;
pub mod pricing;
pub mod runner;

pub use aggregate::summarize;
pub use cancel::CancelToken;
pub use dataset::{Dataset, InMemoryDataset};
pub use evaluator::{Evaluator, ExactMatch, FnEvaluator};
pub use pipeline::{FnStep, Pipeline, PipelineBuilder, RecordContext, Step, StepOutput};
pub use pricing::{CostModel, FreeOfCharge, ModelPrice, PriceTable};
pub use runner::{DatasetRunner, RunnerConfig};

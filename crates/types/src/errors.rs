//! Error types for the pipeline optimizer

use thiserror::Error;

/// Result type alias for optimizer operations
pub type Result<T> = std::result::Result<T, OptimizerError>;

/// Main error type for the optimizer
///
/// Record-level step and evaluator failures are captured as data inside
/// the corresponding `RunResult` and never raised past the dataset runner
/// boundary. Configuration errors surface before any step executes.
#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Step '{step}' failed: {message}")]
    Step { step: String, message: String },

    #[error("Evaluator error: {0}")]
    Evaluator(String),

    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Run canceled")]
    Canceled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OptimizerError {
    /// Build a step failure from an opaque computation error
    pub fn step(step: impl Into<String>, source: &anyhow::Error) -> Self {
        Self::Step {
            step: step.into(),
            message: format!("{source:#}"),
        }
    }
}

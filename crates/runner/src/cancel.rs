//! Cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pipeline_optimizer_types::{OptimizerError, Result};

/// Cheap clonable cancellation handle
///
/// Cancellation is cooperative: records already completed keep their
/// results, in-flight records are allowed to finish, and records not yet
/// started are marked canceled by the runner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every clone of this token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Err with [`OptimizerError::Canceled`] once cancellation is signaled
    ///
    /// For fallible paths that stop at the next checkpoint; the runner
    /// catches the error and records the remaining records as canceled.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(OptimizerError::Canceled);
        }
        Ok(())
    }
}

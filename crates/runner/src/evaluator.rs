//! Evaluator interface
//!
//! An evaluator scores a pipeline's output against a record's ground
//! truth. Evaluators are pure functions with no side effects and must be
//! deterministic given identical inputs. A record without ground truth
//! yields `ScoreResult::Undefined` and is excluded from aggregate
//! accuracy rather than counted as zero.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline_optimizer_types::{OptimizerError, Result, ScoreResult};

/// Scores an output mapping against ground truth
pub trait Evaluator: Send + Sync {
    /// Score one record's output
    ///
    /// An `Err` is treated by the runner as an undefined score for that
    /// record, never a run-level failure.
    fn score(
        &self,
        output: &BTreeMap<String, serde_json::Value>,
        ground_truth: &BTreeMap<String, serde_json::Value>,
    ) -> Result<ScoreResult>;
}

/// Evaluator backed by a plain closure
///
/// Author-supplied closures report failures as opaque `anyhow` errors,
/// the same contract as step computations.
pub struct FnEvaluator {
    #[allow(clippy::type_complexity)]
    func: Arc<
        dyn Fn(
                &BTreeMap<String, serde_json::Value>,
                &BTreeMap<String, serde_json::Value>,
            ) -> anyhow::Result<ScoreResult>
            + Send
            + Sync,
    >,
}

impl FnEvaluator {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(
                &BTreeMap<String, serde_json::Value>,
                &BTreeMap<String, serde_json::Value>,
            ) -> anyhow::Result<ScoreResult>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

impl Evaluator for FnEvaluator {
    fn score(
        &self,
        output: &BTreeMap<String, serde_json::Value>,
        ground_truth: &BTreeMap<String, serde_json::Value>,
    ) -> Result<ScoreResult> {
        Ok((self.func)(output, ground_truth)?)
    }
}

/// Per-field exact comparison against ground truth
///
/// Scores 1.0 per field when the produced value equals the labeled value,
/// 0.0 otherwise, yielding a per-field breakdown. By default every ground
/// truth field is compared; a subset can be selected.
#[derive(Debug, Clone, Default)]
pub struct ExactMatch {
    fields: Option<Vec<String>>,
}

impl ExactMatch {
    /// Compare every ground truth field
    pub fn all_fields() -> Self {
        Self::default()
    }

    /// Compare only the named fields
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: Some(fields.into_iter().map(Into::into).collect()),
        }
    }
}

impl Evaluator for ExactMatch {
    fn score(
        &self,
        output: &BTreeMap<String, serde_json::Value>,
        ground_truth: &BTreeMap<String, serde_json::Value>,
    ) -> Result<ScoreResult> {
        let mut scores = BTreeMap::new();

        match &self.fields {
            Some(fields) => {
                for field in fields {
                    let expected = ground_truth.get(field).ok_or_else(|| {
                        OptimizerError::Evaluator(format!(
                            "ground truth is missing field '{field}'"
                        ))
                    })?;
                    let matched = output.get(field) == Some(expected);
                    scores.insert(field.clone(), if matched { 1.0 } else { 0.0 });
                }
            }
            None => {
                for (field, expected) in ground_truth {
                    let matched = output.get(field) == Some(expected);
                    scores.insert(field.clone(), if matched { 1.0 } else { 0.0 });
                }
            }
        }

        if scores.is_empty() {
            return Ok(ScoreResult::Undefined);
        }

        Ok(ScoreResult::PerField(scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_exact_match_per_field() {
        let output = map(&[("label", json!("cat")), ("size", json!("small"))]);
        let truth = map(&[("label", json!("cat")), ("size", json!("large"))]);

        let score = ExactMatch::all_fields().score(&output, &truth).unwrap();
        match &score {
            ScoreResult::PerField(fields) => {
                assert_eq!(fields["label"], 1.0);
                assert_eq!(fields["size"], 0.0);
            }
            other => panic!("unexpected score: {other:?}"),
        }
        assert_eq!(score.scalar(), Some(0.5));
    }

    #[test]
    fn test_exact_match_selected_fields() {
        let output = map(&[("label", json!("cat")), ("size", json!("small"))]);
        let truth = map(&[("label", json!("cat")), ("size", json!("large"))]);

        let score = ExactMatch::fields(["label"]).score(&output, &truth).unwrap();
        assert_eq!(score.scalar(), Some(1.0));
    }

    #[test]
    fn test_exact_match_missing_truth_field_errors() {
        let output = map(&[("label", json!("cat"))]);
        let truth = map(&[]);

        let err = ExactMatch::fields(["label"])
            .score(&output, &truth)
            .unwrap_err();
        assert!(matches!(err, OptimizerError::Evaluator(_)));
    }

    #[test]
    fn test_exact_match_empty_truth_is_undefined() {
        let output = map(&[("label", json!("cat"))]);
        let score = ExactMatch::all_fields().score(&output, &map(&[])).unwrap();
        assert!(!score.is_defined());
    }

    #[test]
    fn test_fn_evaluator_determinism() {
        let evaluator = FnEvaluator::new(|output, truth| {
            Ok(ScoreResult::passed(output.get("label") == truth.get("label")))
        });

        let output = map(&[("label", json!("cat"))]);
        let truth = map(&[("label", json!("cat"))]);

        let first = evaluator.score(&output, &truth).unwrap();
        let second = evaluator.score(&output, &truth).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.scalar(), Some(1.0));
    }

    #[test]
    fn test_fn_evaluator_failure_surfaces_as_opaque_error() {
        let evaluator = FnEvaluator::new(|_output, truth| {
            let expected = truth
                .get("label")
                .ok_or_else(|| anyhow::anyhow!("truth has no label"))?;
            Ok(ScoreResult::passed(expected == &json!("cat")))
        });

        let err = evaluator.score(&map(&[]), &map(&[])).unwrap_err();
        assert!(matches!(err, OptimizerError::Other(_)));
        assert!(err.to_string().contains("truth has no label"));
    }
}

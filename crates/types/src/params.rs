//! Parameter schemas and assignments
//!
//! A `StepSpec` declares the tunable parameters of one pipeline step and
//! the fields it consumes and produces. A `ParameterAssignment` pins every
//! declared parameter of every step to one concrete value; it is validated
//! eagerly against the specs before any dataset execution begins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{OptimizerError, Result};

/// One concrete parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// String value, if this is a string parameter
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, widening integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Allowed value set for one declared parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamDomain {
    /// An explicit finite value set
    Discrete(Vec<ParamValue>),
    /// A continuous range sampled as `steps` evenly spaced values
    Range { min: f64, max: f64, steps: usize },
}

impl ParamDomain {
    /// Convenience constructor for a discrete string domain
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Discrete(
            values
                .into_iter()
                .map(|s| ParamValue::Str(s.into()))
                .collect(),
        )
    }

    /// Number of values this domain enumerates to
    pub fn cardinality(&self) -> usize {
        match self {
            Self::Discrete(values) => values.len(),
            Self::Range { steps, .. } => *steps,
        }
    }

    /// Materialize the domain's values
    ///
    /// Ranges are expanded to evenly spaced samples including both
    /// endpoints.
    pub fn values(&self) -> Vec<ParamValue> {
        match self {
            Self::Discrete(values) => values.clone(),
            Self::Range { min, max, steps } => linspace(*min, *max, *steps)
                .into_iter()
                .map(ParamValue::Float)
                .collect(),
        }
    }

    /// Whether the given value is a member of this domain
    pub fn contains(&self, value: &ParamValue) -> bool {
        match self {
            Self::Discrete(values) => values.contains(value),
            Self::Range { min, max, .. } => value
                .as_f64()
                .map(|v| v >= *min && v <= *max)
                .unwrap_or(false),
        }
    }
}

/// Generate linearly spaced values
fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    if num == 0 {
        return vec![];
    }
    if num == 1 {
        return vec![start];
    }

    let step = (end - start) / (num - 1) as f64;
    (0..num).map(|i| start + i as f64 * step).collect()
}

/// Declared schema of one pipeline step
///
/// Immutable once registered with a pipeline: the step's name, its
/// parameter grid, and its computation contract (input fields required,
/// output fields produced).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Step name, unique within a pipeline
    pub name: String,
    /// Parameter name to allowed values
    pub params: BTreeMap<String, ParamDomain>,
    /// Input fields the computation reads
    pub requires: Vec<String>,
    /// Output fields the computation must produce
    pub produces: Vec<String>,
}

impl StepSpec {
    /// Create a spec with no parameters and no declared fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
            requires: Vec::new(),
            produces: Vec::new(),
        }
    }

    /// Declare a tunable parameter
    pub fn with_param(mut self, name: impl Into<String>, domain: ParamDomain) -> Self {
        self.params.insert(name.into(), domain);
        self
    }

    /// Declare required input fields
    pub fn with_requires<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Declare produced output fields
    pub fn with_produces<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.produces = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Total number of assignments this step's grid enumerates to
    pub fn grid_size(&self) -> usize {
        self.params.values().map(ParamDomain::cardinality).product()
    }
}

/// Concrete values for one step's parameters
pub type StepAssignment = BTreeMap<String, ParamValue>;

/// A concrete choice of value for every tunable parameter across a
/// pipeline's steps
///
/// Ordered maps give every assignment a canonical serialized form, used
/// as its identity by the frontier bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterAssignment {
    /// Step name to that step's parameter values
    pub steps: BTreeMap<String, StepAssignment>,
}

impl ParameterAssignment {
    /// An assignment with no values (valid for parameterless pipelines)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set one parameter value
    pub fn set(
        mut self,
        step: impl Into<String>,
        param: impl Into<String>,
        value: impl Into<ParamValue>,
    ) -> Self {
        self.steps
            .entry(step.into())
            .or_default()
            .insert(param.into(), value.into());
        self
    }

    /// Look up one parameter value
    pub fn get(&self, step: &str, param: &str) -> Option<&ParamValue> {
        self.steps.get(step).and_then(|s| s.get(param))
    }

    /// Values for one step (empty map if the step declares no parameters)
    pub fn for_step(&self, step: &str) -> StepAssignment {
        self.steps.get(step).cloned().unwrap_or_default()
    }

    /// Canonical identity string for frontier bookkeeping
    pub fn key(&self) -> String {
        // BTreeMap ordering makes this canonical
        serde_json::to_string(&self.steps).unwrap_or_default()
    }

    /// Validate this assignment against the declared step specs
    ///
    /// Every declared parameter of every step must be supplied exactly
    /// once with a value inside its domain; assignments for unknown steps
    /// or undeclared parameters are rejected. Detected before any dataset
    /// execution begins.
    pub fn validate_against(&self, specs: &[StepSpec]) -> Result<()> {
        for spec in specs {
            let assigned = self.steps.get(&spec.name);

            for (param, domain) in &spec.params {
                let value = assigned.and_then(|a| a.get(param)).ok_or_else(|| {
                    OptimizerError::Configuration(format!(
                        "missing value for parameter '{param}' of step '{}'",
                        spec.name
                    ))
                })?;

                if !domain.contains(value) {
                    return Err(OptimizerError::Configuration(format!(
                        "value '{value}' for parameter '{param}' of step '{}' is outside its declared domain",
                        spec.name
                    )));
                }
            }

            if let Some(assigned) = assigned {
                for param in assigned.keys() {
                    if !spec.params.contains_key(param) {
                        return Err(OptimizerError::Configuration(format!(
                            "parameter '{param}' is not declared by step '{}'",
                            spec.name
                        )));
                    }
                }
            }
        }

        for step in self.steps.keys() {
            if !specs.iter().any(|s| &s.name == step) {
                return Err(OptimizerError::Configuration(format!(
                    "assignment references unknown step '{step}'"
                )));
            }
        }

        Ok(())
    }
}

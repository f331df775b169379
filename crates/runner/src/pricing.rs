//! Cost models
//!
//! The monetary cost of a step is derived from its token usage through a
//! pluggable cost model; the default is a price-per-1k-token table keyed
//! by model name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Derives monetary cost from token usage
pub trait CostModel: Send + Sync {
    /// Cost in dollars for one call to `model`
    fn cost(&self, model: &str, tokens_in: u64, tokens_out: u64) -> f64;
}

/// Per-1k-token prices for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Price-per-token table keyed by model name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceTable {
    prices: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model's prices
    pub fn with_model(
        mut self,
        model: impl Into<String>,
        input_per_1k: f64,
        output_per_1k: f64,
    ) -> Self {
        self.prices.insert(
            model.into(),
            ModelPrice {
                input_per_1k,
                output_per_1k,
            },
        );
        self
    }

    pub fn price(&self, model: &str) -> Option<&ModelPrice> {
        self.prices.get(model)
    }
}

impl CostModel for PriceTable {
    fn cost(&self, model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
        match self.prices.get(model) {
            Some(price) => {
                (tokens_in as f64 / 1000.0) * price.input_per_1k
                    + (tokens_out as f64 / 1000.0) * price.output_per_1k
            }
            None => {
                warn!(model = model, "no price registered for model, assuming zero cost");
                0.0
            }
        }
    }
}

/// Cost model that charges nothing; useful for deterministic tests and
/// local steps
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeOfCharge;

impl CostModel for FreeOfCharge {
    fn cost(&self, _model: &str, _tokens_in: u64, _tokens_out: u64) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cost() {
        let table = PriceTable::new().with_model("gpt-4", 0.003, 0.015);
        let cost = table.cost("gpt-4", 1000, 500);
        let expected = (1000.0 / 1000.0) * 0.003 + (500.0 / 1000.0) * 0.015;
        assert!((cost - expected).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_is_free() {
        let table = PriceTable::new();
        assert_eq!(table.cost("unknown", 1000, 1000), 0.0);
    }

    #[test]
    fn test_free_of_charge() {
        assert_eq!(FreeOfCharge.cost("anything", 1_000_000, 1_000_000), 0.0);
    }
}

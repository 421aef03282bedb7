//! Per-model pricing and run-level cost accounting.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use super::Usage;

/// USD rates per 1k tokens for one model.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn cost(&self, usage: Usage) -> f64 {
        (usage.input as f64 / 1000.0) * self.input_per_1k
            + (usage.output as f64 / 1000.0) * self.output_per_1k
    }
}

/// Read-only provider/model pricing table, loaded once per process.
#[derive(Debug, Clone)]
pub struct PricingTable {
    rates: HashMap<(String, String), ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        let mut rates = HashMap::new();
        let mut add = |provider: &str, model: &str, input: f64, output: f64| {
            rates.insert(
                (provider.to_string(), model.to_string()),
                ModelPricing {
                    input_per_1k: input,
                    output_per_1k: output,
                },
            );
        };

        add("openai", "gpt-4o", 0.0025, 0.01);
        add("openai", "gpt-4o-mini", 0.00015, 0.0006);
        add("gemini", "gemini-2.5-flash", 0.0003, 0.0025);
        add("gemini", "gemini-2.5-pro", 0.00125, 0.01);

        Self { rates }
    }
}

impl PricingTable {
    /// Look up pricing; unknown models cost zero rather than guessing.
    pub fn pricing(&self, provider: &str, model: &str) -> ModelPricing {
        self.rates
            .get(&(provider.to_string(), model.to_string()))
            .copied()
            .unwrap_or(ModelPricing {
                input_per_1k: 0.0,
                output_per_1k: 0.0,
            })
    }

    /// Add or replace a rate.
    pub fn set(&mut self, provider: &str, model: &str, input_per_1k: f64, output_per_1k: f64) {
        self.rates.insert(
            (provider.to_string(), model.to_string()),
            ModelPricing {
                input_per_1k,
                output_per_1k,
            },
        );
    }
}

/// Accumulates spend and attempted providers across one run.
#[derive(Debug, Default)]
pub struct CostTracker {
    total_usd: Mutex<f64>,
    providers: Mutex<BTreeSet<String>>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call's cost.
    pub fn record(&self, provider: &str, cost_usd: f64) {
        *self.total_usd.lock().unwrap() += cost_usd;
        self.providers.lock().unwrap().insert(provider.to_string());
    }

    /// Record an attempt that produced no usage (failed call).
    pub fn record_attempt(&self, provider: &str) {
        self.providers.lock().unwrap().insert(provider.to_string());
    }

    pub fn total_usd(&self) -> f64 {
        *self.total_usd.lock().unwrap()
    }

    /// Providers that served or were attempted, sorted.
    pub fn providers_used(&self) -> Vec<String> {
        self.providers.lock().unwrap().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_calculation() {
        let table = PricingTable::default();
        let pricing = table.pricing("openai", "gpt-4o");
        let usage = Usage {
            input: 10_000,
            output: 1_000,
            total: 11_000,
        };
        let cost = pricing.cost(usage);
        // 10 * 0.0025 + 1 * 0.01
        assert!((cost - 0.035).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_costs_zero() {
        let table = PricingTable::default();
        let pricing = table.pricing("openai", "gpt-99");
        assert_eq!(
            pricing.cost(Usage {
                input: 1000,
                output: 1000,
                total: 2000
            }),
            0.0
        );
    }

    #[test]
    fn test_tracker_accumulates() {
        let tracker = CostTracker::new();
        tracker.record("openai", 0.02);
        tracker.record("gemini", 0.01);
        tracker.record_attempt("openai");

        assert!((tracker.total_usd() - 0.03).abs() < 1e-9);
        assert_eq!(tracker.providers_used(), vec!["gemini", "openai"]);
    }
}

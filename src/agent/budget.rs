//! Token accounting, cost estimation and the early-termination threshold.

use crate::models::UsageMetrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Price of a model in USD per 1,000 tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl ModelRates {
    pub const fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Resolve rates for a model: explicit overrides first, then the built-in table.
    pub fn lookup(model: &str, overrides: &HashMap<String, ModelRates>) -> Self {
        if let Some(rates) = overrides.get(model) {
            return *rates;
        }

        match builtin_rates(model) {
            Some(rates) => rates,
            None => {
                warn!("No pricing known for model {}; cost will be reported as 0", model);
                Self::default()
            }
        }
    }
}

/// Built-in rates keyed by model family.
///
/// More specific families must come before their prefixes ("gpt-4o-mini"
/// before "gpt-4o").
fn builtin_rates(model: &str) -> Option<ModelRates> {
    let normalized = model.trim().to_lowercase();
    let model = normalized.rsplit('/').next().unwrap_or(normalized.as_str());

    const TABLE: &[(&str, ModelRates)] = &[
        ("gpt-4o-mini", ModelRates::new(0.00015, 0.0006)),
        ("gpt-4o", ModelRates::new(0.0025, 0.01)),
        ("gpt-4.1-nano", ModelRates::new(0.0001, 0.0004)),
        ("gpt-4.1-mini", ModelRates::new(0.0004, 0.0016)),
        ("gpt-4.1", ModelRates::new(0.002, 0.008)),
        ("o3-mini", ModelRates::new(0.0011, 0.0044)),
        ("o4-mini", ModelRates::new(0.0011, 0.0044)),
        ("claude-3-5-haiku", ModelRates::new(0.0008, 0.004)),
        ("claude-haiku", ModelRates::new(0.0008, 0.004)),
        ("claude-3-5-sonnet", ModelRates::new(0.003, 0.015)),
        ("claude-sonnet", ModelRates::new(0.003, 0.015)),
    ];

    TABLE
        .iter()
        .find(|(family, _)| model.starts_with(family))
        .map(|(_, rates)| *rates)
}

/// Cumulative usage for one run.
///
/// Totals only grow; the round counter starts at 0 and is advanced by the
/// engine once per round.
#[derive(Debug, Clone)]
pub struct BudgetTracker {
    token_budget: u64,
    force_threshold_ratio: f64,
    max_rounds: u32,
    rates: ModelRates,
    prompt_tokens: u64,
    completion_tokens: u64,
    rounds: u32,
}

impl BudgetTracker {
    pub fn new(token_budget: u64, force_threshold_ratio: f64, max_rounds: u32, rates: ModelRates) -> Self {
        Self {
            token_budget,
            force_threshold_ratio,
            max_rounds,
            rates,
            prompt_tokens: 0,
            completion_tokens: 0,
            rounds: 0,
        }
    }

    /// Add one response's token counts to the running totals.
    pub fn record(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(prompt_tokens);
        self.completion_tokens = self.completion_tokens.saturating_add(completion_tokens);
    }

    pub fn increment_round(&mut self) {
        self.rounds += 1;
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }

    /// Tokens used beyond `token_budget * force_threshold_ratio`.
    pub fn is_over_threshold(&self) -> bool {
        self.total_tokens() as f64 > self.token_budget as f64 * self.force_threshold_ratio
    }

    pub fn rounds_exhausted(&self) -> bool {
        self.rounds >= self.max_rounds
    }

    pub fn estimated_cost(&self) -> f64 {
        (self.prompt_tokens as f64 / 1000.0) * self.rates.input_per_1k
            + (self.completion_tokens as f64 / 1000.0) * self.rates.output_per_1k
    }

    pub fn usage(&self) -> UsageMetrics {
        UsageMetrics {
            total_tokens: self.total_tokens(),
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            estimated_cost: self.estimated_cost(),
            rounds: self.rounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_strictly_greater() {
        let mut tracker = BudgetTracker::new(1000, 0.8, 10, ModelRates::default());
        tracker.record(500, 300);
        assert_eq!(tracker.total_tokens(), 800);
        assert!(!tracker.is_over_threshold());

        tracker.record(1, 0);
        assert!(tracker.is_over_threshold());
    }

    #[test]
    fn test_cost_uses_cumulative_totals() {
        let mut tracker = BudgetTracker::new(100_000, 1.0, 10, ModelRates::new(0.01, 0.03));
        tracker.record(1000, 500);
        tracker.record(1000, 500);

        let usage = tracker.usage();
        assert_eq!(usage.prompt_tokens, 2000);
        assert_eq!(usage.completion_tokens, 1000);
        assert_eq!(usage.total_tokens, 3000);
        assert!((usage.estimated_cost - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_rounds_counter() {
        let mut tracker = BudgetTracker::new(1000, 0.8, 2, ModelRates::default());
        assert_eq!(tracker.rounds(), 0);
        assert!(!tracker.rounds_exhausted());
        tracker.increment_round();
        tracker.increment_round();
        assert_eq!(tracker.usage().rounds, 2);
        assert!(tracker.rounds_exhausted());
    }

    #[test]
    fn test_rates_lookup_prefers_override() {
        let mut overrides = HashMap::new();
        overrides.insert("gpt-4o".to_string(), ModelRates::new(1.0, 2.0));
        assert_eq!(ModelRates::lookup("gpt-4o", &overrides), ModelRates::new(1.0, 2.0));
    }

    #[test]
    fn test_builtin_rates_match_most_specific_family() {
        let none = HashMap::new();
        assert_eq!(
            ModelRates::lookup("gpt-4o-mini-2024-07-18", &none),
            ModelRates::new(0.00015, 0.0006)
        );
        assert_eq!(
            ModelRates::lookup("openai/gpt-4o", &none),
            ModelRates::new(0.0025, 0.01)
        );
        assert_eq!(ModelRates::lookup("my-local-model", &none), ModelRates::default());
    }
}

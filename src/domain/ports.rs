use crate::domain::optimization::parameter_space::ParameterAssignment;
use crate::domain::performance::BacktestResult;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed historical context a candidate is evaluated against.
///
/// Part of the cache key, so anything that changes the backtest outcome
/// (period, symbol, simulation seed) belongs here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub symbol: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl Scenario {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    pub fn with_period(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }
}

/// Backtest engine seam: scores one assignment over one scenario.
///
/// Implementations must be deterministic for a given (assignment, scenario)
/// and enforce their own timeout; errors are isolated per candidate.
pub trait FitnessEvaluator: Send + Sync {
    fn evaluate(&self, assignment: &ParameterAssignment, scenario: &Scenario)
    -> Result<BacktestResult>;
}

impl<F> FitnessEvaluator for F
where
    F: Fn(&ParameterAssignment, &Scenario) -> Result<BacktestResult> + Send + Sync,
{
    fn evaluate(
        &self,
        assignment: &ParameterAssignment,
        scenario: &Scenario,
    ) -> Result<BacktestResult> {
        self(assignment, scenario)
    }
}

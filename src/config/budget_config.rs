//! Budget, convergence and cache settings shared by every algorithm.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Evaluations for sampling searches, iterations or generations otherwise
    pub max_iterations: usize,
    pub max_duration_secs: Option<f64>,
}

impl BudgetConfig {
    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration_secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64)
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            max_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    /// Population strategies stop once score variance drops below this
    pub variance_threshold: f64,
    /// Single-candidate strategies stop after this many iterations without improvement
    pub patience: usize,
    /// Minimum gain that counts as an improvement
    pub epsilon: f64,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            variance_threshold: 1e-8,
            patience: 50,
            epsilon: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

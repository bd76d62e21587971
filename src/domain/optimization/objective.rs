//! Reduction of backtest metrics to scalar or vector fitness.
//!
//! Each metric is first mapped to [0, 1] (higher raw value -> higher
//! normalized value), then flipped for minimized objectives, so every
//! objective score reads "higher is better".

use crate::domain::errors::ConfigurationError;
use crate::domain::performance::{BacktestResult, Metric};
use serde::{Deserialize, Serialize};

/// Score assigned to failed or infeasible candidates; below any valid score
pub const PENALTY_SCORE: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveDefinition {
    pub metric: Metric,
    pub weight: f64,
    pub direction: Direction,
}

impl ObjectiveDefinition {
    pub fn maximize(metric: Metric, weight: f64) -> Self {
        Self {
            metric,
            weight,
            direction: Direction::Maximize,
        }
    }

    pub fn minimize(metric: Metric, weight: f64) -> Self {
        Self {
            metric,
            weight,
            direction: Direction::Minimize,
        }
    }

    /// Objective in the metric's natural sense (drawdown and losses minimized)
    pub fn natural(metric: Metric, weight: f64) -> Self {
        Self {
            metric,
            weight,
            direction: natural_direction(metric),
        }
    }
}

pub fn natural_direction(metric: Metric) -> Direction {
    match metric {
        Metric::MaxDrawdown | Metric::AverageLoss | Metric::MaxConsecutiveLosses => {
            Direction::Minimize
        }
        _ => Direction::Maximize,
    }
}

fn linear(value: f64, lo: f64, hi: f64) -> f64 {
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}

/// Maps an unbounded value onto (0, 1), 0 -> 0.5
fn squash(value: f64) -> f64 {
    0.5 + 0.5 * value / (1.0 + value.abs())
}

/// Maps a non-negative count onto [0, 1), `half` -> 0.5
fn saturating(value: f64, half: f64) -> f64 {
    let v = value.max(0.0);
    v / (v + half)
}

/// Bounded [0, 1] normalization of a raw metric value
pub fn normalize(metric: Metric, value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    match metric {
        Metric::TotalReturn => linear(value, -50.0, 100.0),
        Metric::SharpeRatio => linear(value, -1.0, 3.0),
        Metric::SortinoRatio => linear(value, -1.0, 4.0),
        Metric::CalmarRatio => linear(value, -1.0, 5.0),
        Metric::MaxDrawdown => linear(value, 0.0, 50.0),
        Metric::TradeCount => saturating(value, 50.0),
        Metric::WinRate => linear(value, 0.0, 100.0),
        Metric::ProfitFactor => linear(value, 0.0, 3.0),
        Metric::AverageWin | Metric::AverageLoss => squash(value),
        Metric::MaxConsecutiveWins | Metric::MaxConsecutiveLosses => saturating(value, 10.0),
    }
}

/// Validated objective set with precomputed total weight
#[derive(Debug, Clone)]
pub struct ObjectiveScorer {
    objectives: Vec<ObjectiveDefinition>,
    total_weight: f64,
}

impl ObjectiveScorer {
    pub fn new(objectives: Vec<ObjectiveDefinition>) -> Result<Self, ConfigurationError> {
        if objectives.is_empty() {
            return Err(ConfigurationError::NoObjectives);
        }
        for objective in &objectives {
            if !objective.weight.is_finite() || objective.weight < 0.0 {
                return Err(ConfigurationError::InvalidObjective {
                    metric: objective.metric.to_string(),
                    reason: format!("weight {} must be finite and >= 0", objective.weight),
                });
            }
        }
        let total_weight: f64 = objectives.iter().map(|o| o.weight).sum();
        if total_weight <= 0.0 {
            return Err(ConfigurationError::ZeroObjectiveWeight {
                total: total_weight,
            });
        }
        Ok(Self {
            objectives,
            total_weight,
        })
    }

    pub fn objectives(&self) -> &[ObjectiveDefinition] {
        &self.objectives
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn is_multi_objective(&self) -> bool {
        self.objectives.len() > 1
    }

    pub fn objective_value(objective: &ObjectiveDefinition, metrics: &BacktestResult) -> f64 {
        let normalized = normalize(objective.metric, metrics.value(objective.metric));
        match objective.direction {
            Direction::Maximize => normalized,
            Direction::Minimize => 1.0 - normalized,
        }
    }

    /// Weighted sum of objective values divided by total weight
    pub fn score(&self, metrics: &BacktestResult) -> f64 {
        self.scalarize(&self.score_vector(metrics))
    }

    /// One normalized entry per objective, in objective order
    pub fn score_vector(&self, metrics: &BacktestResult) -> Vec<f64> {
        self.objectives
            .iter()
            .map(|o| Self::objective_value(o, metrics))
            .collect()
    }

    pub fn scalarize(&self, vector: &[f64]) -> f64 {
        let weighted: f64 = self
            .objectives
            .iter()
            .zip(vector)
            .map(|(o, v)| o.weight * v)
            .sum();
        weighted / self.total_weight
    }
}

//! Budget and stagnation bookkeeping shared by every search strategy.

use crate::application::optimization::cancellation::CancellationToken;
use crate::config::ConvergenceConfig;
use crate::domain::optimization::{IterationRecord, RunStatus};
use statrs::statistics::Statistics;
use std::fmt;
use std::time::{Duration, Instant};

/// Which convergence test applies on top of the shared budget checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceMode {
    /// Stop when the variance of population scores falls below the threshold
    Population,
    /// Stop after `patience` iterations without an `epsilon` improvement
    SingleCandidate,
    /// Budget, time and cancellation only
    Sampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    TimeLimit,
    Cancelled,
    VarianceConverged,
    Stagnated,
    TemperatureFloor,
    /// Every point of a finite search space has been evaluated
    SpaceExhausted,
}

impl StopReason {
    pub fn status(&self) -> RunStatus {
        match self {
            StopReason::MaxIterations | StopReason::TimeLimit | StopReason::Cancelled => {
                RunStatus::BudgetExhausted
            }
            StopReason::VarianceConverged
            | StopReason::Stagnated
            | StopReason::TemperatureFloor
            | StopReason::SpaceExhausted => RunStatus::Converged,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::MaxIterations => "iteration budget exhausted",
            StopReason::TimeLimit => "time limit reached",
            StopReason::Cancelled => "cancelled",
            StopReason::VarianceConverged => "population variance below threshold",
            StopReason::Stagnated => "no improvement within patience",
            StopReason::TemperatureFloor => "temperature below floor",
            StopReason::SpaceExhausted => "search space exhausted",
        };
        f.write_str(s)
    }
}

/// Records one entry per iteration and decides when a run stops.
///
/// Stop conditions are only evaluated inside `record_iteration`, which a
/// strategy calls after evaluating candidates, so a run never stops before
/// its first evaluation.
#[derive(Debug)]
pub struct ConvergenceTracker {
    mode: ConvergenceMode,
    max_iterations: usize,
    max_duration: Option<Duration>,
    variance_threshold: f64,
    patience: usize,
    epsilon: f64,
    cancel: CancellationToken,
    started: Instant,
    best: Option<f64>,
    since_improvement: usize,
    history: Vec<IterationRecord>,
    stop_reason: Option<StopReason>,
}

impl ConvergenceTracker {
    pub fn new(
        mode: ConvergenceMode,
        max_iterations: usize,
        convergence: &ConvergenceConfig,
        max_duration: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            mode,
            max_iterations: max_iterations.max(1),
            max_duration,
            variance_threshold: convergence.variance_threshold,
            patience: convergence.patience.max(1),
            epsilon: convergence.epsilon,
            cancel,
            started: Instant::now(),
            best: None,
            since_improvement: 0,
            history: Vec::new(),
            stop_reason: None,
        }
    }

    /// Record an iteration; returns the stop reason once the run should end.
    pub fn record_iteration(
        &mut self,
        best_score: f64,
        population_scores: &[f64],
        evaluations: usize,
    ) -> Option<StopReason> {
        if let Some(reason) = self.stop_reason {
            return Some(reason);
        }

        let (mean, variance) = if population_scores.is_empty() {
            (best_score, 0.0)
        } else {
            (
                population_scores.iter().mean(),
                population_scores.iter().population_variance(),
            )
        };

        match self.best {
            Some(previous) if best_score <= previous + self.epsilon => {
                self.since_improvement += 1;
            }
            _ => {
                self.since_improvement = 0;
            }
        }
        self.best = Some(match self.best {
            Some(previous) => previous.max(best_score),
            None => best_score,
        });

        self.history.push(IterationRecord {
            iteration: self.history.len() + 1,
            best_score,
            mean_score: mean,
            score_variance: variance,
            evaluations,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });

        self.stop_reason = self.check(population_scores.len(), variance);
        self.stop_reason
    }

    fn check(&self, population: usize, variance: f64) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        if self.history.len() >= self.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        if self
            .max_duration
            .is_some_and(|limit| self.started.elapsed() >= limit)
        {
            return Some(StopReason::TimeLimit);
        }
        match self.mode {
            ConvergenceMode::Population
                if population > 1 && variance.is_finite() && variance < self.variance_threshold =>
            {
                Some(StopReason::VarianceConverged)
            }
            ConvergenceMode::SingleCandidate if self.since_improvement >= self.patience => {
                Some(StopReason::Stagnated)
            }
            _ => None,
        }
    }

    /// Mark the run as stopped for a strategy-specific reason
    pub fn finish(&mut self, reason: StopReason) -> StopReason {
        *self.stop_reason.get_or_insert(reason)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<IterationRecord> {
        self.history
    }
}

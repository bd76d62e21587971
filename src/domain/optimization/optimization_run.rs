use crate::domain::optimization::algorithm::Algorithm;
use crate::domain::optimization::candidate::Candidate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    Running,
    Converged,
    BudgetExhausted,
    Failed,
    ConfigurationError,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Converged | RunStatus::BudgetExhausted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Converged => "converged",
            RunStatus::BudgetExhausted => "budget-exhausted",
            RunStatus::Failed => "failed",
            RunStatus::ConfigurationError => "configuration-error",
        }
    }
}

/// Convergence history entry, one per iteration or generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub best_score: f64,
    pub mean_score: f64,
    pub score_variance: f64,
    pub evaluations: usize,
    pub elapsed_ms: u64,
}

/// In-flight state of one optimization run.
///
/// Owned and mutated by the running search strategy only; consumed by the
/// aggregator once the search stops. Never persisted. The convergence
/// history is owned by the run's `ConvergenceTracker`, which records one
/// `IterationRecord` per iteration and hands it to the aggregator.
#[derive(Debug, Clone)]
pub struct OptimizationRun {
    pub run_id: Uuid,
    pub algorithm: Algorithm,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub best: Option<Candidate>,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub infeasible_evaluations: usize,
}

impl OptimizationRun {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            algorithm,
            started_at: Utc::now(),
            status: RunStatus::Running, // Running until the strategy stops
            best: None,
            evaluations: 0,
            failed_evaluations: 0,
            infeasible_evaluations: 0,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(Candidate::fitness_or_penalty)
    }

    /// Keep the candidate if it beats the best seen so far; returns true on improvement
    pub fn offer(&mut self, candidate: &Candidate) -> bool {
        if !candidate.is_evaluated() {
            return false;
        }
        let improved = match &self.best {
            Some(best) => candidate.fitness_or_penalty() > best.fitness_or_penalty(),
            None => true,
        };
        if improved {
            self.best = Some(candidate.clone());
        }
        improved
    }
}

use crate::domain::optimization::algorithm::Algorithm;
use crate::domain::optimization::optimization_run::{IterationRecord, RunStatus};
use crate::domain::optimization::parameter_space::{ParamKey, ParamValue, ParameterAssignment};
use crate::domain::performance::BacktestResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Evaluated assignment as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAssignment {
    pub assignment: ParameterAssignment,
    pub score: f64,
    pub objective_scores: Vec<f64>,
    pub metrics: Option<BacktestResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub key: ParamKey,
    pub from: Option<ParamValue>,
    pub to: ParamValue,
}

/// Before/after view of the original versus the recommended parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterComparison {
    pub original_assignment: ParameterAssignment,
    pub original_score: f64,
    pub optimized_score: f64,
    /// Relative score change in percent; `None` when the original scored 0
    pub improvement_pct: Option<f64>,
    pub original_metrics: Option<BacktestResult>,
    pub optimized_metrics: Option<BacktestResult>,
    /// optimized minus original, per metric name
    pub metric_deltas: BTreeMap<String, f64>,
    pub parameter_changes: Vec<ParameterChange>,
}

/// Final output of one optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub algorithm: Algorithm,
    pub status: RunStatus,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub best: Option<ScoredAssignment>,
    /// Non-dominated set; empty for single-objective runs
    pub pareto_front: Vec<ScoredAssignment>,
    /// Distinct evaluated candidates ranked by score, best first
    pub top_candidates: Vec<ScoredAssignment>,
    pub history: Vec<IterationRecord>,
    pub iterations: usize,
    pub evaluations: usize,
    pub failed_evaluations: usize,
    pub infeasible_evaluations: usize,
    pub cache_hits: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub comparison: Option<ParameterComparison>,
}

impl OptimizationResult {
    /// Result for a run rejected before its first iteration
    pub fn configuration_error(algorithm: Algorithm, reason: String) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            algorithm,
            status: RunStatus::ConfigurationError,
            success: false,
            failure_reason: Some(reason),
            best: None,
            pareto_front: Vec::new(),
            top_candidates: Vec::new(),
            history: Vec::new(),
            iterations: 0,
            evaluations: 0,
            failed_evaluations: 0,
            infeasible_evaluations: 0,
            cache_hits: 0,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
            comparison: None,
        }
    }

    pub fn best_assignment(&self) -> Option<&ParameterAssignment> {
        self.best.as_ref().map(|b| &b.assignment)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.score)
    }
}

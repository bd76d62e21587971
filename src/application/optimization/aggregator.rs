//! Turns a finished search into the `OptimizationResult` handed to callers.

use crate::application::optimization::convergence::StopReason;
use crate::application::optimization::evaluator::CachedEvaluator;
use crate::application::optimization::strategies::SearchContext;
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{
    Candidate, EvaluationState, OptimizationResult, ParameterAssignment, ParameterChange,
    ParameterComparison, ParameterSpace, RunStatus, ScoredAssignment,
    candidate::sort_by_fitness_desc,
};
use crate::domain::performance::Metric;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Relative improvements are undefined below this original score magnitude
const MIN_BASELINE_SCORE: f64 = 1e-12;

pub struct ResultAggregator {
    top_n: usize,
}

impl ResultAggregator {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// Consume the search context once the strategy has stopped
    pub fn aggregate(
        &self,
        ctx: SearchContext<'_>,
        outcome: Result<StopReason, RunFailure>,
        cache_hits: u64,
    ) -> OptimizationResult {
        let (status, failure_reason) = match &outcome {
            Ok(reason) => (reason.status(), None),
            Err(failure) => (RunStatus::Failed, Some(failure.reason.clone())),
        };

        let mut run = ctx.run;
        run.status = status;
        let finished_at = Utc::now();
        let duration_ms = (finished_at - run.started_at).num_milliseconds().max(0) as u64;

        let best = run
            .best
            .as_ref()
            .filter(|c| c.state == EvaluationState::Completed)
            .map(scored);
        let pareto_front: Vec<ScoredAssignment> = ctx.pareto_front.iter().map(scored).collect();
        let top_candidates = self.top_candidates(ctx.archive);
        let iterations = ctx.tracker.iterations();

        OptimizationResult {
            run_id: run.run_id,
            algorithm: run.algorithm,
            status,
            success: status.is_success(),
            failure_reason,
            best,
            pareto_front,
            top_candidates,
            history: ctx.tracker.into_history(),
            iterations,
            evaluations: run.evaluations,
            failed_evaluations: run.failed_evaluations,
            infeasible_evaluations: run.infeasible_evaluations,
            cache_hits,
            started_at: run.started_at,
            finished_at,
            duration_ms,
            comparison: None,
        }
    }

    /// Distinct completed candidates, best first, at most `top_n`
    fn top_candidates(&self, mut archive: Vec<Candidate>) -> Vec<ScoredAssignment> {
        archive.retain(|c| c.state == EvaluationState::Completed);
        sort_by_fitness_desc(&mut archive);

        let mut seen = HashSet::new();
        archive
            .iter()
            .filter(|c| seen.insert(c.assignment.to_string()))
            .take(self.top_n)
            .map(scored)
            .collect()
    }

    /// Before/after view of the caller's original assignment against the winner.
    ///
    /// The original is clamped into the space and scored through the same
    /// evaluator, so it benefits from the cache like any other candidate.
    pub fn compare(
        &self,
        evaluator: &CachedEvaluator,
        space: &ParameterSpace,
        original: &ParameterAssignment,
        best: &ScoredAssignment,
    ) -> ParameterComparison {
        let baseline = evaluator.evaluate_assignment(space, original.clone());
        let original_score = baseline.fitness_or_penalty();
        let optimized_score = best.score;

        let improvement_pct = if original_score.abs() < MIN_BASELINE_SCORE {
            None
        } else {
            Some((optimized_score - original_score) / original_score.abs() * 100.0)
        };

        let mut metric_deltas = BTreeMap::new();
        if let (Some(before), Some(after)) = (&baseline.metrics, &best.metrics) {
            for metric in Metric::ALL {
                metric_deltas.insert(
                    metric.as_str().to_string(),
                    after.value(metric) - before.value(metric),
                );
            }
        }

        let parameter_changes: Vec<ParameterChange> = best
            .assignment
            .iter()
            .filter_map(|(key, to)| {
                let from = baseline.assignment.get(key);
                (from != Some(to)).then(|| ParameterChange {
                    key: key.clone(),
                    from: from.cloned(),
                    to: to.clone(),
                })
            })
            .collect();

        info!(
            "ResultAggregator: Original score {:.4} -> optimized {:.4} ({} parameters changed)",
            original_score,
            optimized_score,
            parameter_changes.len()
        );

        ParameterComparison {
            original_assignment: baseline.assignment,
            original_score,
            optimized_score,
            improvement_pct,
            original_metrics: baseline.metrics,
            optimized_metrics: best.metrics.clone(),
            metric_deltas,
            parameter_changes,
        }
    }
}

fn scored(candidate: &Candidate) -> ScoredAssignment {
    ScoredAssignment {
        assignment: candidate.assignment.clone(),
        score: candidate.fitness_or_penalty(),
        objective_scores: candidate.objective_scores.clone().unwrap_or_default(),
        metrics: candidate.metrics.clone(),
    }
}

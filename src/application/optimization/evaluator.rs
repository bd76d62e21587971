//! Fitness evaluation through the result cache, on a bounded worker pool.
//!
//! Evaluations within a batch are independent and run in parallel; results
//! come back in candidate order. Failures never escape: an evaluator error
//! or panic marks that candidate failed and scores it with the penalty.

use crate::application::optimization::cache::ResultCache;
use crate::domain::optimization::{
    Candidate, EvaluationState, ObjectiveScorer, PENALTY_SCORE, ParameterAssignment,
    ParameterSpace,
};
use crate::domain::performance::BacktestResult;
use crate::domain::ports::{FitnessEvaluator, Scenario};
use crate::infrastructure::observability::OptimizerMetrics;
use anyhow::Result;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

pub struct CachedEvaluator {
    evaluator: Arc<dyn FitnessEvaluator>,
    scenario: Scenario,
    scorer: ObjectiveScorer,
    cache: Option<Arc<ResultCache>>,
    pool: Option<ThreadPool>,
    metrics: Option<OptimizerMetrics>,
}

impl CachedEvaluator {
    pub fn new(
        evaluator: Arc<dyn FitnessEvaluator>,
        scenario: Scenario,
        scorer: ObjectiveScorer,
    ) -> Self {
        Self {
            evaluator,
            scenario,
            scorer,
            cache: None,
            pool: None,
            metrics: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run batches on a dedicated pool of `max_workers` threads
    pub fn with_workers(mut self, max_workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(max_workers.max(1))
            .thread_name(|i| format!("tuner-eval-{}", i))
            .build()?;
        self.pool = Some(pool);
        Ok(self)
    }

    pub fn with_metrics(mut self, metrics: OptimizerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn scorer(&self) -> &ObjectiveScorer {
        &self.scorer
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Score a single assignment on the calling thread
    pub fn evaluate_assignment(
        &self,
        space: &ParameterSpace,
        assignment: ParameterAssignment,
    ) -> Candidate {
        self.score(space, Candidate::new(assignment))
    }

    /// Score every pending candidate; already evaluated ones pass through untouched.
    pub fn evaluate_batch(&self, space: &ParameterSpace, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let run = || {
            candidates
                .into_par_iter()
                .map(|candidate| {
                    if candidate.is_evaluated() {
                        candidate
                    } else {
                        self.score(space, candidate)
                    }
                })
                .collect::<Vec<_>>()
        };
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }

    fn score(&self, space: &ParameterSpace, mut candidate: Candidate) -> Candidate {
        candidate.assignment = space.clamp(&candidate.assignment);

        if !space.is_feasible(&candidate.assignment) {
            self.count("infeasible");
            return penalize(candidate, EvaluationState::Infeasible, self.scorer.len());
        }

        match self.fetch(&candidate.assignment) {
            Ok(metrics) => {
                self.count("ok");
                candidate.fitness = Some(self.scorer.score(&metrics));
                candidate.objective_scores = Some(self.scorer.score_vector(&metrics));
                candidate.metrics = Some(metrics);
                candidate.state = EvaluationState::Completed;
                candidate
            }
            Err(reason) => {
                warn!(
                    "CachedEvaluator: Evaluation failed for {}: {}",
                    candidate.assignment, reason
                );
                self.count("failed");
                penalize(
                    candidate,
                    EvaluationState::Failed { reason },
                    self.scorer.len(),
                )
            }
        }
    }

    /// Cached metrics, or a fresh evaluation that is cached on success
    fn fetch(&self, assignment: &ParameterAssignment) -> Result<BacktestResult, String> {
        let key = self
            .cache
            .as_ref()
            .map(|_| ResultCache::key(assignment, &self.scenario));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            let cached = cache.get(key);
            if let Some(metrics) = &self.metrics {
                metrics.inc_cache_lookup(cached.is_some());
            }
            if let Some(result) = cached {
                return Ok(result);
            }
        }

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.evaluator.evaluate(assignment, &self.scenario)
        }));
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => return Err(format!("{:#}", e)),
            Err(payload) => return Err(panic_message(payload.as_ref())),
        };

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, result.clone());
        }
        Ok(result)
    }

    fn count(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_evaluation(outcome);
        }
    }
}

fn penalize(mut candidate: Candidate, state: EvaluationState, objectives: usize) -> Candidate {
    candidate.fitness = Some(PENALTY_SCORE);
    candidate.objective_scores = Some(vec![PENALTY_SCORE; objectives]);
    candidate.metrics = Some(BacktestResult::penalty());
    candidate.state = state;
    candidate
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("evaluator panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("evaluator panicked: {}", s)
    } else {
        "evaluator panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{
        ObjectiveDefinition, ParamKey, ParamValue, ParameterConstraint, ParameterSpec,
    };
    use crate::domain::performance::Metric;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn space() -> ParameterSpace {
        ParameterSpace::new(vec![
            ParameterSpec::discrete("sma", "fast", 2.0, 20.0, 1.0),
            ParameterSpec::discrete("sma", "slow", 10.0, 60.0, 1.0),
        ])
        .unwrap()
    }

    fn scorer() -> ObjectiveScorer {
        ObjectiveScorer::new(vec![ObjectiveDefinition::maximize(Metric::TotalReturn, 1.0)]).unwrap()
    }

    fn assignment(fast: f64, slow: f64) -> ParameterAssignment {
        ParameterAssignment::new()
            .with(ParamKey::new("sma", "fast"), ParamValue::Number(fast))
            .with(ParamKey::new("sma", "slow"), ParamValue::Number(slow))
    }

    fn returns_fast(a: &ParameterAssignment, _: &Scenario) -> Result<BacktestResult> {
        Ok(BacktestResult {
            total_return_pct: a.number_of("sma", "fast").unwrap_or(0.0),
            ..Default::default()
        })
    }

    #[test]
    fn test_batch_preserves_order_and_scores() {
        let evaluator = CachedEvaluator::new(Arc::new(returns_fast), Scenario::new("t"), scorer())
            .with_workers(2)
            .unwrap();
        let batch = vec![
            Candidate::new(assignment(5.0, 30.0)),
            Candidate::new(assignment(15.0, 30.0)),
            Candidate::new(assignment(10.0, 30.0)),
        ];
        let scored = evaluator.evaluate_batch(&space(), batch);
        let fast: Vec<f64> = scored
            .iter()
            .map(|c| c.assignment.number_of("sma", "fast").unwrap())
            .collect();
        assert_eq!(fast, vec![5.0, 15.0, 10.0]);
        assert!(scored.iter().all(|c| c.state == EvaluationState::Completed));
        assert!(scored[1].fitness_or_penalty() > scored[2].fitness_or_penalty());
    }

    #[test]
    fn test_errors_and_panics_become_penalties() {
        let failing = |a: &ParameterAssignment, _: &Scenario| -> Result<BacktestResult> {
            match a.number_of("sma", "fast") {
                Some(f) if f < 5.0 => anyhow::bail!("backtest timed out"),
                Some(f) if f > 15.0 => panic!("division by zero"),
                _ => Ok(BacktestResult::default()),
            }
        };
        let evaluator = CachedEvaluator::new(Arc::new(failing), Scenario::new("t"), scorer());
        let scored = evaluator.evaluate_batch(
            &space(),
            vec![
                Candidate::new(assignment(3.0, 30.0)),
                Candidate::new(assignment(10.0, 30.0)),
                Candidate::new(assignment(18.0, 30.0)),
            ],
        );

        assert!(scored[0].is_failed());
        assert!(!scored[1].is_failed());
        assert!(scored[2].is_failed());
        assert_eq!(scored[0].fitness, Some(PENALTY_SCORE));
        assert_eq!(scored[0].metrics, Some(BacktestResult::penalty()));
        match &scored[2].state {
            EvaluationState::Failed { reason } => assert!(reason.contains("division by zero")),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_infeasible_skips_evaluator() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting = move |a: &ParameterAssignment, s: &Scenario| {
            counter.fetch_add(1, Ordering::SeqCst);
            returns_fast(a, s)
        };
        let constrained = space()
            .with_constraint(ParameterConstraint::ordered(
                ParamKey::new("sma", "fast"),
                ParamKey::new("sma", "slow"),
                1.0,
            ))
            .unwrap();
        let evaluator = CachedEvaluator::new(Arc::new(counting), Scenario::new("t"), scorer());

        let candidate = evaluator.evaluate_assignment(&constrained, assignment(20.0, 10.0));
        assert_eq!(candidate.state, EvaluationState::Infeasible);
        assert_eq!(candidate.fitness, Some(PENALTY_SCORE));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cache_serves_repeat_evaluations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting = move |a: &ParameterAssignment, s: &Scenario| {
            counter.fetch_add(1, Ordering::SeqCst);
            returns_fast(a, s)
        };
        let cache = Arc::new(ResultCache::new(16));
        let evaluator = CachedEvaluator::new(Arc::new(counting), Scenario::new("t"), scorer())
            .with_cache(cache.clone());

        let first = evaluator.evaluate_assignment(&space(), assignment(7.0, 30.0));
        let second = evaluator.evaluate_assignment(&space(), assignment(7.0, 30.0));
        assert_eq!(first.metrics, second.metrics);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
    }
}

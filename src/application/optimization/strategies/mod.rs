//! Interchangeable search strategies behind one `SearchStrategy` trait.
//!
//! A strategy only proposes candidates and decides when to stop; evaluation,
//! caching, bookkeeping and convergence checks go through `SearchContext`.

pub mod annealing;
pub mod genetic;
pub mod grid;
pub mod guided;
pub mod nsga2;
pub mod operators;
pub mod particle_swarm;
pub mod random;

pub use annealing::{SimulatedAnnealing, acceptance_probability};
pub use genetic::GeneticSearch;
pub use grid::GridSearch;
pub use guided::GuidedSampling;
pub use nsga2::Nsga2Search;
pub use particle_swarm::ParticleSwarm;
pub use random::RandomSearch;

use crate::application::optimization::convergence::{
    ConvergenceMode, ConvergenceTracker, StopReason,
};
use crate::application::optimization::evaluator::CachedEvaluator;
use crate::config::OptimizationConfig;
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{
    Algorithm, Candidate, EvaluationState, OptimizationRun, PENALTY_SCORE, ParameterSpace,
};
use crate::infrastructure::observability::OptimizerMetrics;
use rand::rngs::StdRng;
use tracing::{debug, error};

/// Common contract of every search algorithm.
pub trait SearchStrategy: Send {
    fn algorithm(&self) -> Algorithm;

    fn convergence_mode(&self) -> ConvergenceMode;

    /// Number of tracker iterations (generations, steps or batches) the budget allows
    fn iteration_budget(&self, config: &OptimizationConfig) -> usize;

    /// Run the search until a stop condition; the best candidate lives in `ctx.run`.
    fn optimize(&mut self, ctx: &mut SearchContext<'_>) -> Result<StopReason, RunFailure>;
}

/// Build the strategy for an algorithm. Genetic search with several
/// objectives runs as NSGA-II.
pub fn build_strategy(
    algorithm: Algorithm,
    multi_objective: bool,
    config: &OptimizationConfig,
) -> Box<dyn SearchStrategy> {
    match algorithm {
        Algorithm::Grid => Box::new(GridSearch::new(config.grid.clone())),
        Algorithm::Random => Box::new(RandomSearch::new()),
        Algorithm::Genetic if multi_objective => Box::new(Nsga2Search::new(config.genetic.clone())),
        Algorithm::Genetic => Box::new(GeneticSearch::new(config.genetic.clone())),
        Algorithm::SimulatedAnnealing => {
            Box::new(SimulatedAnnealing::new(config.annealing.clone()))
        }
        Algorithm::ParticleSwarm => Box::new(ParticleSwarm::new(config.swarm.clone())),
        Algorithm::Bayesian => Box::new(GuidedSampling::new(config.guided.clone())),
        Algorithm::Nsga2 => Box::new(Nsga2Search::new(config.genetic.clone())),
    }
}

/// Evaluations allowed to sampling strategies, split into batches
pub(crate) fn sampling_batches(config: &OptimizationConfig) -> usize {
    config
        .budget
        .max_iterations
        .div_ceil(config.batch_size.max(1))
        .max(1)
}

/// Everything a running strategy may touch.
pub struct SearchContext<'a> {
    pub space: &'a ParameterSpace,
    pub config: &'a OptimizationConfig,
    pub evaluator: &'a CachedEvaluator,
    pub rng: StdRng,
    pub run: OptimizationRun,
    pub tracker: ConvergenceTracker,
    /// Every candidate evaluated by this run, in evaluation order
    pub archive: Vec<Candidate>,
    /// Current non-dominated set; only multi-objective strategies fill it
    pub pareto_front: Vec<Candidate>,
    metrics: Option<OptimizerMetrics>,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        space: &'a ParameterSpace,
        config: &'a OptimizationConfig,
        evaluator: &'a CachedEvaluator,
        rng: StdRng,
        run: OptimizationRun,
        tracker: ConvergenceTracker,
    ) -> Self {
        Self {
            space,
            config,
            evaluator,
            rng,
            run,
            tracker,
            archive: Vec::new(),
            pareto_front: Vec::new(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<OptimizerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn objective_count(&self) -> usize {
        self.evaluator.scorer().len()
    }

    /// Evaluate a batch and fold it into the run.
    ///
    /// Fails the run when every candidate of a multi-candidate batch fails,
    /// or when the very first evaluation fails.
    pub fn evaluate(&mut self, candidates: Vec<Candidate>) -> Result<Vec<Candidate>, RunFailure> {
        if candidates.is_empty() {
            return Ok(candidates);
        }
        let pending: Vec<bool> = candidates.iter().map(|c| !c.is_evaluated()).collect();
        let first_batch = self.run.evaluations == 0;
        let evaluated = self.evaluator.evaluate_batch(self.space, candidates);

        for (candidate, fresh) in evaluated.iter().zip(pending) {
            if !fresh {
                continue;
            }
            self.run.evaluations += 1;
            if candidate.is_failed() {
                self.run.failed_evaluations += 1;
            } else if candidate.state == EvaluationState::Infeasible {
                self.run.infeasible_evaluations += 1;
            }
            self.run.offer(candidate);
            self.archive.push(candidate.clone());
        }

        if evaluated.iter().all(Candidate::is_failed) && (evaluated.len() > 1 || first_batch) {
            let reason = evaluated
                .iter()
                .find_map(|c| match &c.state {
                    EvaluationState::Failed { reason } => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_default();
            error!(
                "{}: All {} evaluations in the batch failed (last error: {})",
                self.run.algorithm,
                evaluated.len(),
                reason
            );
            return Err(RunFailure::new(format!(
                "all {} evaluations in a batch failed: {}",
                evaluated.len(),
                reason
            )));
        }

        Ok(evaluated)
    }

    /// Record one iteration with the scores of the current population.
    pub fn record_iteration(&mut self, population_scores: &[f64]) -> Option<StopReason> {
        let best = self.run.best_score().unwrap_or(PENALTY_SCORE);
        let stop = self
            .tracker
            .record_iteration(best, population_scores, self.run.evaluations);

        if let Some(record) = self.tracker.history().last() {
            debug!(
                "{}: Iteration {} best={:.4} mean={:.4} var={:.6} evals={}",
                self.run.algorithm,
                record.iteration,
                record.best_score,
                record.mean_score,
                record.score_variance,
                record.evaluations
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.observe_iteration(self.run.algorithm.as_str(), best);
        }
        stop
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::application::optimization::cancellation::CancellationToken;
    use crate::domain::optimization::{
        ObjectiveDefinition, ObjectiveScorer, ParameterAssignment, ParameterSpec,
    };
    use crate::domain::performance::{BacktestResult, Metric};
    use crate::domain::ports::Scenario;
    use rand::SeedableRng;
    use std::sync::Arc;

    /// Return peaks at period = 14, declining quadratically
    pub fn peaked(a: &ParameterAssignment, _: &Scenario) -> anyhow::Result<BacktestResult> {
        let period = a.number_of("rsi", "period").unwrap_or(0.0);
        Ok(BacktestResult {
            total_return_pct: 80.0 - (period - 14.0).powi(2) / 10.0,
            ..Default::default()
        })
    }

    pub fn period_space() -> ParameterSpace {
        ParameterSpace::new(vec![ParameterSpec::continuous("rsi", "period", 2.0, 50.0)]).unwrap()
    }

    pub fn evaluator(objectives: Vec<ObjectiveDefinition>) -> CachedEvaluator {
        CachedEvaluator::new(
            Arc::new(peaked),
            Scenario::new("synthetic"),
            ObjectiveScorer::new(objectives).unwrap(),
        )
    }

    pub fn return_objective() -> Vec<ObjectiveDefinition> {
        vec![ObjectiveDefinition::maximize(Metric::TotalReturn, 1.0)]
    }

    pub fn run_strategy(
        strategy: &mut dyn SearchStrategy,
        space: &ParameterSpace,
        config: &OptimizationConfig,
        evaluator: &CachedEvaluator,
    ) -> (Result<StopReason, RunFailure>, OptimizationRun, ConvergenceTracker) {
        let tracker = ConvergenceTracker::new(
            strategy.convergence_mode(),
            strategy.iteration_budget(config),
            &config.convergence,
            config.budget.max_duration(),
            CancellationToken::new(),
        );
        let mut ctx = SearchContext::new(
            space,
            config,
            evaluator,
            StdRng::seed_from_u64(config.seed),
            OptimizationRun::new(strategy.algorithm()),
            tracker,
        );
        let outcome = strategy.optimize(&mut ctx);
        (outcome, ctx.run, ctx.tracker)
    }
}

use super::{SearchContext, SearchStrategy, sampling_batches};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::OptimizationConfig;
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{Algorithm, Candidate};
use tracing::info;

/// Independent uniform samples; the baseline the other strategies should beat.
#[derive(Debug, Default)]
pub struct RandomSearch;

impl RandomSearch {
    pub fn new() -> Self {
        Self
    }
}

impl SearchStrategy for RandomSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Random
    }

    fn convergence_mode(&self) -> ConvergenceMode {
        ConvergenceMode::Sampling
    }

    fn iteration_budget(&self, config: &OptimizationConfig) -> usize {
        sampling_batches(config)
    }

    fn optimize(&mut self, ctx: &mut SearchContext<'_>) -> Result<StopReason, RunFailure> {
        let total = ctx.config.budget.max_iterations.max(1);
        let batch_size = ctx.config.batch_size.max(1);
        info!("RandomSearch: Drawing {} samples in batches of {}", total, batch_size);

        let mut issued = 0usize;
        loop {
            let size = batch_size.min(total - issued);
            let batch: Vec<Candidate> = (0..size)
                .map(|_| ctx.space.generate_random(&mut ctx.rng))
                .collect();
            issued += size;

            let evaluated = ctx.evaluate(batch)?;
            let scores: Vec<f64> = evaluated.iter().map(Candidate::fitness_or_penalty).collect();
            if let Some(reason) = ctx.record_iteration(&scores) {
                return Ok(reason);
            }
            if issued >= total {
                return Ok(ctx.tracker.finish(StopReason::MaxIterations));
            }
        }
    }
}

//! Guided sampling ("Bayesian" in configuration).
//!
//! A uniform exploration phase is followed by proposals built from the mean
//! of the top historical samples plus Gaussian noise. There is no surrogate
//! model; this is a heuristic sampler.

use super::{SearchContext, SearchStrategy, sampling_batches};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{GuidedConfig, OptimizationConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{
    Algorithm, Candidate, EvaluationState, ParameterKind, candidate::sort_by_fitness_desc,
};
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::HashMap;
use tracing::info;

/// Proposals violating constraints are redrawn this many times
const MAX_PROPOSAL_ATTEMPTS: usize = 10;

pub struct GuidedSampling {
    config: GuidedConfig,
}

impl GuidedSampling {
    pub fn new(config: GuidedConfig) -> Self {
        Self { config }
    }

    fn exploration_budget(&self, total: usize) -> usize {
        ((self.config.exploration_ratio * total as f64).ceil() as usize).clamp(1, total.max(1))
    }

    /// Mean encoding of the top performers plus noise; categoricals take the mode
    fn propose(&self, ctx: &mut SearchContext<'_>, elite: &[Vec<f64>]) -> Candidate {
        let space = ctx.space;
        let specs = space.specs();
        let mut centre = vec![0.0; specs.len()];
        for (dim, spec) in specs.iter().enumerate() {
            centre[dim] = match spec.kind {
                ParameterKind::Categorical => {
                    let mut counts: HashMap<i64, usize> = HashMap::new();
                    for encoded in elite {
                        *counts.entry(encoded[dim].round() as i64).or_default() += 1;
                    }
                    counts
                        .into_iter()
                        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
                        .map(|(index, _)| index as f64)
                        .unwrap_or(0.0)
                }
                _ => elite.iter().map(|e| e[dim]).sum::<f64>() / elite.len() as f64,
            };
        }

        let ranges = space.ranges();
        let mut proposal = space.decode(&centre);
        for _ in 0..MAX_PROPOSAL_ATTEMPTS {
            let noisy: Vec<f64> = centre
                .iter()
                .zip(&ranges)
                .zip(specs)
                .map(|((x, range), spec)| match spec.kind {
                    ParameterKind::Categorical => *x,
                    _ => {
                        let z: f64 = ctx.rng.sample(StandardNormal);
                        x + z * self.config.noise_scale * range
                    }
                })
                .collect();
            proposal = space.decode(&noisy);
            if space.is_feasible(&proposal) {
                break;
            }
        }
        Candidate::new(proposal)
    }

    fn elite_encodings(&self, ctx: &SearchContext<'_>) -> Vec<Vec<f64>> {
        let mut history: Vec<Candidate> = ctx
            .archive
            .iter()
            .filter(|c| c.state == EvaluationState::Completed)
            .cloned()
            .collect();
        sort_by_fitness_desc(&mut history);
        let top_k = ((self.config.top_fraction * history.len() as f64).ceil() as usize).max(1);
        history
            .iter()
            .take(top_k)
            .map(|c| ctx.space.encode(&c.assignment))
            .collect()
    }
}

impl SearchStrategy for GuidedSampling {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Bayesian
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
        let explore = self.exploration_budget(total);
        info!("GuidedSampling: {} evaluations, {} exploratory", total, explore);

        let mut issued = 0usize;
        loop {
            let size = batch_size.min(total - issued);
            let elite = if issued + size > explore {
                self.elite_encodings(ctx)
            } else {
                Vec::new()
            };

            let batch: Vec<Candidate> = (issued..issued + size)
                .map(|i| {
                    if i < explore || elite.is_empty() {
                        ctx.space.generate_random(&mut ctx.rng)
                    } else {
                        self.propose(ctx, &elite)
                    }
                })
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

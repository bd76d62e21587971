use super::{SearchContext, SearchStrategy};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{AnnealingConfig, OptimizationConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{Algorithm, Candidate};
use rand::Rng;
use tracing::info;

/// Neighbor scale never shrinks below this fraction of a parameter's range
const MIN_NEIGHBOR_SCALE: f64 = 0.01;

/// Metropolis acceptance: 1 for improvements, `exp(delta / T)` otherwise.
pub fn acceptance_probability(delta: f64, temperature: f64) -> f64 {
    if delta >= 0.0 {
        1.0
    } else if temperature <= 0.0 || !temperature.is_finite() {
        0.0
    } else {
        (delta / temperature).exp()
    }
}

/// Single-candidate annealing with geometric cooling.
///
/// The accepted candidate may be worse than the best seen; the best-ever
/// candidate is tracked separately by the run.
pub struct SimulatedAnnealing {
    config: AnnealingConfig,
}

impl SimulatedAnnealing {
    pub fn new(config: AnnealingConfig) -> Self {
        Self { config }
    }

    fn neighbor_scale(&self, temperature: f64) -> f64 {
        let ratio = temperature / self.config.initial_temperature;
        (self.config.neighbor_scale * ratio).max(MIN_NEIGHBOR_SCALE)
    }
}

impl SearchStrategy for SimulatedAnnealing {
    fn algorithm(&self) -> Algorithm {
        Algorithm::SimulatedAnnealing
    }

    fn convergence_mode(&self) -> ConvergenceMode {
        ConvergenceMode::SingleCandidate
    }

    fn iteration_budget(&self, config: &OptimizationConfig) -> usize {
        config.budget.max_iterations
    }

    fn optimize(&mut self, ctx: &mut SearchContext<'_>) -> Result<StopReason, RunFailure> {
        let mut temperature = self.config.initial_temperature;
        info!(
            "SimulatedAnnealing: Starting at T={} (cooling={}, floor={})",
            temperature, self.config.cooling_rate, self.config.min_temperature
        );

        let start = ctx.space.generate_random(&mut ctx.rng);
        let mut current = ctx
            .evaluate(vec![start])?
            .pop()
            .ok_or_else(|| RunFailure::new("initial candidate was not evaluated"))?;
        let mut accepted = 0usize;

        loop {
            let scale = self.neighbor_scale(temperature);
            let proposal = Candidate::new(ctx.space.neighbor(&current.assignment, &mut ctx.rng, scale));
            let neighbor = ctx
                .evaluate(vec![proposal])?
                .pop()
                .ok_or_else(|| RunFailure::new("neighbor was not evaluated"))?;

            let delta = neighbor.fitness_or_penalty() - current.fitness_or_penalty();
            if ctx.rng.random::<f64>() < acceptance_probability(delta, temperature) {
                current = neighbor;
                accepted += 1;
            }
            temperature *= self.config.cooling_rate;

            if let Some(reason) = ctx.record_iteration(&[current.fitness_or_penalty()]) {
                info!("SimulatedAnnealing: Stopped ({}) after {} accepted moves", reason, accepted);
                return Ok(reason);
            }
            if temperature < self.config.min_temperature {
                info!(
                    "SimulatedAnnealing: Temperature {:.6} below floor after {} accepted moves",
                    temperature, accepted
                );
                return Ok(ctx.tracker.finish(StopReason::TemperatureFloor));
            }
        }
    }
}

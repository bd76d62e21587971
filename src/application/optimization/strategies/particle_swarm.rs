//! Particle swarm over the numeric encoding of the parameter space.

use super::{SearchContext, SearchStrategy};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{OptimizationConfig, SwarmConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{Algorithm, Candidate, PENALTY_SCORE};
use ndarray::Array1;
use rand::Rng;
use tracing::info;

/// Initial velocities are drawn within this fraction of each range
const INITIAL_VELOCITY_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
struct Particle {
    position: Array1<f64>,
    velocity: Array1<f64>,
    best_position: Array1<f64>,
    best_fitness: f64,
}

pub struct ParticleSwarm {
    config: SwarmConfig,
}

impl ParticleSwarm {
    pub fn new(config: SwarmConfig) -> Self {
        Self { config }
    }

    fn spawn(ctx: &mut SearchContext<'_>, ranges: &Array1<f64>) -> Particle {
        let position = Array1::from(ctx.space.encode(&ctx.space.random_assignment(&mut ctx.rng)));
        let velocity = ranges.mapv(|r| {
            let spread = INITIAL_VELOCITY_FRACTION * r;
            if spread > 0.0 {
                ctx.rng.random_range(-spread..=spread)
            } else {
                0.0
            }
        });
        Particle {
            best_position: position.clone(),
            position,
            velocity,
            best_fitness: f64::NEG_INFINITY,
        }
    }
}

impl SearchStrategy for ParticleSwarm {
    fn algorithm(&self) -> Algorithm {
        Algorithm::ParticleSwarm
    }

    fn convergence_mode(&self) -> ConvergenceMode {
        ConvergenceMode::Population
    }

    fn iteration_budget(&self, config: &OptimizationConfig) -> usize {
        config.budget.max_iterations
    }

    fn optimize(&mut self, ctx: &mut SearchContext<'_>) -> Result<StopReason, RunFailure> {
        let size = self.config.swarm_size.max(1);
        let (lower, upper): (Vec<f64>, Vec<f64>) = ctx.space.bounds().into_iter().unzip();
        let lower = Array1::from(lower);
        let upper = Array1::from(upper);
        let ranges = &upper - &lower;
        let max_velocity = &ranges * self.config.max_velocity_fraction;
        info!(
            "ParticleSwarm: Starting with {} particles in {} dimensions",
            size,
            ranges.len()
        );

        let mut swarm: Vec<Particle> = (0..size).map(|_| Self::spawn(ctx, &ranges)).collect();
        let mut global_best = swarm[0].position.clone();
        let mut global_fitness = f64::NEG_INFINITY;

        loop {
            let candidates: Vec<Candidate> = swarm
                .iter()
                .map(|p| Candidate::new(ctx.space.decode(p.position.as_slice().unwrap_or(&[]))))
                .collect();
            let evaluated = ctx.evaluate(candidates)?;

            let mut scores = Vec::with_capacity(size);
            for (particle, candidate) in swarm.iter_mut().zip(&evaluated) {
                let fitness = candidate.fitness.unwrap_or(PENALTY_SCORE);
                scores.push(fitness);
                if fitness > particle.best_fitness {
                    particle.best_fitness = fitness;
                    particle.best_position = particle.position.clone();
                }
                if fitness > global_fitness {
                    global_fitness = fitness;
                    global_best = particle.position.clone();
                }
            }

            if let Some(reason) = ctx.record_iteration(&scores) {
                info!(
                    "ParticleSwarm: Stopped ({}) with global best {:.4}",
                    reason, global_fitness
                );
                return Ok(reason);
            }

            let dims = ranges.len();
            for particle in swarm.iter_mut() {
                let r1 = Array1::from_shape_fn(dims, |_| ctx.rng.random::<f64>());
                let r2 = Array1::from_shape_fn(dims, |_| ctx.rng.random::<f64>());
                let cognitive = (&particle.best_position - &particle.position) * &r1 * self.config.cognitive;
                let social = (&global_best - &particle.position) * &r2 * self.config.social;
                let mut velocity = &particle.velocity * self.config.inertia + cognitive + social;
                velocity.zip_mut_with(&max_velocity, |v, &cap| *v = v.clamp(-cap, cap));

                let mut position = &particle.position + &velocity;
                for i in 0..dims {
                    position[i] = position[i].clamp(lower[i], upper[i]);
                }
                particle.velocity = velocity;
                particle.position = position;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_swarm_moves_toward_peak() {
        let mut config = OptimizationConfig::default().with_seed(21);
        config.swarm.swarm_size = 15;
        config.budget.max_iterations = 40;
        let evaluator = evaluator(return_objective());
        let mut strategy = ParticleSwarm::new(config.swarm.clone());

        let (outcome, run, tracker) = run_strategy(&mut strategy, &period_space(), &config, &evaluator);
        assert!(outcome.is_ok());
        assert!(tracker.iterations() <= 40);
        let period = run.best.unwrap().assignment.number_of("rsi", "period").unwrap();
        assert!((period - 14.0).abs() <= 3.0, "period {}", period);
    }
}

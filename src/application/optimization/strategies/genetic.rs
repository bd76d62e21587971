use super::operators::{crossover, mutate, tournament};
use super::{SearchContext, SearchStrategy};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{GeneticConfig, OptimizationConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{Algorithm, Candidate, candidate::sort_by_fitness_desc};
use tracing::info;

/// Generational genetic algorithm with elitism and tournament selection.
///
/// At least one elite survives each generation, so the population's best
/// fitness never decreases.
pub struct GeneticSearch {
    config: GeneticConfig,
}

impl GeneticSearch {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    fn elite_count(&self) -> usize {
        let size = self.config.population_size;
        ((self.config.elitism_rate * size as f64).round() as usize).clamp(1, size)
    }

    fn next_generation(&self, ctx: &mut SearchContext<'_>, ranked: &[Candidate]) -> Vec<Candidate> {
        let size = self.config.population_size;
        let mut next: Vec<Candidate> = ranked[..self.elite_count().min(ranked.len())].to_vec();

        while next.len() < size {
            let beats = |a: usize, b: usize| ranked[a].fitness_or_penalty() > ranked[b].fitness_or_penalty();
            let p1 = tournament(ranked.len(), self.config.tournament_size, &mut ctx.rng, beats);
            let p2 = tournament(ranked.len(), self.config.tournament_size, &mut ctx.rng, beats);

            let (c1, c2) = crossover(
                ctx.space,
                &ranked[p1].assignment,
                &ranked[p2].assignment,
                self.config.crossover_rate,
                &mut ctx.rng,
            );
            for child in [c1, c2] {
                if next.len() < size {
                    let mutated = mutate(ctx.space, &child, self.config.mutation_rate, &mut ctx.rng);
                    next.push(Candidate::new(mutated));
                }
            }
        }
        next
    }
}

impl SearchStrategy for GeneticSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Genetic
    }

    fn convergence_mode(&self) -> ConvergenceMode {
        ConvergenceMode::Population
    }

    fn iteration_budget(&self, config: &OptimizationConfig) -> usize {
        self.config.generations.min(config.budget.max_iterations).max(1)
    }

    fn optimize(&mut self, ctx: &mut SearchContext<'_>) -> Result<StopReason, RunFailure> {
        let size = self.config.population_size.max(2);
        self.config.population_size = size;
        info!(
            "GeneticSearch: Starting with population={}, generations={}, elites={}",
            size,
            ctx.tracker.max_iterations(),
            self.elite_count()
        );

        let mut population: Vec<Candidate> = (0..size)
            .map(|_| ctx.space.generate_random(&mut ctx.rng))
            .collect();

        loop {
            let mut ranked = ctx.evaluate(population)?;
            sort_by_fitness_desc(&mut ranked);
            let scores: Vec<f64> = ranked.iter().map(Candidate::fitness_or_penalty).collect();

            if let Some(reason) = ctx.record_iteration(&scores) {
                return Ok(reason);
            }
            population = self.next_generation(ctx, &ranked);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn test_genetic_finds_peak() {
        let mut config = OptimizationConfig::default().with_seed(11);
        config.genetic.population_size = 30;
        config.genetic.generations = 40;
        config.budget.max_iterations = 40;
        let evaluator = evaluator(return_objective());
        let mut strategy = GeneticSearch::new(config.genetic.clone());

        let (outcome, run, tracker) = run_strategy(&mut strategy, &period_space(), &config, &evaluator);
        assert!(outcome.is_ok());
        let best = run.best.expect("best candidate");
        let period = best.assignment.number_of("rsi", "period").unwrap();
        assert!((period - 14.0).abs() <= 2.0, "period {}", period);

        // Best-ever never decreases across generations
        let history = tracker.history();
        assert!(history.windows(2).all(|w| w[1].best_score >= w[0].best_score));
    }

    #[test]
    fn test_generation_budget_caps_iterations() {
        let mut config = OptimizationConfig::default();
        config.genetic.population_size = 6;
        config.genetic.generations = 50;
        config.budget.max_iterations = 4;
        config.convergence.variance_threshold = 0.0;
        let strategy = GeneticSearch::new(config.genetic.clone());
        assert_eq!(strategy.iteration_budget(&config), 4);

        let mut strategy = strategy;
        let evaluator = evaluator(return_objective());
        let (outcome, run, tracker) = run_strategy(&mut strategy, &period_space(), &config, &evaluator);
        assert_eq!(outcome, Ok(StopReason::MaxIterations));
        assert_eq!(tracker.iterations(), 4);
        // Elites are not re-evaluated
        assert!(run.evaluations <= 4 * 6);
    }
}

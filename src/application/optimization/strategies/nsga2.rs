//! Multi-objective genetic search with non-dominated sorting and crowding.

use super::operators::{crossover, mutate, tournament};
use super::{SearchContext, SearchStrategy};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{GeneticConfig, OptimizationConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::pareto::{crowding_distance, non_dominated_sort};
use crate::domain::optimization::{Algorithm, Candidate, EvaluationState};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Rank and crowding of each population member
#[derive(Debug, Clone, Default)]
struct Ranking {
    rank: Vec<usize>,
    crowding: Vec<f64>,
}

impl Ranking {
    /// Crowded comparison: lower front wins, then larger crowding distance
    fn beats(&self, a: usize, b: usize) -> bool {
        match self.rank[a].cmp(&self.rank[b]) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => self.crowding[a] > self.crowding[b],
        }
    }
}

pub struct Nsga2Search {
    config: GeneticConfig,
}

impl Nsga2Search {
    pub fn new(config: GeneticConfig) -> Self {
        Self { config }
    }

    fn objective_vectors(ctx: &SearchContext<'_>, candidates: &[Candidate]) -> Vec<Vec<f64>> {
        let count = ctx.objective_count();
        candidates
            .iter()
            .map(|c| c.objectives_or_penalty(count))
            .collect()
    }

    /// Keep the best `size` of `pool` by front, truncating the last front by crowding.
    fn select(ctx: &SearchContext<'_>, pool: Vec<Candidate>, size: usize) -> (Vec<Candidate>, Ranking) {
        let scores = Self::objective_vectors(ctx, &pool);
        let fronts = non_dominated_sort(&scores);

        let mut chosen: Vec<(usize, usize, f64)> = Vec::with_capacity(size);
        for (rank, front) in fronts.iter().enumerate() {
            if chosen.len() >= size {
                break;
            }
            let distances = crowding_distance(&scores, front);
            let mut members: Vec<(usize, f64)> =
                front.iter().copied().zip(distances).collect();
            if chosen.len() + members.len() > size {
                members.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                members.truncate(size - chosen.len());
            }
            chosen.extend(members.into_iter().map(|(i, d)| (i, rank, d)));
        }

        let mut slots: Vec<Option<Candidate>> = pool.into_iter().map(Some).collect();
        let mut population = Vec::with_capacity(chosen.len());
        let mut ranking = Ranking::default();
        for (index, rank, distance) in chosen {
            if let Some(candidate) = slots[index].take() {
                population.push(candidate);
                ranking.rank.push(rank);
                ranking.crowding.push(distance);
            }
        }
        (population, ranking)
    }

    fn offspring(&self, ctx: &mut SearchContext<'_>, population: &[Candidate], ranking: &Ranking) -> Vec<Candidate> {
        let size = self.config.population_size;
        let mut children = Vec::with_capacity(size);
        while children.len() < size {
            let beats = |a: usize, b: usize| ranking.beats(a, b);
            let p1 = tournament(population.len(), self.config.tournament_size, &mut ctx.rng, beats);
            let p2 = tournament(population.len(), self.config.tournament_size, &mut ctx.rng, beats);
            let (c1, c2) = crossover(
                ctx.space,
                &population[p1].assignment,
                &population[p2].assignment,
                self.config.crossover_rate,
                &mut ctx.rng,
            );
            for child in [c1, c2] {
                if children.len() < size {
                    let mutated = mutate(ctx.space, &child, self.config.mutation_rate, &mut ctx.rng);
                    children.push(Candidate::new(mutated));
                }
            }
        }
        children
    }

    fn publish_front(ctx: &mut SearchContext<'_>, population: &[Candidate], ranking: &Ranking) {
        ctx.pareto_front = population
            .iter()
            .zip(&ranking.rank)
            .filter(|(c, rank)| **rank == 0 && c.state == EvaluationState::Completed)
            .map(|(c, _)| c.clone())
            .collect();
    }
}

impl SearchStrategy for Nsga2Search {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Nsga2
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
            "Nsga2Search: Starting with population={}, objectives={}, generations={}",
            size,
            ctx.objective_count(),
            ctx.tracker.max_iterations()
        );

        let initial: Vec<Candidate> = (0..size)
            .map(|_| ctx.space.generate_random(&mut ctx.rng))
            .collect();
        let evaluated = ctx.evaluate(initial)?;
        let (mut population, mut ranking) = Self::select(ctx, evaluated, size);

        loop {
            Self::publish_front(ctx, &population, &ranking);
            debug!(
                "Nsga2Search: Front 0 holds {} of {} candidates",
                ctx.pareto_front.len(),
                population.len()
            );
            let scores: Vec<f64> = population.iter().map(Candidate::fitness_or_penalty).collect();
            if let Some(reason) = ctx.record_iteration(&scores) {
                return Ok(reason);
            }

            let children = self.offspring(ctx, &population, &ranking);
            let children = ctx.evaluate(children)?;
            let mut pool = population;
            pool.extend(children);
            (population, ranking) = Self::select(ctx, pool, size);
        }
    }
}

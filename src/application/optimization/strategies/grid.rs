//! Exhaustive grid search in deterministic lexicographic order.

use super::{SearchContext, SearchStrategy, sampling_batches};
use crate::application::optimization::convergence::{ConvergenceMode, StopReason};
use crate::config::{GridConfig, OptimizationConfig};
use crate::domain::errors::RunFailure;
use crate::domain::optimization::{
    Algorithm, Candidate, ParamKey, ParameterAssignment, ParameterSpace, ParameterSpec,
};
use tracing::info;

/// Odometer over the Cartesian product; the last key varies fastest.
///
/// Axis points are computed from the spec on demand, so memory stays
/// proportional to the number of parameters whatever the lattice width.
#[derive(Debug)]
pub struct GridCursor<'a> {
    specs: &'a [ParameterSpec],
    keys: Vec<ParamKey>,
    lengths: Vec<usize>,
    subdivisions: usize,
    indices: Vec<usize>,
    done: bool,
}

impl<'a> GridCursor<'a> {
    pub fn new(space: &'a ParameterSpace, default_subdivisions: usize) -> Self {
        let specs = space.specs();
        let lengths: Vec<usize> = specs
            .iter()
            .map(|spec| spec.grid_len(default_subdivisions))
            .collect();
        let done = lengths.is_empty() || lengths.contains(&0);
        Self {
            specs,
            keys: specs.iter().map(ParameterSpec::key).collect(),
            indices: vec![0; lengths.len()],
            lengths,
            subdivisions: default_subdivisions,
            done,
        }
    }

    /// Number of grid points, saturating on overflow
    pub fn size(&self) -> usize {
        self.lengths
            .iter()
            .fold(1usize, |acc, &len| acc.saturating_mul(len))
    }

    fn advance(&mut self) {
        let mut pos = self.lengths.len();
        loop {
            if pos == 0 {
                self.done = true;
                return;
            }
            pos -= 1;
            self.indices[pos] += 1;
            if self.indices[pos] < self.lengths[pos] {
                return;
            }
            self.indices[pos] = 0;
        }
    }
}

impl Iterator for GridCursor<'_> {
    type Item = ParameterAssignment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut assignment = ParameterAssignment::new();
        for ((key, spec), &i) in self.keys.iter().zip(self.specs).zip(&self.indices) {
            assignment.set(key.clone(), spec.grid_value(i, self.subdivisions));
        }
        self.advance();
        Some(assignment)
    }
}

pub struct GridSearch {
    config: GridConfig,
}

impl GridSearch {
    pub fn new(config: GridConfig) -> Self {
        Self { config }
    }
}

impl SearchStrategy for GridSearch {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Grid
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
        let space = ctx.space;
        let mut cursor = GridCursor::new(space, self.config.default_subdivisions);
        info!(
            "GridSearch: {} grid points, evaluating up to {}",
            cursor.size(),
            total
        );

        let mut issued = 0usize;
        loop {
            let size = batch_size.min(total - issued);
            let batch: Vec<Candidate> = cursor
                .by_ref()
                .filter(|a| space.is_feasible(a))
                .take(size)
                .map(Candidate::new)
                .collect();

            if batch.is_empty() {
                if issued == 0 {
                    return Err(RunFailure::new("grid contains no feasible point"));
                }
                info!("GridSearch: Grid exhausted after {} points", issued);
                return Ok(ctx.tracker.finish(StopReason::SpaceExhausted));
            }
            issued += batch.len();

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

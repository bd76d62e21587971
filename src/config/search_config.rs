//! Per-algorithm tuning knobs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Points per continuous parameter; discrete params use their step
    pub default_subdivisions: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            default_subdivisions: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub generations: usize,
    pub elitism_rate: f64,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub tournament_size: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            elitism_rate: 0.1,
            crossover_rate: 0.8,
            mutation_rate: 0.1,
            tournament_size: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnealingConfig {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub min_temperature: f64,
    /// Neighbor step as a fraction of each range at the initial temperature
    pub neighbor_scale: f64,
}

impl Default for AnnealingConfig {
    fn default() -> Self {
        Self {
            initial_temperature: 1.0,
            cooling_rate: 0.995,
            min_temperature: 1e-4,
            neighbor_scale: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmConfig {
    pub swarm_size: usize,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
    /// Velocity cap as a fraction of each parameter range
    pub max_velocity_fraction: f64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            swarm_size: 30,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            max_velocity_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidedConfig {
    /// Share of the budget spent on uniform exploration
    pub exploration_ratio: f64,
    /// Share of history averaged when proposing new candidates
    pub top_fraction: f64,
    /// Gaussian noise as a fraction of each parameter range
    pub noise_scale: f64,
}

impl Default for GuidedConfig {
    fn default() -> Self {
        Self {
            exploration_ratio: 0.3,
            top_fraction: 0.2,
            noise_scale: 0.05,
        }
    }
}

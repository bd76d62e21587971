use crate::domain::errors::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search algorithm selected by configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Grid,
    Random,
    #[default]
    Genetic,
    SimulatedAnnealing,
    ParticleSwarm,
    /// Guided sampling around top performers; not a Gaussian-process model
    Bayesian,
    /// Multi-objective genetic search with non-dominated sorting
    Nsga2,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Algorithm::Grid,
        Algorithm::Random,
        Algorithm::Genetic,
        Algorithm::SimulatedAnnealing,
        Algorithm::ParticleSwarm,
        Algorithm::Bayesian,
        Algorithm::Nsga2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Grid => "grid",
            Algorithm::Random => "random",
            Algorithm::Genetic => "genetic",
            Algorithm::SimulatedAnnealing => "simulated_annealing",
            Algorithm::ParticleSwarm => "particle_swarm",
            Algorithm::Bayesian => "bayesian",
            Algorithm::Nsga2 => "nsga2",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "grid" | "grid_search" => Ok(Algorithm::Grid),
            "random" | "random_search" => Ok(Algorithm::Random),
            "genetic" | "ga" | "genetic_algorithm" => Ok(Algorithm::Genetic),
            "simulated_annealing" | "annealing" | "sa" => Ok(Algorithm::SimulatedAnnealing),
            "particle_swarm" | "pso" | "swarm" => Ok(Algorithm::ParticleSwarm),
            "bayesian" | "guided" | "bayesian_optimization" => Ok(Algorithm::Bayesian),
            "nsga2" | "nsga_ii" | "multi_objective" => Ok(Algorithm::Nsga2),
            _ => Err(ConfigurationError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

//! Configuration module for the strategy tuner.
//!
//! `OptimizationConfig` can be built from defaults, a TOML document, or the
//! environment (`OPTIMIZER_*` variables, optionally from a `.env` file).

mod budget_config;
mod search_config;

pub use budget_config::{BudgetConfig, CacheConfig, ConvergenceConfig};
pub use search_config::{AnnealingConfig, GeneticConfig, GridConfig, GuidedConfig, SwarmConfig};

use crate::domain::errors::ConfigurationError;
use crate::domain::optimization::Algorithm;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;

/// Full run configuration: algorithm choice, budgets and per-algorithm knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Algorithm name, resolved through `Algorithm::from_str` so aliases work
    pub algorithm: String,
    pub seed: u64,
    /// Candidates evaluated together by sampling strategies
    pub batch_size: usize,
    /// Evaluation pool size; `None` uses the rayon default
    pub max_workers: Option<usize>,
    /// Distinct candidates kept in the result ranking
    pub top_n: usize,
    pub budget: BudgetConfig,
    pub convergence: ConvergenceConfig,
    pub cache: CacheConfig,
    pub grid: GridConfig,
    pub genetic: GeneticConfig,
    pub annealing: AnnealingConfig,
    pub swarm: SwarmConfig,
    pub guided: GuidedConfig,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Genetic.as_str().to_string(),
            seed: 42,
            batch_size: 32,
            max_workers: None,
            top_n: 10,
            budget: BudgetConfig::default(),
            convergence: ConvergenceConfig::default(),
            cache: CacheConfig::default(),
            grid: GridConfig::default(),
            genetic: GeneticConfig::default(),
            annealing: AnnealingConfig::default(),
            swarm: SwarmConfig::default(),
            guided: GuidedConfig::default(),
        }
    }
}

impl OptimizationConfig {
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm.as_str().to_string();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.budget.max_iterations = max_iterations;
        self
    }

    /// Resolved algorithm; unknown names are a configuration error.
    pub fn algorithm(&self) -> Result<Algorithm, ConfigurationError> {
        Algorithm::from_str(&self.algorithm)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse optimizer TOML")?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Defaults overridden by `OPTIMIZER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::default().apply_env_overrides()
    }

    pub fn apply_env_overrides(mut self) -> Result<Self> {
        if let Ok(name) = env::var("OPTIMIZER_ALGORITHM") {
            self.algorithm = name;
        }
        self.seed = Self::parse_env("OPTIMIZER_SEED", self.seed)?;
        self.batch_size = Self::parse_env("OPTIMIZER_BATCH_SIZE", self.batch_size)?;
        if let Ok(raw) = env::var("OPTIMIZER_MAX_WORKERS") {
            self.max_workers = Some(
                raw.parse()
                    .context("Failed to parse OPTIMIZER_MAX_WORKERS")?,
            );
        }
        self.top_n = Self::parse_env("OPTIMIZER_TOP_N", self.top_n)?;

        self.budget.max_iterations =
            Self::parse_env("OPTIMIZER_MAX_ITERATIONS", self.budget.max_iterations)?;
        if let Ok(raw) = env::var("OPTIMIZER_MAX_DURATION_SECS") {
            self.budget.max_duration_secs = Some(
                raw.parse()
                    .context("Failed to parse OPTIMIZER_MAX_DURATION_SECS")?,
            );
        }

        self.convergence.variance_threshold = Self::parse_env(
            "OPTIMIZER_VARIANCE_THRESHOLD",
            self.convergence.variance_threshold,
        )?;
        self.convergence.patience = Self::parse_env("OPTIMIZER_PATIENCE", self.convergence.patience)?;
        self.convergence.epsilon = Self::parse_env("OPTIMIZER_EPSILON", self.convergence.epsilon)?;

        self.cache.enabled = env::var("OPTIMIZER_CACHE_ENABLED")
            .unwrap_or_else(|_| self.cache.enabled.to_string())
            .parse::<bool>()
            .unwrap_or(self.cache.enabled);
        self.cache.max_entries =
            Self::parse_env("OPTIMIZER_CACHE_MAX_ENTRIES", self.cache.max_entries)?;

        self.grid.default_subdivisions =
            Self::parse_env("OPTIMIZER_GRID_SUBDIVISIONS", self.grid.default_subdivisions)?;

        self.genetic.population_size =
            Self::parse_env("OPTIMIZER_POPULATION_SIZE", self.genetic.population_size)?;
        self.genetic.generations =
            Self::parse_env("OPTIMIZER_GENERATIONS", self.genetic.generations)?;
        self.genetic.elitism_rate =
            Self::parse_env("OPTIMIZER_ELITISM_RATE", self.genetic.elitism_rate)?;
        self.genetic.crossover_rate =
            Self::parse_env("OPTIMIZER_CROSSOVER_RATE", self.genetic.crossover_rate)?;
        self.genetic.mutation_rate =
            Self::parse_env("OPTIMIZER_MUTATION_RATE", self.genetic.mutation_rate)?;
        self.genetic.tournament_size =
            Self::parse_env("OPTIMIZER_TOURNAMENT_SIZE", self.genetic.tournament_size)?;

        self.annealing.initial_temperature = Self::parse_env(
            "OPTIMIZER_INITIAL_TEMPERATURE",
            self.annealing.initial_temperature,
        )?;
        self.annealing.cooling_rate =
            Self::parse_env("OPTIMIZER_COOLING_RATE", self.annealing.cooling_rate)?;
        self.annealing.min_temperature =
            Self::parse_env("OPTIMIZER_MIN_TEMPERATURE", self.annealing.min_temperature)?;
        self.annealing.neighbor_scale =
            Self::parse_env("OPTIMIZER_NEIGHBOR_SCALE", self.annealing.neighbor_scale)?;

        self.swarm.swarm_size = Self::parse_env("OPTIMIZER_SWARM_SIZE", self.swarm.swarm_size)?;
        self.swarm.inertia = Self::parse_env("OPTIMIZER_INERTIA", self.swarm.inertia)?;
        self.swarm.cognitive = Self::parse_env("OPTIMIZER_COGNITIVE", self.swarm.cognitive)?;
        self.swarm.social = Self::parse_env("OPTIMIZER_SOCIAL", self.swarm.social)?;
        self.swarm.max_velocity_fraction = Self::parse_env(
            "OPTIMIZER_MAX_VELOCITY_FRACTION",
            self.swarm.max_velocity_fraction,
        )?;

        self.guided.exploration_ratio =
            Self::parse_env("OPTIMIZER_EXPLORATION_RATIO", self.guided.exploration_ratio)?;
        self.guided.top_fraction =
            Self::parse_env("OPTIMIZER_TOP_FRACTION", self.guided.top_fraction)?;
        self.guided.noise_scale =
            Self::parse_env("OPTIMIZER_NOISE_SCALE", self.guided.noise_scale)?;

        Ok(self)
    }

    fn parse_env<T>(key: &str, default: T) -> Result<T>
    where
        T: FromStr + ToString,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<T>()
            .context(format!("Failed to parse {}", key))
    }

    /// Range checks run before any iteration starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.algorithm()?;

        if self.budget.max_iterations == 0 {
            return Err(invalid("budget.max_iterations must be > 0"));
        }
        if let Some(secs) = self.budget.max_duration_secs
            && !(secs.is_finite() && secs > 0.0)
        {
            return Err(invalid("budget.max_duration_secs must be a positive number"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be > 0"));
        }
        if self.max_workers == Some(0) {
            return Err(invalid("max_workers must be > 0 when set"));
        }
        if self.top_n == 0 {
            return Err(invalid("top_n must be > 0"));
        }

        let conv = &self.convergence;
        if !(conv.variance_threshold.is_finite() && conv.variance_threshold >= 0.0) {
            return Err(invalid("convergence.variance_threshold must be >= 0"));
        }
        if conv.patience == 0 {
            return Err(invalid("convergence.patience must be > 0"));
        }
        if !(conv.epsilon.is_finite() && conv.epsilon >= 0.0) {
            return Err(invalid("convergence.epsilon must be >= 0"));
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(invalid("cache.max_entries must be > 0 when the cache is enabled"));
        }
        if self.grid.default_subdivisions < 2 {
            return Err(invalid("grid.default_subdivisions must be >= 2"));
        }

        let ga = &self.genetic;
        if ga.population_size < 2 {
            return Err(invalid("genetic.population_size must be >= 2"));
        }
        if ga.generations == 0 {
            return Err(invalid("genetic.generations must be > 0"));
        }
        if ga.tournament_size == 0 {
            return Err(invalid("genetic.tournament_size must be > 0"));
        }
        check_unit("genetic.elitism_rate", ga.elitism_rate)?;
        check_unit("genetic.crossover_rate", ga.crossover_rate)?;
        check_unit("genetic.mutation_rate", ga.mutation_rate)?;

        let sa = &self.annealing;
        if !(sa.initial_temperature.is_finite() && sa.initial_temperature > 0.0) {
            return Err(invalid("annealing.initial_temperature must be > 0"));
        }
        if !(sa.cooling_rate > 0.0 && sa.cooling_rate < 1.0) {
            return Err(invalid("annealing.cooling_rate must be in (0, 1)"));
        }
        if !(sa.min_temperature >= 0.0 && sa.min_temperature < sa.initial_temperature) {
            return Err(invalid(
                "annealing.min_temperature must be >= 0 and below the initial temperature",
            ));
        }
        if !(sa.neighbor_scale.is_finite() && sa.neighbor_scale > 0.0) {
            return Err(invalid("annealing.neighbor_scale must be > 0"));
        }

        let pso = &self.swarm;
        if pso.swarm_size == 0 {
            return Err(invalid("swarm.swarm_size must be > 0"));
        }
        for (name, value) in [
            ("swarm.inertia", pso.inertia),
            ("swarm.cognitive", pso.cognitive),
            ("swarm.social", pso.social),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(&format!("{} must be >= 0", name)));
            }
        }
        if !(pso.max_velocity_fraction > 0.0 && pso.max_velocity_fraction <= 1.0) {
            return Err(invalid("swarm.max_velocity_fraction must be in (0, 1]"));
        }

        let guided = &self.guided;
        check_unit("guided.exploration_ratio", guided.exploration_ratio)?;
        if !(guided.top_fraction > 0.0 && guided.top_fraction <= 1.0) {
            return Err(invalid("guided.top_fraction must be in (0, 1]"));
        }
        if !(guided.noise_scale.is_finite() && guided.noise_scale >= 0.0) {
            return Err(invalid("guided.noise_scale must be >= 0"));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidConfig {
        reason: reason.to_string(),
    }
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be in [0, 1], got {}", name, value)))
    }
}

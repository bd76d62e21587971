use thiserror::Error;

/// Invalid optimizer input, detected before any iteration runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("No optimizable parameters in the parameter space")]
    NoOptimizableParameters,

    #[error("Invalid parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("No objectives configured")]
    NoObjectives,

    #[error("Objective weights sum to {total}; at least one objective needs a positive weight")]
    ZeroObjectiveWeight { total: f64 },

    #[error("Invalid objective {metric}: {reason}")]
    InvalidObjective { metric: String, reason: String },

    #[error("Unknown optimization algorithm: {name}")]
    UnknownAlgorithm { name: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

/// A run that cannot produce a meaningful result
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Optimization run failed: {reason}")]
pub struct RunFailure {
    pub reason: String,
}

impl RunFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the engine's fallible entry points
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Run(#[from] RunFailure),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_formatting() {
        let error = ConfigurationError::InvalidParameter {
            key: "sma/fast".to_string(),
            reason: "min 20 > max 10".to_string(),
        };

        let msg = error.to_string();
        assert!(msg.contains("sma/fast"));
        assert!(msg.contains("min 20 > max 10"));
    }

    #[test]
    fn test_optimization_error_classification() {
        let config: OptimizationError = ConfigurationError::NoOptimizableParameters.into();
        let run: OptimizationError = RunFailure::new("all evaluations failed").into();

        assert!(matches!(config, OptimizationError::Configuration(_)));
        assert!(matches!(run, OptimizationError::Run(_)));
        assert!(run.to_string().contains("all evaluations failed"));
    }
}

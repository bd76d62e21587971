use crate::domain::errors::ConfigurationError;
use crate::domain::optimization::parameter_space::{
    ParamKey, ParameterAssignment, ParameterKind, ParameterSpec,
};
use serde::{Deserialize, Serialize};

/// Relationship that must hold between parameters of one assignment.
///
/// Bounds are enforced by clamping; constraints are not repairable that way,
/// so violating assignments are scored as infeasible instead of evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterConstraint {
    /// `upper - lower >= min_gap`, e.g. fast SMA period below slow SMA period
    Ordered {
        lower: ParamKey,
        upper: ParamKey,
        #[serde(default)]
        min_gap: f64,
    },
}

impl ParameterConstraint {
    pub fn ordered(lower: ParamKey, upper: ParamKey, min_gap: f64) -> Self {
        ParameterConstraint::Ordered {
            lower,
            upper,
            min_gap,
        }
    }

    pub fn is_satisfied(&self, assignment: &ParameterAssignment) -> bool {
        match self {
            ParameterConstraint::Ordered {
                lower,
                upper,
                min_gap,
            } => match (assignment.number(lower), assignment.number(upper)) {
                (Some(lo), Some(hi)) => hi - lo >= *min_gap,
                _ => false,
            },
        }
    }

    pub fn validate(&self, specs: &[ParameterSpec]) -> Result<(), ConfigurationError> {
        match self {
            ParameterConstraint::Ordered {
                lower,
                upper,
                min_gap,
            } => {
                for key in [lower, upper] {
                    let spec = specs.iter().find(|s| &s.key() == key).ok_or_else(|| {
                        ConfigurationError::InvalidParameter {
                            key: key.to_string(),
                            reason: "constraint references an undeclared parameter".to_string(),
                        }
                    })?;
                    if spec.kind == ParameterKind::Categorical {
                        return Err(ConfigurationError::InvalidParameter {
                            key: key.to_string(),
                            reason: "ordering constraints need numeric parameters".to_string(),
                        });
                    }
                }
                if !min_gap.is_finite() {
                    return Err(ConfigurationError::InvalidConfig {
                        reason: format!("constraint gap between {} and {} is not finite", lower, upper),
                    });
                }
                Ok(())
            }
        }
    }
}

pub mod algorithm;
pub mod candidate;
pub mod constraints;
pub mod objective;
pub mod optimization_result;
pub mod optimization_run;
pub mod parameter_space;
pub mod pareto;

pub use algorithm::Algorithm;
pub use candidate::{Candidate, EvaluationState};
pub use constraints::ParameterConstraint;
pub use objective::{Direction, ObjectiveDefinition, ObjectiveScorer, PENALTY_SCORE};
pub use optimization_result::{
    OptimizationResult, ParameterChange, ParameterComparison, ScoredAssignment,
};
pub use optimization_run::{IterationRecord, OptimizationRun, RunStatus};
pub use parameter_space::{
    ParamKey, ParamValue, ParameterAssignment, ParameterKind, ParameterSpace, ParameterSpec,
};

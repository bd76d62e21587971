use crate::domain::optimization::objective::PENALTY_SCORE;
use crate::domain::optimization::parameter_space::ParameterAssignment;
use crate::domain::performance::BacktestResult;
use serde::{Deserialize, Serialize};

/// Outcome of scoring a candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EvaluationState {
    Pending,
    Completed,
    /// Evaluator error, timeout or panic; scored with the penalty sentinel
    Failed { reason: String },
    /// Violates a cross-parameter constraint; never sent to the evaluator
    Infeasible,
}

/// One concrete parameter assignment under evaluation.
///
/// Fitness, objective scores and metrics are filled lazily the first time
/// the candidate is evaluated and then reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub assignment: ParameterAssignment,
    pub fitness: Option<f64>,
    pub objective_scores: Option<Vec<f64>>,
    pub metrics: Option<BacktestResult>,
    pub state: EvaluationState,
}

impl Candidate {
    pub fn new(assignment: ParameterAssignment) -> Self {
        Self {
            assignment,
            fitness: None,
            objective_scores: None,
            metrics: None,
            state: EvaluationState::Pending,
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.state != EvaluationState::Pending
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, EvaluationState::Failed { .. })
    }

    pub fn fitness_or_penalty(&self) -> f64 {
        self.fitness.unwrap_or(PENALTY_SCORE)
    }

    /// Objective vector, or the penalty in every slot when unscored
    pub fn objectives_or_penalty(&self, count: usize) -> Vec<f64> {
        self.objective_scores
            .clone()
            .unwrap_or_else(|| vec![PENALTY_SCORE; count])
    }
}

/// Sort candidates by fitness, best first
pub fn sort_by_fitness_desc(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.fitness_or_penalty()
            .partial_cmp(&a.fitness_or_penalty())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::parameter_space::{ParamKey, ParamValue};

    #[test]
    fn test_unscored_candidate_gets_penalty() {
        let candidate = Candidate::new(ParameterAssignment::new());
        assert!(!candidate.is_evaluated());
        assert_eq!(candidate.fitness_or_penalty(), PENALTY_SCORE);
        assert_eq!(candidate.objectives_or_penalty(2), vec![PENALTY_SCORE; 2]);
    }

    #[test]
    fn test_sort_by_fitness_puts_best_first() {
        let key = ParamKey::new("sma", "fast");
        let mut candidates: Vec<Candidate> = [0.2, 0.9, 0.5]
            .iter()
            .map(|f| {
                let mut c = Candidate::new(
                    ParameterAssignment::new().with(key.clone(), ParamValue::Number(*f)),
                );
                c.fitness = Some(*f);
                c.state = EvaluationState::Completed;
                c
            })
            .collect();
        candidates.push(Candidate::new(ParameterAssignment::new()));

        sort_by_fitness_desc(&mut candidates);

        assert_eq!(candidates[0].fitness, Some(0.9));
        assert_eq!(candidates[3].fitness, None);
    }
}

use std::sync::{Arc, Mutex};
use strategy_tuner::application::optimization::{
    CancellationToken, OptimizationRequest, OptimizeEngine,
};
use strategy_tuner::config::OptimizationConfig;
use strategy_tuner::domain::optimization::pareto::dominates;
use strategy_tuner::domain::optimization::{
    Algorithm, ObjectiveDefinition, ParamKey, ParameterAssignment, ParameterSpace, ParameterSpec,
    RunStatus,
};
use strategy_tuner::domain::performance::{BacktestResult, Metric};
use strategy_tuner::domain::ports::{FitnessEvaluator, Scenario};
use strategy_tuner::infrastructure::mock::{
    CancellingEvaluator, FailingEvaluator, SyntheticEvaluator,
};

// --- Helpers ---

fn period_key() -> ParamKey {
    ParamKey::new("rsi", "period")
}

fn period_space() -> ParameterSpace {
    ParameterSpace::new(vec![ParameterSpec::continuous("rsi", "period", 2.0, 50.0)]).unwrap()
}

/// Return peaks at period = 14
fn peaked() -> SyntheticEvaluator {
    SyntheticEvaluator::new(80.0).with_peak(period_key(), 14.0, 3.0)
}

fn return_objective() -> Vec<ObjectiveDefinition> {
    vec![ObjectiveDefinition::maximize(Metric::TotalReturn, 1.0)]
}

fn request(space: ParameterSpace) -> OptimizationRequest {
    OptimizationRequest::new(space, return_objective(), Scenario::new("BTC/USD 2024").with_seed(7))
}

fn three_parameter_space() -> ParameterSpace {
    ParameterSpace::new(vec![
        ParameterSpec::discrete("a", "alpha", 1.0, 3.0, 1.0),
        ParameterSpec::categorical("b", "beta", &["x", "y"]),
        ParameterSpec::discrete("c", "gamma", 0.0, 1.0, 0.5),
    ])
    .unwrap()
}

/// Records the assignments it is asked to evaluate, in call order
fn recording_evaluator(log: Arc<Mutex<Vec<String>>>) -> Arc<dyn FitnessEvaluator> {
    Arc::new(
        move |a: &ParameterAssignment, _: &Scenario| -> anyhow::Result<BacktestResult> {
            log.lock().unwrap().push(a.to_string());
            let alpha = a.number_of("a", "alpha").unwrap_or(0.0);
            let gamma = a.number_of("c", "gamma").unwrap_or(0.0);
            Ok(BacktestResult {
                total_return_pct: 10.0 * alpha - 5.0 * gamma,
                ..Default::default()
            })
        },
    )
}

// --- Scenarios ---

#[test]
fn test_genetic_converges_to_period_peak() {
    let mut config = OptimizationConfig::default()
        .with_algorithm(Algorithm::Genetic)
        .with_seed(2024);
    config.genetic.population_size = 50;
    config.genetic.generations = 100;
    config.budget.max_iterations = 100;
    let engine = OptimizeEngine::new(config, Arc::new(peaked()));

    let result = engine.optimize(&request(period_space()));

    assert!(result.success, "status {:?}", result.status);
    let period = result.best_assignment().unwrap().number(&period_key()).unwrap();
    assert!((period - 14.0).abs() <= 2.0, "best period {}", period);
    assert!(result.iterations <= 100);
    assert!(result.top_candidates.len() <= 10);
}

#[test]
fn test_grid_evaluates_budget_in_lexicographic_order() {
    let run = || {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut config = OptimizationConfig::default()
            .with_algorithm(Algorithm::Grid)
            .with_max_iterations(7);
        config.batch_size = 1;
        let engine = OptimizeEngine::new(config, recording_evaluator(log.clone()));
        let result = engine.optimize(&request(three_parameter_space()));
        let calls = log.lock().unwrap().clone();
        (result, calls)
    };

    let (first, calls) = run();
    assert_eq!(first.status, RunStatus::BudgetExhausted);
    assert_eq!(first.evaluations, 7);
    assert_eq!(
        calls,
        vec![
            "{a/alpha=1, b/beta=x, c/gamma=0}",
            "{a/alpha=1, b/beta=x, c/gamma=0.5}",
            "{a/alpha=1, b/beta=x, c/gamma=1}",
            "{a/alpha=1, b/beta=y, c/gamma=0}",
            "{a/alpha=1, b/beta=y, c/gamma=0.5}",
            "{a/alpha=1, b/beta=y, c/gamma=1}",
            "{a/alpha=2, b/beta=x, c/gamma=0}",
        ]
    );

    let (second, repeat_calls) = run();
    assert_eq!(calls, repeat_calls);
    assert_eq!(first.best, second.best);
    assert_eq!(first.top_candidates, second.top_candidates);
    let scores = |r: &strategy_tuner::domain::optimization::OptimizationResult| {
        r.history.iter().map(|h| h.best_score.to_bits()).collect::<Vec<_>>()
    };
    assert_eq!(scores(&first), scores(&second));
}

#[test]
fn test_small_grid_is_exhausted_and_converges() {
    let config = OptimizationConfig::default()
        .with_algorithm(Algorithm::Grid)
        .with_max_iterations(100);
    let engine = OptimizeEngine::new(config, recording_evaluator(Arc::new(Mutex::new(Vec::new()))));

    let result = engine.optimize(&request(three_parameter_space()));
    assert_eq!(result.status, RunStatus::Converged);
    assert_eq!(result.evaluations, 18);
    let best = result.best_assignment().unwrap();
    assert_eq!(best.number_of("a", "alpha"), Some(3.0));
    assert_eq!(best.number_of("c", "gamma"), Some(0.0));
}

#[test]
fn test_cancelled_particle_swarm_keeps_best_so_far() {
    let token = CancellationToken::new();
    let evaluator = CancellingEvaluator::new(Arc::new(peaked()), token.clone(), 45);
    let mut config = OptimizationConfig::default()
        .with_algorithm(Algorithm::ParticleSwarm)
        .with_max_iterations(1_000);
    config.swarm.swarm_size = 20;
    config.cache.enabled = false;
    let engine = OptimizeEngine::new(config, Arc::new(evaluator));

    let result = engine.optimize_cancellable(&request(period_space()), &token);

    assert!(token.is_cancelled());
    assert_eq!(result.status, RunStatus::BudgetExhausted);
    assert!(result.success);
    assert!(result.best.is_some());
    assert_eq!(result.iterations, 3);
    assert_eq!(result.evaluations, 60);
}

#[test]
fn test_empty_space_is_configuration_error_for_every_algorithm() {
    let fixed_only = ParameterSpace::new(vec![ParameterSpec::continuous("rsi", "period", 14.0, 14.0)]).unwrap();
    for space in [ParameterSpace::empty(), fixed_only] {
        for algorithm in Algorithm::ALL {
            let evaluator = peaked();
            let config = OptimizationConfig::default().with_algorithm(algorithm);
            let engine = OptimizeEngine::new(config, Arc::new(evaluator.clone()));

            let result = engine.optimize(&request(space.clone()));
            assert!(!result.success);
            assert_eq!(result.status, RunStatus::ConfigurationError);
            assert_eq!(result.iterations, 0);
            assert_eq!(result.algorithm, algorithm);
            assert_eq!(evaluator.calls(), 0);
        }
    }
}

#[test]
fn test_every_algorithm_improves_on_the_penalty() {
    for algorithm in Algorithm::ALL {
        let mut config = OptimizationConfig::default()
            .with_algorithm(algorithm)
            .with_max_iterations(40);
        config.genetic.population_size = 12;
        config.swarm.swarm_size = 8;
        let engine = OptimizeEngine::new(config, Arc::new(peaked()));

        let result = engine.optimize(&request(period_space()));
        assert!(result.success, "{} ended {:?}", algorithm, result.failure_reason);
        assert!(result.best_score().unwrap() > 0.0, "{}", algorithm);
        assert_eq!(result.history.len(), result.iterations);
    }
}

#[test]
fn test_multi_objective_genetic_returns_pareto_front() {
    let evaluator = SyntheticEvaluator::new(80.0)
        .with_peak(period_key(), 40.0, 4.0)
        .with_drawdown_slope(period_key(), 1.0);
    let mut config = OptimizationConfig::default()
        .with_algorithm(Algorithm::Genetic)
        .with_max_iterations(20);
    config.genetic.population_size = 24;
    let engine = OptimizeEngine::new(config, Arc::new(evaluator));
    let request = OptimizationRequest::new(
        period_space(),
        vec![
            ObjectiveDefinition::maximize(Metric::TotalReturn, 1.0),
            ObjectiveDefinition::minimize(Metric::MaxDrawdown, 1.0),
        ],
        Scenario::new("synthetic"),
    );

    let result = engine.optimize(&request);
    assert!(result.success);
    assert_eq!(result.algorithm, Algorithm::Nsga2);
    assert!(result.pareto_front.len() > 1);
    for a in &result.pareto_front {
        assert_eq!(a.objective_scores.len(), 2);
        for b in &result.pareto_front {
            assert!(!dominates(&a.objective_scores, &b.objective_scores));
        }
    }
}

#[test]
fn test_partial_failures_do_not_fail_the_run() {
    let evaluator = peaked().with_failure_above(period_key(), 30.0);
    let config = OptimizationConfig::default()
        .with_algorithm(Algorithm::Random)
        .with_max_iterations(64);
    let engine = OptimizeEngine::new(config, Arc::new(evaluator));

    let result = engine.optimize(&request(period_space()));
    assert!(result.success);
    assert!(result.failed_evaluations > 0);
    assert!(result.best_assignment().unwrap().number(&period_key()).unwrap() <= 30.0);
}

#[test]
fn test_all_failures_fail_the_run() {
    let config = OptimizationConfig::default().with_algorithm(Algorithm::Genetic);
    let engine = OptimizeEngine::new(config, Arc::new(FailingEvaluator::new("engine offline")));

    let result = engine.optimize(&request(period_space()));
    assert!(!result.success);
    assert_eq!(result.status, RunStatus::Failed);
    assert!(result.failure_reason.unwrap().contains("engine offline"));
    assert!(result.best.is_none());
}

#[test]
fn test_malformed_space_files_never_reach_the_search() {
    let inverted = r#"{"specs": [
        {"owner_id": "rsi", "name": "period", "kind": "continuous", "min": 2.0, "max": 50.0},
        {"owner_id": "sma", "name": "fast", "kind": "discrete", "min": 30.0, "max": 10.0, "step": 1.0}
    ]}"#;
    let err = serde_json::from_str::<ParameterSpace>(inverted).unwrap_err();
    assert!(err.to_string().contains("min 30 > max 10"), "{}", err);

    let no_choices = r#"
        [[specs]]
        owner_id = "rsi"
        name = "period"
        kind = "continuous"
        min = 2.0
        max = 50.0

        [[specs]]
        owner_id = "entry"
        name = "mode"
        kind = "categorical"
        allowed_values = []
    "#;
    let err = toml::from_str::<ParameterSpace>(no_choices).unwrap_err();
    assert!(err.to_string().contains("entry/mode"), "{}", err);

    // The same file with a usable categorical loads and optimizes normally
    let space: ParameterSpace =
        toml::from_str(&no_choices.replace("allowed_values = []", r#"allowed_values = ["ema", "sma"]"#))
            .unwrap();
    for algorithm in [Algorithm::Random, Algorithm::Genetic] {
        let config = OptimizationConfig::default()
            .with_algorithm(algorithm)
            .with_max_iterations(10);
        let engine = OptimizeEngine::new(config, Arc::new(peaked()));
        let result = engine.optimize(&request(space.clone()));
        assert!(result.success, "{} ended {:?}", algorithm, result.failure_reason);
    }
}

#[test]
fn test_wide_grid_axis_respects_a_small_budget() {
    let space = ParameterSpace::new(vec![ParameterSpec::discrete("a", "x", 0.0, 1e18, 1.0)]).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut config = OptimizationConfig::default()
        .with_algorithm(Algorithm::Grid)
        .with_max_iterations(5);
    config.batch_size = 1;
    let engine = OptimizeEngine::new(config, recording_evaluator(log.clone()));

    let result = engine.optimize(&request(space));
    assert!(result.success, "{:?}", result.failure_reason);
    assert_eq!(result.status, RunStatus::BudgetExhausted);
    assert_eq!(result.evaluations, 5);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["{a/x=0}", "{a/x=1}", "{a/x=2}", "{a/x=3}", "{a/x=4}"]
    );
}

#[tokio::test]
async fn test_async_annealing_run() {
    let config = OptimizationConfig::default()
        .with_algorithm(Algorithm::SimulatedAnnealing)
        .with_max_iterations(300);
    let engine = OptimizeEngine::new(config, Arc::new(peaked()));

    let result = engine
        .optimize_async(request(period_space()), CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success);
    assert!(result.iterations <= 300);
    assert!(result.best.is_some());
}

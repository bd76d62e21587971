//! Optimization engine: validates a request, runs the configured search
//! strategy and aggregates the outcome.
//!
//! The engine never returns an error for a bad request; configuration errors
//! come back as a result with `status = ConfigurationError`. Use `validate`
//! to surface them synchronously before starting a run.

use crate::application::optimization::aggregator::ResultAggregator;
use crate::application::optimization::cache::ResultCache;
use crate::application::optimization::cancellation::CancellationToken;
use crate::application::optimization::convergence::ConvergenceTracker;
use crate::application::optimization::evaluator::CachedEvaluator;
use crate::application::optimization::strategies::{SearchContext, build_strategy};
use crate::config::OptimizationConfig;
use crate::domain::errors::{ConfigurationError, OptimizationError, RunFailure};
use crate::domain::optimization::{
    Algorithm, ObjectiveDefinition, ObjectiveScorer, OptimizationResult, OptimizationRun,
    ParameterAssignment, ParameterSpace,
};
use crate::domain::ports::{FitnessEvaluator, Scenario};
use crate::infrastructure::observability::OptimizerMetrics;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What to optimize: the space, the objectives and the scenario to evaluate against.
#[derive(Debug, Clone)]
pub struct OptimizationRequest {
    pub space: ParameterSpace,
    pub objectives: Vec<ObjectiveDefinition>,
    pub scenario: Scenario,
    /// Current parameters of the strategy, for the before/after comparison
    pub original: Option<ParameterAssignment>,
}

impl OptimizationRequest {
    pub fn new(
        space: ParameterSpace,
        objectives: Vec<ObjectiveDefinition>,
        scenario: Scenario,
    ) -> Self {
        Self {
            space,
            objectives,
            scenario,
            original: None,
        }
    }

    pub fn with_original(mut self, original: ParameterAssignment) -> Self {
        self.original = Some(original);
        self
    }
}

/// High-level optimization engine that encapsulates evaluation setup and execution.
#[derive(Clone)]
pub struct OptimizeEngine {
    config: OptimizationConfig,
    evaluator: Arc<dyn FitnessEvaluator>,
    cache: Option<Arc<ResultCache>>,
    metrics: Option<OptimizerMetrics>,
}

impl OptimizeEngine {
    /// Creates an engine; a private result cache is allocated when enabled in config.
    pub fn new(config: OptimizationConfig, evaluator: Arc<dyn FitnessEvaluator>) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResultCache::new(config.cache.max_entries)));
        Self {
            config,
            evaluator,
            cache,
            metrics: None,
        }
    }

    /// Share a cache between engines or runs
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: OptimizerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &OptimizationConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    /// Check config, space and objectives without evaluating anything
    pub fn validate(
        &self,
        space: &ParameterSpace,
        objectives: &[ObjectiveDefinition],
    ) -> Result<(Algorithm, ObjectiveScorer), ConfigurationError> {
        self.config.validate()?;
        let algorithm = self.config.algorithm()?;
        space.validate()?;
        space.ensure_optimizable()?;
        let scorer = ObjectiveScorer::new(objectives.to_vec())?;
        Ok((algorithm, scorer))
    }

    pub fn optimize(&self, request: &OptimizationRequest) -> OptimizationResult {
        self.optimize_cancellable(request, &CancellationToken::new())
    }

    /// Run to completion or until `token` is cancelled; cancellation keeps the best so far.
    pub fn optimize_cancellable(
        &self,
        request: &OptimizationRequest,
        token: &CancellationToken,
    ) -> OptimizationResult {
        let requested = self.config.algorithm().unwrap_or_default();
        let (algorithm, scorer) = match self.validate(&request.space, &request.objectives) {
            Ok(validated) => validated,
            Err(e) => {
                warn!("OptimizeEngine: Rejected {} request: {}", requested, e);
                return self.finish(OptimizationResult::configuration_error(requested, e.to_string()));
            }
        };

        let evaluator = match self.build_evaluator(&request.scenario, scorer) {
            Ok(evaluator) => evaluator,
            Err(e) => {
                warn!("OptimizeEngine: Could not prepare evaluation: {:#}", e);
                return self.finish(OptimizationResult::configuration_error(algorithm, format!("{:#}", e)));
            }
        };

        let multi_objective = evaluator.scorer().is_multi_objective();
        let mut strategy = build_strategy(algorithm, multi_objective, &self.config);
        let tracker = ConvergenceTracker::new(
            strategy.convergence_mode(),
            strategy.iteration_budget(&self.config),
            &self.config.convergence,
            self.config.budget.max_duration(),
            token.clone(),
        );
        let run = OptimizationRun::new(strategy.algorithm());
        info!(
            "OptimizeEngine: Starting {} run {} over {} parameters ({} objectives, seed {})",
            run.algorithm,
            run.run_id,
            request.space.len(),
            evaluator.scorer().len(),
            self.config.seed
        );

        let hits_before = self.cache.as_ref().map_or(0, |c| c.hits());
        let mut ctx = SearchContext::new(
            &request.space,
            &self.config,
            &evaluator,
            StdRng::seed_from_u64(self.config.seed),
            run,
            tracker,
        )
        .with_metrics(self.metrics.clone());

        let outcome = strategy.optimize(&mut ctx);
        let cache_hits = self.cache.as_ref().map_or(0, |c| c.hits()) - hits_before;

        let aggregator = ResultAggregator::new(self.config.top_n);
        let mut result = aggregator.aggregate(ctx, outcome, cache_hits);
        if let (Some(original), Some(best)) = (&request.original, &result.best) {
            result.comparison = Some(aggregator.compare(&evaluator, &request.space, original, best));
        }

        info!(
            "OptimizeEngine: {} run {} finished: {} after {} iterations, {} evaluations ({} failed, {} cache hits) in {}ms, best score {:?}",
            result.algorithm,
            result.run_id,
            result.status.as_str(),
            result.iterations,
            result.evaluations,
            result.failed_evaluations,
            result.cache_hits,
            result.duration_ms,
            result.best_score()
        );
        self.finish(result)
    }

    /// Run on the blocking pool for async callers.
    ///
    /// Configuration errors still come back as a result; `Err` means the
    /// blocking task itself was lost.
    pub async fn optimize_async(
        &self,
        request: OptimizationRequest,
        token: CancellationToken,
    ) -> Result<OptimizationResult, OptimizationError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.optimize_cancellable(&request, &token))
            .await
            .map_err(|e| {
                error!("OptimizeEngine: Optimization task aborted: {}", e);
                RunFailure::new(format!("optimization task aborted: {}", e)).into()
            })
    }

    fn build_evaluator(&self, scenario: &Scenario, scorer: ObjectiveScorer) -> Result<CachedEvaluator> {
        let mut evaluator = CachedEvaluator::new(self.evaluator.clone(), scenario.clone(), scorer);
        if let Some(cache) = &self.cache {
            evaluator = evaluator.with_cache(cache.clone());
        }
        if let Some(metrics) = &self.metrics {
            evaluator = evaluator.with_metrics(metrics.clone());
        }
        if let Some(workers) = self.config.max_workers {
            evaluator = evaluator
                .with_workers(workers)
                .context("Failed to build evaluation worker pool")?;
        }
        Ok(evaluator)
    }

    fn finish(&self, result: OptimizationResult) -> OptimizationResult {
        if let Some(metrics) = &self.metrics {
            metrics.observe_run(
                result.algorithm.as_str(),
                result.status.as_str(),
                result.duration_ms as f64 / 1000.0,
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{ParamKey, ParamValue, ParameterSpec, RunStatus};
    use crate::domain::performance::{BacktestResult, Metric};

    fn peaked(a: &ParameterAssignment, _: &Scenario) -> anyhow::Result<BacktestResult> {
        let period = a.number_of("rsi", "period").unwrap_or(0.0);
        Ok(BacktestResult {
            total_return_pct: 80.0 - (period - 14.0).powi(2) / 10.0,
            ..Default::default()
        })
    }

    fn request() -> OptimizationRequest {
        OptimizationRequest::new(
            ParameterSpace::new(vec![ParameterSpec::continuous("rsi", "period", 2.0, 50.0)]).unwrap(),
            vec![ObjectiveDefinition::maximize(Metric::TotalReturn, 1.0)],
            Scenario::new("synthetic"),
        )
    }

    #[test]
    fn test_validate_reports_configuration_errors() {
        let engine = OptimizeEngine::new(OptimizationConfig::default(), Arc::new(peaked));
        let empty = ParameterSpace::empty();
        assert_eq!(
            engine.validate(&empty, &request().objectives).unwrap_err(),
            ConfigurationError::NoOptimizableParameters
        );
        assert_eq!(
            engine.validate(&request().space, &[]).unwrap_err(),
            ConfigurationError::NoObjectives
        );

        let mut config = OptimizationConfig::default();
        config.algorithm = "hill_climbing".to_string();
        let engine = OptimizeEngine::new(config, Arc::new(peaked));
        assert!(matches!(
            engine.validate(&request().space, &request().objectives),
            Err(ConfigurationError::UnknownAlgorithm { .. })
        ));
    }

    #[tokio::test]
    async fn test_async_configuration_error_is_a_result() {
        let engine = OptimizeEngine::new(OptimizationConfig::default(), Arc::new(peaked));
        let mut request = request();
        request.space = ParameterSpace::empty();

        let outcome: Result<OptimizationResult, OptimizationError> =
            engine.optimize_async(request, CancellationToken::new()).await;
        let result = outcome.unwrap();
        assert_eq!(result.status, RunStatus::ConfigurationError);
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_zero_weight_yields_configuration_error_result() {
        let engine = OptimizeEngine::new(OptimizationConfig::default(), Arc::new(peaked));
        let mut request = request();
        request.objectives = vec![ObjectiveDefinition::maximize(Metric::TotalReturn, 0.0)];

        let result = engine.optimize(&request);
        assert!(!result.success);
        assert_eq!(result.status, RunStatus::ConfigurationError);
        assert_eq!(result.iterations, 0);
        assert!(result.failure_reason.unwrap().contains("weights"));
    }

    #[test]
    fn test_random_run_with_comparison() {
        let config = OptimizationConfig::default()
            .with_algorithm(Algorithm::Random)
            .with_max_iterations(64);
        let engine = OptimizeEngine::new(config, Arc::new(peaked));
        let request = request()
            .with_original(ParameterAssignment::new().with(ParamKey::new("rsi", "period"), ParamValue::Number(40.0)));

        let result = engine.optimize(&request);
        assert!(result.success);
        assert_eq!(result.evaluations, 64);
        assert_eq!(result.history.len(), result.iterations);
        let comparison = result.comparison.unwrap();
        assert!(comparison.optimized_score >= comparison.original_score);
        assert!(!comparison.parameter_changes.is_empty());
    }

    #[test]
    fn test_shared_cache_serves_repeat_runs() {
        let config = OptimizationConfig::default()
            .with_algorithm(Algorithm::Grid)
            .with_max_iterations(10);
        let engine = OptimizeEngine::new(config, Arc::new(peaked));

        let first = engine.optimize(&request());
        let second = engine.optimize(&request());
        assert_eq!(first.cache_hits, 0);
        assert_eq!(second.cache_hits, 10);
        assert_eq!(first.best_assignment(), second.best_assignment());
    }

    #[test]
    fn test_metrics_record_runs() {
        let metrics = OptimizerMetrics::new().unwrap();
        let config = OptimizationConfig::default()
            .with_algorithm(Algorithm::Random)
            .with_max_iterations(8);
        let engine = OptimizeEngine::new(config, Arc::new(peaked)).with_metrics(metrics.clone());

        engine.optimize(&request());
        let text = metrics.gather_text();
        assert!(text.contains("strategy_tuner_runs_total"));
        assert!(text.contains("budget-exhausted"));
    }
}

//! Prometheus metrics definitions for the strategy tuner
//!
//! All metrics use the `strategy_tuner_` prefix and live on a private
//! registry owned by `OptimizerMetrics`.

use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics for optimization runs
#[derive(Clone)]
pub struct OptimizerMetrics {
    registry: Arc<Registry>,
    /// Candidate evaluations by outcome (ok, failed, infeasible)
    pub evaluations_total: CounterVec,
    /// Result cache lookups by result (hit, miss)
    pub cache_lookups_total: CounterVec,
    /// Recorded iterations or generations per algorithm
    pub iterations_total: CounterVec,
    /// Best score of the latest iteration per algorithm
    pub best_score: GaugeVec,
    /// Wall-clock duration of finished runs
    pub run_duration_seconds: HistogramVec,
    /// Finished runs by algorithm and terminal status
    pub runs_total: CounterVec,
}

impl OptimizerMetrics {
    /// Create a new metrics set with every collector registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let evaluations_total = CounterVec::new(
            Opts::new(
                "strategy_tuner_evaluations_total",
                "Candidate evaluations by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(evaluations_total.clone()))?;

        let cache_lookups_total = CounterVec::new(
            Opts::new(
                "strategy_tuner_cache_lookups_total",
                "Result cache lookups by result",
            ),
            &["result"],
        )?;
        registry.register(Box::new(cache_lookups_total.clone()))?;

        let iterations_total = CounterVec::new(
            Opts::new(
                "strategy_tuner_iterations_total",
                "Recorded search iterations",
            ),
            &["algorithm"],
        )?;
        registry.register(Box::new(iterations_total.clone()))?;

        let best_score = GaugeVec::new(
            Opts::new(
                "strategy_tuner_best_score",
                "Best score seen by the current run",
            ),
            &["algorithm"],
        )?;
        registry.register(Box::new(best_score.clone()))?;

        let run_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "strategy_tuner_run_duration_seconds",
                "Optimization run duration in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0]),
            &["algorithm"],
        )?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        let runs_total = CounterVec::new(
            Opts::new(
                "strategy_tuner_runs_total",
                "Finished optimization runs by status",
            ),
            &["algorithm", "status"],
        )?;
        registry.register(Box::new(runs_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            evaluations_total,
            cache_lookups_total,
            iterations_total,
            best_score,
            run_duration_seconds,
            runs_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all metrics in Prometheus text format
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_evaluation(&self, outcome: &str) {
        self.evaluations_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_cache_lookup(&self, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_lookups_total.with_label_values(&[result]).inc();
    }

    pub fn observe_iteration(&self, algorithm: &str, best_score: f64) {
        self.iterations_total.with_label_values(&[algorithm]).inc();
        self.best_score.with_label_values(&[algorithm]).set(best_score);
    }

    pub fn observe_run(&self, algorithm: &str, status: &str, duration_secs: f64) {
        self.runs_total.with_label_values(&[algorithm, status]).inc();
        self.run_duration_seconds
            .with_label_values(&[algorithm])
            .observe(duration_secs);
    }
}

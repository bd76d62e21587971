//! Reporting utilities for optimization results.
//!
//! Provides a formatted text summary, JSON export of the full result and CSV
//! export of the convergence history.

use crate::domain::optimization::OptimizationResult;
use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Reporter for optimization results output.
pub struct OptimizeReporter {
    output_dir: PathBuf,
}

impl OptimizeReporter {
    /// Creates a new reporter with the given output directory.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Human-readable summary: status, best assignment, top candidates and comparison.
    pub fn format_summary(&self, result: &OptimizationResult) -> String {
        let mut out = String::new();
        if let Err(e) = Self::write_summary(&mut out, result) {
            warn!("OptimizeReporter: Summary truncated: {}", e);
        }
        out
    }

    fn write_summary(out: &mut impl fmt::Write, result: &OptimizationResult) -> fmt::Result {
        let rule = "=".repeat(80);
        writeln!(out, "{}", rule)?;
        writeln!(
            out,
            "OPTIMIZATION {} - {} ({})",
            if result.success { "COMPLETE" } else { "FAILED" },
            result.algorithm,
            result.status.as_str()
        )?;
        writeln!(out, "{}", rule)?;
        writeln!(out, "Run:          {}", result.run_id)?;
        writeln!(
            out,
            "Iterations:   {} ({} evaluations, {} failed, {} infeasible, {} cache hits)",
            result.iterations,
            result.evaluations,
            result.failed_evaluations,
            result.infeasible_evaluations,
            result.cache_hits
        )?;
        writeln!(out, "Duration:     {}ms", result.duration_ms)?;
        if let Some(reason) = &result.failure_reason {
            writeln!(out, "Reason:       {}", reason)?;
        }

        if let Some(best) = &result.best {
            writeln!(out, "\nBEST CONFIGURATION (score {:.4}):", best.score)?;
            for (key, value) in best.assignment.iter() {
                writeln!(out, "  {:<28} {}", key.to_string(), value)?;
            }
        }

        if !result.pareto_front.is_empty() {
            writeln!(out, "\nPARETO FRONT ({} candidates):", result.pareto_front.len())?;
            for scored in &result.pareto_front {
                let objectives: Vec<String> =
                    scored.objective_scores.iter().map(|s| format!("{:.4}", s)).collect();
                writeln!(out, "  [{}] {}", objectives.join(", "), scored.assignment)?;
            }
        }

        if !result.top_candidates.is_empty() {
            writeln!(out, "\n{:<4} | {:>8} | Parameters", "#", "Score")?;
            writeln!(out, "{}", "-".repeat(80))?;
            for (i, scored) in result.top_candidates.iter().enumerate() {
                writeln!(out, "{:<4} | {:>8.4} | {}", i + 1, scored.score, scored.assignment)?;
            }
        }

        if let Some(comparison) = &result.comparison {
            let improvement = comparison
                .improvement_pct
                .map_or_else(|| "n/a".to_string(), |p| format!("{:+.2}%", p));
            writeln!(
                out,
                "\nRECOMMENDATION: score {:.4} -> {:.4} ({})",
                comparison.original_score, comparison.optimized_score, improvement
            )?;
            for change in &comparison.parameter_changes {
                let from = change
                    .from
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string);
                writeln!(out, "  {:<28} {} -> {}", change.key.to_string(), from, change.to)?;
            }
            for (metric, delta) in comparison.metric_deltas.iter().filter(|(_, d)| **d != 0.0) {
                writeln!(out, "  {:<28} {:+.4}", metric, delta)?;
            }
        }
        writeln!(out, "{}", rule)
    }

    pub fn print_summary(&self, result: &OptimizationResult) {
        println!("{}", self.format_summary(result));
    }

    /// Exports the result to a JSON file.
    pub fn export_json(&self, result: &OptimizationResult, filename: &str) -> Result<PathBuf> {
        let output_path = self.resolve(filename)?;
        let json_output =
            serde_json::to_string_pretty(result).context("Failed to serialize result to JSON")?;
        std::fs::write(&output_path, json_output)
            .with_context(|| format!("Failed to write result to {}", output_path.display()))?;

        info!("OptimizeReporter: Result saved to {}", output_path.display());
        Ok(output_path)
    }

    /// Exports the convergence history, one row per iteration, to a CSV file.
    pub fn export_history_csv(&self, result: &OptimizationResult, filename: &str) -> Result<PathBuf> {
        let output_path = self.resolve(filename)?;
        let mut writer = csv::Writer::from_path(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        for record in &result.history {
            writer
                .serialize(record)
                .context("Failed to write history record")?;
        }
        writer.flush().context("Failed to flush history CSV")?;

        info!(
            "OptimizeReporter: {} history rows saved to {}",
            result.history.len(),
            output_path.display()
        );
        Ok(output_path)
    }

    /// Bare file names land in the output directory; paths are used as given
    fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let path = Path::new(filename);
        let output_path = if path.components().count() > 1 {
            path.to_path_buf()
        } else {
            self.output_dir.join(path)
        };
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(output_path)
    }
}

impl Default for OptimizeReporter {
    fn default() -> Self {
        Self::new(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::{
        Algorithm, IterationRecord, ParamKey, ParamValue, ParameterAssignment, ScoredAssignment,
    };

    fn sample_result() -> OptimizationResult {
        let mut result = OptimizationResult::configuration_error(Algorithm::Genetic, String::new());
        result.status = crate::domain::optimization::RunStatus::Converged;
        result.success = true;
        result.failure_reason = None;
        result.best = Some(ScoredAssignment {
            assignment: ParameterAssignment::new()
                .with(ParamKey::new("rsi", "period"), ParamValue::Number(14.0)),
            score: 0.87,
            objective_scores: vec![0.87],
            metrics: None,
        });
        result.history = (1..=3)
            .map(|i| IterationRecord {
                iteration: i,
                best_score: 0.5 + i as f64 / 10.0,
                mean_score: 0.4,
                score_variance: 0.01,
                evaluations: i * 10,
                elapsed_ms: i as u64,
            })
            .collect();
        result.iterations = 3;
        result
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("strategy-tuner-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_summary_mentions_best_parameters() {
        let summary = OptimizeReporter::default().format_summary(&sample_result());
        assert!(summary.contains("OPTIMIZATION COMPLETE - genetic (converged)"));
        assert!(summary.contains("rsi/period"));
        assert!(summary.contains("0.8700"));
    }

    #[test]
    fn test_summary_writer_errors_propagate() {
        struct Closed;
        impl fmt::Write for Closed {
            fn write_str(&mut self, _: &str) -> fmt::Result {
                Err(fmt::Error)
            }
        }
        assert!(OptimizeReporter::write_summary(&mut Closed, &sample_result()).is_err());
    }

    #[test]
    fn test_exports_json_and_history_csv() {
        let dir = scratch_dir();
        let reporter = OptimizeReporter::new(&dir);
        let result = sample_result();

        let json_path = reporter.export_json(&result, "result.json").unwrap();
        let parsed: OptimizationResult =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed.iterations, 3);
        assert_eq!(parsed.best_score(), Some(0.87));

        let csv_path = reporter.export_history_csv(&result, "history.csv").unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "iteration");
        assert_eq!(reader.records().count(), 3);

        std::fs::remove_dir_all(dir).unwrap();
    }
}

//! Deterministic fitness evaluators standing in for a real backtest engine.

use crate::application::optimization::cancellation::CancellationToken;
use crate::domain::optimization::{ParamKey, ParameterAssignment};
use crate::domain::performance::BacktestResult;
use crate::domain::ports::{FitnessEvaluator, Scenario};
use anyhow::{Result, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone)]
struct Peak {
    key: ParamKey,
    target: f64,
    width: f64,
}

/// Quadratic return surface with one peak per registered parameter.
///
/// `total_return_pct = peak_return - sum(((v - target) / width)^2)`. An
/// optional drawdown slope makes drawdown grow with one parameter, giving a
/// return/drawdown trade-off for multi-objective runs. Counts every call.
#[derive(Debug, Clone)]
pub struct SyntheticEvaluator {
    peaks: Vec<Peak>,
    peak_return: f64,
    drawdown: Option<(ParamKey, f64)>,
    fail_above: Option<(ParamKey, f64)>,
    calls: Arc<AtomicUsize>,
}

impl SyntheticEvaluator {
    pub fn new(peak_return: f64) -> Self {
        Self {
            peaks: Vec::new(),
            peak_return,
            drawdown: None,
            fail_above: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Return falls by 1 point when `key` is `width` away from `target`
    pub fn with_peak(mut self, key: ParamKey, target: f64, width: f64) -> Self {
        self.peaks.push(Peak { key, target, width });
        self
    }

    /// `max_drawdown_pct = slope * value(key)`
    pub fn with_drawdown_slope(mut self, key: ParamKey, slope: f64) -> Self {
        self.drawdown = Some((key, slope));
        self
    }

    /// Evaluation errors whenever `key` exceeds `threshold`
    pub fn with_failure_above(mut self, key: ParamKey, threshold: f64) -> Self {
        self.fail_above = Some((key, threshold));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FitnessEvaluator for SyntheticEvaluator {
    fn evaluate(&self, assignment: &ParameterAssignment, _scenario: &Scenario) -> Result<BacktestResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some((key, threshold)) = &self.fail_above
            && assignment.number(key).is_some_and(|v| v > *threshold)
        {
            bail!("backtest rejected {} above {}", key, threshold);
        }

        let penalty: f64 = self
            .peaks
            .iter()
            .map(|peak| {
                let value = assignment.number(&peak.key).unwrap_or(peak.target);
                ((value - peak.target) / peak.width).powi(2)
            })
            .sum();
        let total_return_pct = self.peak_return - penalty;
        let max_drawdown_pct = self
            .drawdown
            .as_ref()
            .map_or(10.0, |(key, slope)| slope * assignment.number(key).unwrap_or(0.0));

        Ok(BacktestResult {
            total_return_pct,
            sharpe_ratio: total_return_pct / max_drawdown_pct.max(1.0),
            max_drawdown_pct,
            total_trades: 100,
            win_rate_pct: 50.0,
            profit_factor: 1.5,
            ..Default::default()
        })
    }
}

/// Always fails with the given reason
#[derive(Debug, Clone)]
pub struct FailingEvaluator {
    reason: String,
}

impl FailingEvaluator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FitnessEvaluator for FailingEvaluator {
    fn evaluate(&self, _: &ParameterAssignment, _: &Scenario) -> Result<BacktestResult> {
        bail!("{}", self.reason)
    }
}

/// Delegates to another evaluator and cancels a token after `after` calls,
/// simulating a caller aborting a run mid-iteration.
pub struct CancellingEvaluator {
    inner: Arc<dyn FitnessEvaluator>,
    token: CancellationToken,
    after: usize,
    calls: AtomicUsize,
}

impl CancellingEvaluator {
    pub fn new(inner: Arc<dyn FitnessEvaluator>, token: CancellationToken, after: usize) -> Self {
        Self {
            inner,
            token,
            after,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FitnessEvaluator for CancellingEvaluator {
    fn evaluate(&self, assignment: &ParameterAssignment, scenario: &Scenario) -> Result<BacktestResult> {
        if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        self.inner.evaluate(assignment, scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::optimization::ParamValue;

    fn at(fast: f64, slow: f64) -> ParameterAssignment {
        ParameterAssignment::new()
            .with(ParamKey::new("sma", "fast"), ParamValue::Number(fast))
            .with(ParamKey::new("sma", "slow"), ParamValue::Number(slow))
    }

    #[test]
    fn test_synthetic_surface_peaks_at_targets() {
        let evaluator = SyntheticEvaluator::new(40.0)
            .with_peak(ParamKey::new("sma", "fast"), 10.0, 2.0)
            .with_peak(ParamKey::new("sma", "slow"), 30.0, 5.0);
        let scenario = Scenario::new("synthetic");

        let peak = evaluator.evaluate(&at(10.0, 30.0), &scenario).unwrap();
        let off = evaluator.evaluate(&at(12.0, 35.0), &scenario).unwrap();
        assert_eq!(peak.total_return_pct, 40.0);
        assert_eq!(off.total_return_pct, 38.0);
        assert_eq!(evaluator.calls(), 2);
    }

    #[test]
    fn test_failure_threshold() {
        let evaluator =
            SyntheticEvaluator::new(40.0).with_failure_above(ParamKey::new("sma", "slow"), 50.0);
        let scenario = Scenario::new("synthetic");
        assert!(evaluator.evaluate(&at(10.0, 40.0), &scenario).is_ok());
        assert!(evaluator.evaluate(&at(10.0, 60.0), &scenario).is_err());
        assert!(FailingEvaluator::new("offline").evaluate(&at(1.0, 2.0), &scenario).is_err());
    }

    #[test]
    fn test_cancelling_evaluator_cancels_after_threshold() {
        let token = CancellationToken::new();
        let evaluator = CancellingEvaluator::new(Arc::new(SyntheticEvaluator::new(10.0)), token.clone(), 3);
        let scenario = Scenario::new("synthetic");
        for _ in 0..2 {
            evaluator.evaluate(&at(1.0, 2.0), &scenario).unwrap();
        }
        assert!(!token.is_cancelled());
        evaluator.evaluate(&at(1.0, 2.0), &scenario).unwrap();
        assert!(token.is_cancelled());
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Performance metrics for one parameter assignment over one scenario.
///
/// Produced by the backtest engine behind `FitnessEvaluator`. Percentages are
/// expressed in percent units (12.5 = 12.5%), matching the rest of the
/// reporting stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    // Returns
    pub total_return_pct: f64,

    // Risk-Adjusted Returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,

    // Drawdown
    pub max_drawdown_pct: f64,

    // Trade Statistics
    pub total_trades: usize,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,

    // Consecutive Trades
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
}

impl BacktestResult {
    /// Sentinel recorded for a candidate whose evaluation failed.
    pub fn penalty() -> Self {
        Self {
            total_return_pct: -100.0,
            sharpe_ratio: -10.0,
            sortino_ratio: -10.0,
            calmar_ratio: -10.0,
            max_drawdown_pct: 100.0,
            total_trades: 0,
            win_rate_pct: 0.0,
            profit_factor: 0.0,
            average_win: 0.0,
            average_loss: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::TotalReturn => self.total_return_pct,
            Metric::SharpeRatio => self.sharpe_ratio,
            Metric::SortinoRatio => self.sortino_ratio,
            Metric::CalmarRatio => self.calmar_ratio,
            Metric::MaxDrawdown => self.max_drawdown_pct,
            Metric::TradeCount => self.total_trades as f64,
            Metric::WinRate => self.win_rate_pct,
            Metric::ProfitFactor => self.profit_factor,
            Metric::AverageWin => self.average_win,
            Metric::AverageLoss => self.average_loss,
            Metric::MaxConsecutiveWins => self.max_consecutive_wins as f64,
            Metric::MaxConsecutiveLosses => self.max_consecutive_losses as f64,
        }
    }
}

impl Default for BacktestResult {
    fn default() -> Self {
        Self {
            total_return_pct: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_drawdown_pct: 0.0,
            total_trades: 0,
            win_rate_pct: 0.0,
            profit_factor: 0.0,
            average_win: 0.0,
            average_loss: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
        }
    }
}

/// Named metric of a `BacktestResult`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TotalReturn,
    SharpeRatio,
    SortinoRatio,
    CalmarRatio,
    MaxDrawdown,
    TradeCount,
    WinRate,
    ProfitFactor,
    AverageWin,
    AverageLoss,
    MaxConsecutiveWins,
    MaxConsecutiveLosses,
}

impl Metric {
    pub const ALL: [Metric; 12] = [
        Metric::TotalReturn,
        Metric::SharpeRatio,
        Metric::SortinoRatio,
        Metric::CalmarRatio,
        Metric::MaxDrawdown,
        Metric::TradeCount,
        Metric::WinRate,
        Metric::ProfitFactor,
        Metric::AverageWin,
        Metric::AverageLoss,
        Metric::MaxConsecutiveWins,
        Metric::MaxConsecutiveLosses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::TotalReturn => "total_return",
            Metric::SharpeRatio => "sharpe_ratio",
            Metric::SortinoRatio => "sortino_ratio",
            Metric::CalmarRatio => "calmar_ratio",
            Metric::MaxDrawdown => "max_drawdown",
            Metric::TradeCount => "trade_count",
            Metric::WinRate => "win_rate",
            Metric::ProfitFactor => "profit_factor",
            Metric::AverageWin => "average_win",
            Metric::AverageLoss => "average_loss",
            Metric::MaxConsecutiveWins => "max_consecutive_wins",
            Metric::MaxConsecutiveLosses => "max_consecutive_losses",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "total_return" | "return" => Ok(Metric::TotalReturn),
            "sharpe_ratio" | "sharpe" => Ok(Metric::SharpeRatio),
            "sortino_ratio" | "sortino" => Ok(Metric::SortinoRatio),
            "calmar_ratio" | "calmar" => Ok(Metric::CalmarRatio),
            "max_drawdown" | "drawdown" => Ok(Metric::MaxDrawdown),
            "trade_count" | "total_trades" | "trades" => Ok(Metric::TradeCount),
            "win_rate" => Ok(Metric::WinRate),
            "profit_factor" => Ok(Metric::ProfitFactor),
            "average_win" | "avg_win" => Ok(Metric::AverageWin),
            "average_loss" | "avg_loss" => Ok(Metric::AverageLoss),
            "max_consecutive_wins" => Ok(Metric::MaxConsecutiveWins),
            "max_consecutive_losses" => Ok(Metric::MaxConsecutiveLosses),
            _ => anyhow::bail!("Unknown metric: {}", s),
        }
    }
}

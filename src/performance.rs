use crate::models::*;
use statrs::statistics::Statistics;

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn calculate_performance(
        trades: &[Trade],
        daily_positions: &[DailyPosition],
        initial_cash: f64,
        final_equity: f64,
        risk_free_rate: f64,
        periods_per_year: usize,
    ) -> PerformanceMetrics {
        let equity: Vec<f64> = daily_positions.iter().map(|p| p.equity).collect();

        let total_return = if initial_cash > 0.0 && final_equity.is_finite() {
            (final_equity - initial_cash) / initial_cash
        } else {
            0.0
        };

        let total_trades = trades.len();
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.iter().filter(|t| t.pnl < 0.0).count();
        let (win_rate, avg_trade_return) = if total_trades > 0 {
            let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
            (
                Some(winning_trades as f64 / total_trades as f64),
                Some(total_pnl / total_trades as f64),
            )
        } else {
            (None, None)
        };

        PerformanceMetrics {
            total_return,
            sharpe: Self::calculate_sharpe_ratio(&equity, risk_free_rate, periods_per_year),
            max_drawdown: Self::calculate_max_drawdown(&equity),
            win_rate,
            avg_trade_return,
            total_trades,
            winning_trades,
            losing_trades,
        }
    }

    /// Simple per-period returns of an equity curve. A non-positive base
    /// yields a zero return for that step.
    pub fn period_returns(equity: &[f64]) -> Vec<f64> {
        equity
            .windows(2)
            .map(|window| {
                let prev_value = window[0];
                if prev_value > 0.0 {
                    window[1] / prev_value - 1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Annualized Sharpe ratio from the sample standard deviation of period
    /// returns. `None` with fewer than two returns or zero volatility.
    pub fn calculate_sharpe_ratio(
        equity: &[f64],
        risk_free_rate: f64,
        periods_per_year: usize,
    ) -> Option<f64> {
        let returns = Self::period_returns(equity);
        if returns.len() < 2 || periods_per_year == 0 {
            return None;
        }

        let periods = periods_per_year as f64;
        let mean_return = returns.as_slice().mean();
        let std_dev = returns.as_slice().std_dev();
        if !std_dev.is_finite() || std_dev == 0.0 {
            return None;
        }

        let excess = mean_return - risk_free_rate / periods;
        Some(excess / std_dev * periods.sqrt())
    }

    /// `(equity - running peak) / running peak` for every point.
    pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
        let mut peak = f64::NEG_INFINITY;
        equity
            .iter()
            .map(|&value| {
                peak = peak.max(value);
                if peak > 0.0 {
                    (value - peak) / peak
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Deepest drawdown as a non-positive fraction; 0 for an empty curve.
    pub fn calculate_max_drawdown(equity: &[f64]) -> f64 {
        Self::drawdown_series(equity)
            .into_iter()
            .fold(0.0, f64::min)
    }
}

//! Backtest performance statistics.
//!
//! Sharpe is annualised with a fixed 252 periods per year whatever the bar
//! interval of the replayed series, so it is only comparable between runs on
//! the same interval.

const PERIODS_PER_YEAR: f64 = 252.0;
/// Reported equity curves never exceed this many points.
pub const MAX_EQUITY_POINTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Percentage of winning trades, 0-100.
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
}

impl TradeStats {
    pub fn from_pnls(pnls: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = TradeStats::default();
        for pnl in pnls {
            stats.total_trades += 1;
            if pnl > 0.0 {
                stats.winning_trades += 1;
                stats.gross_profit += pnl;
            } else if pnl < 0.0 {
                stats.losing_trades += 1;
                stats.gross_loss += pnl.abs();
            }
        }

        stats.win_rate = if stats.total_trades > 0 {
            stats.winning_trades as f64 / stats.total_trades as f64 * 100.0
        } else {
            0.0
        };

        // no losing trades: report gross profit rather than infinity
        stats.profit_factor = if stats.gross_loss > 0.0 {
            stats.gross_profit / stats.gross_loss
        } else {
            stats.gross_profit
        };

        stats
    }
}

/// Largest peak-to-trough decline as a percentage of the peak.
pub fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd * 100.0
}

/// Per-period simple returns of an equity curve.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Mean over population standard deviation of per-period returns, times √252.
pub fn sharpe_ratio(equity: &[f64]) -> f64 {
    let returns = period_returns(equity);
    if returns.is_empty() {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    if stddev > 0.0 {
        mean / stddev * PERIODS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Evenly spaced sample of at most `max_points`, always ending on the last value.
pub fn downsample(values: &[f64], max_points: usize) -> Vec<f64> {
    if max_points == 0 || values.is_empty() {
        return Vec::new();
    }
    if values.len() <= max_points {
        return values.to_vec();
    }

    let step = values.len().div_ceil(max_points);
    let mut sampled: Vec<f64> = values.iter().step_by(step).copied().collect();
    let last = values[values.len() - 1];
    if (values.len() - 1) % step != 0 {
        if sampled.len() == max_points {
            sampled.pop();
        }
        sampled.push(last);
    }
    sampled
}

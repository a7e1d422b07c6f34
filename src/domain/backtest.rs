//! Bar-by-bar strategy replay.
//!
//! One position at a time. While a position is open the strategy is not
//! consulted; every later bar first checks the stop against the bar's adverse
//! extreme and then the target against its favourable extreme, so the stop
//! wins when a single bar touches both. Whatever is still open after the last
//! bar is closed at the last close.

use crate::domain::indicator::atr;
use crate::domain::metrics::{self, MAX_EQUITY_POINTS, TradeStats};
use crate::domain::ohlcv::{BarColumns, OhlcvBar};
use crate::domain::position::Position;
use crate::domain::risk::{self, Side};
use crate::domain::strategy::{Strategy, TradeAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trades kept in the serialized result; the rest stay in `all_trades`.
pub const REPORTED_TRADES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Percent of current cash risked per trade.
    pub risk_per_trade_pct: f64,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    /// Percent charged on entry and exit notional.
    pub commission_pct: f64,
    pub allow_short: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade_pct: 2.0,
            atr_period: atr::DEFAULT_PERIOD,
            atr_multiplier: 2.0,
            commission_pct: 0.1,
            allow_short: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub side: Side,
    pub entry_date: DateTime<Utc>,
    pub exit_date: DateTime<Utc>,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Net of commissions.
    pub pnl: f64,
    pub pnl_pct: f64,
    pub commission: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub bars: usize,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<f64>,
    #[serde(skip)]
    pub all_trades: Vec<BacktestTrade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BacktestOutcome {
    Completed(BacktestResult),
    InsufficientData { bars: usize, required: usize },
}

impl BacktestOutcome {
    pub fn result(&self) -> Option<&BacktestResult> {
        match self {
            BacktestOutcome::Completed(r) => Some(r),
            BacktestOutcome::InsufficientData { .. } => None,
        }
    }
}

/// Bars a run needs: the strategy's warmup plus room to enter and exit.
pub fn required_bars(strategy: &dyn Strategy, config: &BacktestConfig) -> usize {
    strategy.warmup().max(config.atr_period) + 2
}

struct Simulation<'a> {
    bars: &'a [OhlcvBar],
    config: &'a BacktestConfig,
    cash: f64,
    position: Option<Position>,
    trades: Vec<BacktestTrade>,
}

impl Simulation<'_> {
    fn commission(&self, notional: f64) -> f64 {
        notional.abs() * self.config.commission_pct / 100.0
    }

    fn equity(&self, price: f64) -> f64 {
        match &self.position {
            Some(pos) => {
                self.cash + pos.quantity * pos.entry_price + pos.unrealized_pnl(price)
            }
            None => self.cash,
        }
    }

    fn open(&mut self, cols: &BarColumns, index: usize, side: Side) {
        let entry = cols.closes[index];
        let start = index.saturating_sub(self.config.atr_period);
        let atr_value = atr(
            &cols.highs[start..=index],
            &cols.lows[start..=index],
            &cols.closes[start..=index],
            self.config.atr_period,
        );
        let levels = risk::atr_stop_targets(entry, atr_value, self.config.atr_multiplier, side);

        let affordable = self.cash / (1.0 + self.config.commission_pct / 100.0);
        let size = match risk::calculate_position_size(
            self.cash,
            self.config.risk_per_trade_pct,
            entry,
            levels.stop_loss,
            Some(affordable),
        ) {
            Ok(size) => size,
            Err(err) => {
                tracing::debug!(index, %err, "entry skipped");
                return;
            }
        };
        if size.quantity <= 0.0 {
            return;
        }

        let notional = size.quantity * entry;
        let commission = self.commission(notional);
        self.cash -= notional + commission;
        tracing::debug!(index, side = side.as_str(), entry, quantity = size.quantity, "position opened");

        self.position = Some(Position {
            side,
            quantity: size.quantity,
            entry_price: entry,
            entry_index: index,
            entry_time: self.bars[index].timestamp,
            stop_loss: levels.stop_loss,
            take_profit: levels.take_profit_2,
            entry_commission: commission,
        });
    }

    fn close(&mut self, index: usize, exit_price: f64, reason: ExitReason) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let exit_commission = self.commission(pos.quantity * exit_price);
        let gross = pos.unrealized_pnl(exit_price);
        let commission = pos.entry_commission + exit_commission;
        let pnl = gross - commission;
        let entry_value = pos.quantity * pos.entry_price;

        self.cash += entry_value + gross - exit_commission;
        tracing::debug!(index, exit_price, pnl, reason = ?reason, "position closed");

        self.trades.push(BacktestTrade {
            side: pos.side,
            entry_date: pos.entry_time,
            exit_date: self.bars[index].timestamp,
            entry_index: pos.entry_index,
            exit_index: index,
            entry_price: pos.entry_price,
            exit_price,
            quantity: pos.quantity,
            stop_loss: pos.stop_loss,
            take_profit: pos.take_profit,
            pnl,
            pnl_pct: if entry_value > 0.0 {
                pnl / entry_value * 100.0
            } else {
                0.0
            },
            commission,
            exit_reason: reason,
        });
    }

    /// Stop first, then target. Returns true when the position was closed.
    fn check_exits(&mut self, index: usize) -> bool {
        let Some(pos) = &self.position else {
            return false;
        };
        if index <= pos.entry_index {
            return false;
        }
        let bar = &self.bars[index];
        let (stop, target) = (pos.stop_loss, pos.take_profit);

        if pos.should_stop_loss(pos.adverse_extreme(bar.high, bar.low)) {
            self.close(index, stop, ExitReason::StopLoss);
            true
        } else if pos.should_take_profit(pos.favourable_extreme(bar.high, bar.low)) {
            self.close(index, target, ExitReason::TakeProfit);
            true
        } else {
            false
        }
    }
}

pub fn run_backtest(
    bars: &[OhlcvBar],
    strategy: &dyn Strategy,
    config: &BacktestConfig,
) -> BacktestOutcome {
    let required = required_bars(strategy, config);
    if bars.len() < required {
        return BacktestOutcome::InsufficientData {
            bars: bars.len(),
            required,
        };
    }

    let cols = BarColumns::from_bars(bars);
    let mut sim = Simulation {
        bars,
        config,
        cash: config.initial_capital,
        position: None,
        trades: Vec::new(),
    };
    let mut equity = Vec::with_capacity(bars.len() + 1);
    equity.push(config.initial_capital);

    let last = bars.len() - 1;
    for index in 0..bars.len() {
        let exited = sim.check_exits(index);

        // no entries on the final bar: nothing left to exit against
        if !exited && sim.position.is_none() && index < last {
            match strategy.generate_signal(&cols, index) {
                Some(TradeAction::Buy) => sim.open(&cols, index, Side::Long),
                Some(TradeAction::Sell) if config.allow_short => {
                    sim.open(&cols, index, Side::Short)
                }
                _ => {}
            }
        }

        equity.push(sim.equity(cols.closes[index]));
    }

    if sim.position.is_some() {
        sim.close(last, cols.closes[last], ExitReason::EndOfData);
        if let Some(point) = equity.last_mut() {
            *point = sim.cash;
        }
    }

    let final_capital = sim.cash;
    let stats = TradeStats::from_pnls(sim.trades.iter().map(|t| t.pnl));
    let all_trades = sim.trades;
    let trades = all_trades[all_trades.len().saturating_sub(REPORTED_TRADES)..].to_vec();

    tracing::info!(
        strategy = strategy.name(),
        bars = bars.len(),
        trades = stats.total_trades,
        final_capital,
        "backtest complete"
    );

    BacktestOutcome::Completed(BacktestResult {
        strategy: strategy.name().to_string(),
        bars: bars.len(),
        initial_capital: config.initial_capital,
        final_capital,
        total_return_pct: if config.initial_capital > 0.0 {
            (final_capital - config.initial_capital) / config.initial_capital * 100.0
        } else {
            0.0
        },
        max_drawdown_pct: metrics::max_drawdown_pct(&equity),
        win_rate: stats.win_rate,
        profit_factor: stats.profit_factor,
        sharpe_ratio: metrics::sharpe_ratio(&equity),
        total_trades: stats.total_trades,
        winning_trades: stats.winning_trades,
        losing_trades: stats.losing_trades,
        trades,
        equity_curve: metrics::downsample(&equity, MAX_EQUITY_POINTS),
        all_trades,
    })
}

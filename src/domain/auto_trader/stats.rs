//! Daily limits bookkeeping and per-user summaries.

use super::trade::AutoTrade;
use crate::domain::metrics::TradeStats;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One user's activity on one UTC calendar day. A new date key starts from
/// zero, which is how the daily limits reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub trades_count: u32,
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    /// Balance at the first touch of the day; the percentage is measured against it.
    pub starting_balance: f64,
}

impl DailyStats {
    pub fn new(date: NaiveDate, starting_balance: f64) -> Self {
        Self {
            date,
            trades_count: 0,
            total_pnl: 0.0,
            total_pnl_percent: 0.0,
            starting_balance,
        }
    }

    pub fn record_open(&mut self) {
        self.trades_count += 1;
    }

    pub fn record_pnl(&mut self, pnl: f64) {
        self.total_pnl += pnl;
        self.total_pnl_percent = if self.starting_balance > 0.0 {
            self.total_pnl / self.starting_balance * 100.0
        } else {
            0.0
        };
    }

    /// Rebuild a day's counters from stored trades. `current_balance` is
    /// unwound through the day's opens and closes to recover the starting
    /// balance. `None` when no trade was opened or closed on `date`.
    pub fn rebuild(date: NaiveDate, current_balance: f64, trades: &[AutoTrade]) -> Option<Self> {
        let mut opened = 0;
        let mut closed = 0;
        let mut net_flow = 0.0;
        let mut pnl = 0.0;
        for trade in trades {
            if trade.created_at.date_naive() == date {
                opened += 1;
                net_flow -= trade.position_value;
            }
            if let (Some(closed_at), Some(trade_pnl)) = (trade.closed_at, trade.pnl)
                && closed_at.date_naive() == date
            {
                closed += 1;
                net_flow += trade.position_value + trade_pnl;
                pnl += trade_pnl;
            }
        }
        if opened == 0 && closed == 0 {
            return None;
        }

        let mut stats = Self::new(date, current_balance - net_flow);
        stats.trades_count = opened;
        stats.record_pnl(pnl);
        Some(stats)
    }

    pub fn within_limits(&self, max_trades: u32, max_loss_pct: f64) -> Result<(), String> {
        if self.trades_count >= max_trades {
            return Err(format!(
                "daily trade limit reached ({}/{})",
                self.trades_count, max_trades
            ));
        }
        if self.total_pnl_percent <= -max_loss_pct {
            return Err(format!(
                "daily loss limit reached ({:.2}% <= -{:.2}%)",
                self.total_pnl_percent, max_loss_pct
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub balance: f64,
    pub open_trades: usize,
    pub closed_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub today: DailyStats,
}

impl UserStats {
    pub fn summarize(
        user_id: &str,
        balance: f64,
        open_trades: usize,
        realized: &[f64],
        today: DailyStats,
    ) -> Self {
        let stats = TradeStats::from_pnls(realized.iter().copied());
        Self {
            user_id: user_id.to_string(),
            balance,
            open_trades,
            closed_trades: stats.total_trades,
            winning_trades: stats.winning_trades,
            losing_trades: stats.losing_trades,
            win_rate: stats.win_rate,
            total_pnl: realized.iter().sum(),
            today,
        }
    }
}

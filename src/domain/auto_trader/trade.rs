//! Simulated trades and the signals that open them.

use crate::domain::risk::Side;
use crate::domain::strategy::TradeAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stop distance used when a signal carries neither a stop price nor a percent.
pub const DEFAULT_STOP_LOSS_PCT: f64 = 2.0;
/// Reward multiple for the default take-profit.
pub const DEFAULT_TAKE_PROFIT_R: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
    StoppedOut,
    TakeProfit,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TradeStatus::Pending | TradeStatus::Open)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    Manual,
}

impl CloseReason {
    pub fn status(self) -> TradeStatus {
        match self {
            CloseReason::StopLoss => TradeStatus::StoppedOut,
            CloseReason::TakeProfit => TradeStatus::TakeProfit,
            CloseReason::Manual => TradeStatus::Closed,
        }
    }
}

/// Live signal handed to the auto trader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub confluence_score: f64,
    #[serde(default)]
    pub stop_loss: Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub stop_loss_percent: Option<f64>,
}

impl TradeSignal {
    pub fn new(action: TradeAction, confluence_score: f64) -> Self {
        Self {
            action,
            confluence_score,
            stop_loss: None,
            take_profit: None,
            stop_loss_percent: None,
        }
    }

    pub fn side(&self) -> Side {
        match self.action {
            TradeAction::Buy => Side::Long,
            TradeAction::Sell => Side::Short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoTrade {
    pub id: Uuid,
    pub user_id: String,
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub position_value: f64,
    pub stop_loss: f64,
    pub take_profit: Option<f64>,
    pub status: TradeStatus,
    pub signal_score: f64,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<f64>,
    pub pnl: Option<f64>,
    pub pnl_percent: Option<f64>,
    pub close_reason: Option<CloseReason>,
}

impl AutoTrade {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    pub fn stop_crossed(&self, price: f64) -> bool {
        match self.side {
            Side::Long => price <= self.stop_loss,
            Side::Short => price >= self.stop_loss,
        }
    }

    pub fn target_crossed(&self, price: f64) -> bool {
        match (self.side, self.take_profit) {
            (Side::Long, Some(tp)) => price >= tp,
            (Side::Short, Some(tp)) => price <= tp,
            (_, None) => false,
        }
    }

    /// Move the stop toward `price` so it sits `pct` percent away, never
    /// loosening it. Returns true when the stop moved.
    pub fn trail_stop(&mut self, price: f64, pct: f64) -> bool {
        let candidate = match self.side {
            Side::Long => price * (1.0 - pct / 100.0),
            Side::Short => price * (1.0 + pct / 100.0),
        };
        let tighter = match self.side {
            Side::Long => candidate > self.stop_loss,
            Side::Short => candidate < self.stop_loss,
        };
        if tighter {
            self.stop_loss = candidate;
        }
        tighter
    }

    /// Transition an open trade to its terminal state. Returns the realised
    /// P&L, or `None` when the trade was already closed.
    pub fn close(&mut self, price: f64, reason: CloseReason, at: DateTime<Utc>) -> Option<f64> {
        if self.status.is_terminal() {
            return None;
        }
        let pnl = self.side.pnl(self.entry_price, price, self.quantity);
        self.status = reason.status();
        self.closed_at = Some(at);
        self.exit_price = Some(price);
        self.pnl = Some(pnl);
        self.pnl_percent = Some(if self.position_value > 0.0 {
            pnl / self.position_value * 100.0
        } else {
            0.0
        });
        self.close_reason = Some(reason);
        Some(pnl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(side: Side, stop: f64, target: Option<f64>) -> AutoTrade {
        AutoTrade {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            symbol: "BTC".into(),
            side,
            entry_price: 100.0,
            quantity: 2.0,
            position_value: 200.0,
            stop_loss: stop,
            take_profit: target,
            status: TradeStatus::Open,
            signal_score: 70.0,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            closed_at: None,
            exit_price: None,
            pnl: None,
            pnl_percent: None,
            close_reason: None,
        }
    }

    #[test]
    fn crossing_checks_by_side() {
        let long = trade(Side::Long, 95.0, Some(110.0));
        assert!(long.stop_crossed(95.0));
        assert!(!long.stop_crossed(96.0));
        assert!(long.target_crossed(110.0));
        assert!(!long.target_crossed(109.0));

        let short = trade(Side::Short, 105.0, Some(90.0));
        assert!(short.stop_crossed(105.5));
        assert!(short.target_crossed(89.0));
        assert!(!short.target_crossed(91.0));
    }

    #[test]
    fn no_target_never_crosses() {
        let long = trade(Side::Long, 95.0, None);
        assert!(!long.target_crossed(1e9));
    }

    #[test]
    fn close_is_terminal_once() {
        let mut t = trade(Side::Short, 105.0, Some(90.0));
        let at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(t.close(90.0, CloseReason::TakeProfit, at), Some(20.0));
        assert_eq!(t.status, TradeStatus::TakeProfit);
        assert_eq!(t.pnl_percent, Some(10.0));
        assert_eq!(t.close(80.0, CloseReason::Manual, at), None);
        assert_eq!(t.exit_price, Some(90.0));
    }

    #[test]
    fn trailing_stop_only_tightens() {
        let mut t = trade(Side::Long, 95.0, None);
        assert!(t.trail_stop(110.0, 2.0));
        assert!((t.stop_loss - 107.8).abs() < 1e-9);
        assert!(!t.trail_stop(105.0, 2.0));
        assert!((t.stop_loss - 107.8).abs() < 1e-9);

        let mut s = trade(Side::Short, 105.0, None);
        assert!(s.trail_stop(90.0, 2.0));
        assert!((s.stop_loss - 91.8).abs() < 1e-9);
        assert!(!s.trail_stop(95.0, 2.0));
    }

    #[test]
    fn signal_side_and_json() {
        let signal: TradeSignal =
            serde_json::from_str(r#"{"action": "SELL", "confluence_score": 72.5}"#).unwrap();
        assert_eq!(signal.side(), Side::Short);
        assert!(signal.stop_loss.is_none());
        assert!(TradeStatus::StoppedOut.is_terminal());
        assert!(!TradeStatus::Open.is_terminal());
    }
}

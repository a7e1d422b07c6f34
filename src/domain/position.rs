//! Open backtest position and its exit checks.

use crate::domain::risk::Side;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Position {
    pub side: Side,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_commission: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Long
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.pnl(self.entry_price, price, self.quantity)
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.stop_loss == 0.0 {
            return false;
        }
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.take_profit == 0.0 {
            return false;
        }
        if self.is_long() {
            price >= self.take_profit
        } else {
            price <= self.take_profit
        }
    }

    /// Worst price the bar reached against the position.
    pub fn adverse_extreme(&self, high: f64, low: f64) -> f64 {
        if self.is_long() { low } else { high }
    }

    /// Best price the bar reached in favour of the position.
    pub fn favourable_extreme(&self, high: f64, low: f64) -> f64 {
        if self.is_long() { high } else { low }
    }
}

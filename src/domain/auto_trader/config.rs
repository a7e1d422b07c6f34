//! Per-user auto-trading configuration and its safety bounds.

use crate::domain::error::EngineError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

pub const MAX_POSITION_SIZE_PCT: RangeInclusive<f64> = 1.0..=25.0;
pub const MAX_DAILY_TRADES: RangeInclusive<u32> = 1..=20;
pub const MAX_DAILY_LOSS_PCT: RangeInclusive<f64> = 1.0..=10.0;
pub const MIN_CONFLUENCE_SCORE: RangeInclusive<f64> = 50.0..=95.0;
pub const RISK_PER_TRADE_PCT: RangeInclusive<f64> = 0.5..=2.0;
pub const TRAILING_STOP_PCT: RangeInclusive<f64> = 0.5..=10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConfig {
    pub enabled: bool,
    pub max_position_size_pct: f64,
    pub max_daily_trades: u32,
    pub max_daily_loss_pct: f64,
    pub min_confluence_score: f64,
    pub allowed_symbols: Vec<String>,
    pub risk_per_trade_pct: f64,
    pub use_stop_loss: bool,
    pub use_take_profit: bool,
    pub trailing_stop_enabled: bool,
    pub trailing_stop_pct: f64,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_position_size_pct: 10.0,
            max_daily_trades: 5,
            max_daily_loss_pct: 5.0,
            min_confluence_score: 65.0,
            allowed_symbols: vec!["BTC".to_string(), "ETH".to_string()],
            risk_per_trade_pct: 1.0,
            use_stop_loss: true,
            use_take_profit: true,
            trailing_stop_enabled: false,
            trailing_stop_pct: 2.0,
        }
    }
}

/// Partial update as sent by a caller. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfigUpdate {
    pub enabled: Option<bool>,
    pub max_position_size_pct: Option<f64>,
    pub max_daily_trades: Option<u32>,
    pub max_daily_loss_pct: Option<f64>,
    pub min_confluence_score: Option<f64>,
    pub allowed_symbols: Option<Vec<String>>,
    pub risk_per_trade_pct: Option<f64>,
    pub use_stop_loss: Option<bool>,
    pub use_take_profit: Option<bool>,
    pub trailing_stop_enabled: Option<bool>,
    pub trailing_stop_pct: Option<f64>,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

impl TradeConfig {
    pub fn is_symbol_allowed(&self, symbol: &str) -> bool {
        let wanted = normalize_symbol(symbol);
        self.allowed_symbols
            .iter()
            .any(|s| normalize_symbol(s) == wanted)
    }

    /// Merge `update` into this config and clamp the result. Non-finite
    /// numbers are rejected; out-of-range numbers are pulled into bounds.
    pub fn apply(&self, user_id: &str, update: &TradeConfigUpdate) -> Result<Self, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidTradeConfig {
                user_id: user_id.to_string(),
                reason: "user id is empty".into(),
            });
        }

        let finite = |name: &str, value: Option<f64>, current: f64| -> Result<f64, EngineError> {
            match value {
                Some(v) if !v.is_finite() => Err(EngineError::InvalidTradeConfig {
                    user_id: user_id.to_string(),
                    reason: format!("{name} must be a finite number"),
                }),
                Some(v) => Ok(v),
                None => Ok(current),
            }
        };

        let merged = TradeConfig {
            enabled: update.enabled.unwrap_or(self.enabled),
            max_position_size_pct: finite(
                "max_position_size_pct",
                update.max_position_size_pct,
                self.max_position_size_pct,
            )?,
            max_daily_trades: update.max_daily_trades.unwrap_or(self.max_daily_trades),
            max_daily_loss_pct: finite(
                "max_daily_loss_pct",
                update.max_daily_loss_pct,
                self.max_daily_loss_pct,
            )?,
            min_confluence_score: finite(
                "min_confluence_score",
                update.min_confluence_score,
                self.min_confluence_score,
            )?,
            allowed_symbols: update
                .allowed_symbols
                .clone()
                .unwrap_or_else(|| self.allowed_symbols.clone()),
            risk_per_trade_pct: finite(
                "risk_per_trade_pct",
                update.risk_per_trade_pct,
                self.risk_per_trade_pct,
            )?,
            use_stop_loss: true,
            use_take_profit: update.use_take_profit.unwrap_or(self.use_take_profit),
            trailing_stop_enabled: update
                .trailing_stop_enabled
                .unwrap_or(self.trailing_stop_enabled),
            trailing_stop_pct: finite(
                "trailing_stop_pct",
                update.trailing_stop_pct,
                self.trailing_stop_pct,
            )?,
        };

        Ok(merged.clamped())
    }

    /// Pull every bounded field into its safety range. Stop losses cannot be
    /// switched off.
    pub fn clamped(mut self) -> Self {
        self.max_position_size_pct = clamp(self.max_position_size_pct, &MAX_POSITION_SIZE_PCT);
        self.max_daily_trades = self
            .max_daily_trades
            .clamp(*MAX_DAILY_TRADES.start(), *MAX_DAILY_TRADES.end());
        self.max_daily_loss_pct = clamp(self.max_daily_loss_pct, &MAX_DAILY_LOSS_PCT);
        self.min_confluence_score = clamp(self.min_confluence_score, &MIN_CONFLUENCE_SCORE);
        self.risk_per_trade_pct = clamp(self.risk_per_trade_pct, &RISK_PER_TRADE_PCT);
        self.trailing_stop_pct = clamp(self.trailing_stop_pct, &TRAILING_STOP_PCT);
        self.use_stop_loss = true;

        let mut symbols: Vec<String> = Vec::with_capacity(self.allowed_symbols.len());
        for symbol in &self.allowed_symbols {
            let symbol = normalize_symbol(symbol);
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        self.allowed_symbols = symbols;
        self
    }
}

fn clamp(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.clamp(*range.start(), *range.end())
}

//! Backtest strategies.
//!
//! A strategy looks at the columns up to and including `index` and either
//! asks for a new position or stays quiet. The backtester never consults a
//! strategy while a position is open.

use crate::domain::error::EngineError;
use crate::domain::indicator::{bollinger, ema, macd, rsi};
use crate::domain::ohlcv::BarColumns;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bars needed before the first signal is meaningful.
    fn warmup(&self) -> usize;

    fn generate_signal(&self, data: &BarColumns, index: usize) -> Option<TradeAction>;
}

/// MACD histogram crossing zero, filtered by RSI on the opposite side of 50.
#[derive(Debug, Clone)]
pub struct RsiMacdStrategy {
    pub rsi_period: usize,
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for RsiMacdStrategy {
    fn default() -> Self {
        Self {
            rsi_period: rsi::DEFAULT_PERIOD,
            fast: macd::DEFAULT_FAST,
            slow: macd::DEFAULT_SLOW,
            signal: macd::DEFAULT_SIGNAL,
        }
    }
}

impl Strategy for RsiMacdStrategy {
    fn name(&self) -> &'static str {
        "rsi_macd"
    }

    fn warmup(&self) -> usize {
        self.slow + self.signal
    }

    fn generate_signal(&self, data: &BarColumns, index: usize) -> Option<TradeAction> {
        if index < self.warmup() || index >= data.len() {
            return None;
        }
        let (_, _, closes) = data.upto(index);
        let series = macd::macd_series(closes, self.fast, self.slow, self.signal);
        let [.., prev, curr] = series.as_slice() else {
            return None;
        };
        let rsi_value = rsi(closes, self.rsi_period);

        if prev.histogram <= 0.0 && curr.histogram > 0.0 && rsi_value < 50.0 {
            Some(TradeAction::Buy)
        } else if prev.histogram >= 0.0 && curr.histogram < 0.0 && rsi_value > 50.0 {
            Some(TradeAction::Sell)
        } else {
            None
        }
    }
}

/// Close outside a Bollinger band confirmed by an RSI extreme.
#[derive(Debug, Clone)]
pub struct BollingerRsiStrategy {
    pub period: usize,
    pub multiplier: f64,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for BollingerRsiStrategy {
    fn default() -> Self {
        Self {
            period: bollinger::DEFAULT_PERIOD,
            multiplier: bollinger::DEFAULT_MULTIPLIER,
            rsi_period: rsi::DEFAULT_PERIOD,
            oversold: 35.0,
            overbought: 65.0,
        }
    }
}

impl Strategy for BollingerRsiStrategy {
    fn name(&self) -> &'static str {
        "bollinger_rsi"
    }

    fn warmup(&self) -> usize {
        self.period.max(self.rsi_period + 1)
    }

    fn generate_signal(&self, data: &BarColumns, index: usize) -> Option<TradeAction> {
        if index < self.warmup() || index >= data.len() {
            return None;
        }
        let (_, _, closes) = data.upto(index);
        let price = closes[index];
        let bands = bollinger(closes, self.period, self.multiplier);
        let rsi_value = rsi(closes, self.rsi_period);

        if price <= bands.lower && rsi_value < self.oversold {
            Some(TradeAction::Buy)
        } else if price >= bands.upper && rsi_value > self.overbought {
            Some(TradeAction::Sell)
        } else {
            None
        }
    }
}

/// Fires on the bar where the fast/medium/slow EMA stack first lines up.
#[derive(Debug, Clone)]
pub struct TripleEmaStrategy {
    pub fast: usize,
    pub medium: usize,
    pub slow: usize,
}

impl Default for TripleEmaStrategy {
    fn default() -> Self {
        Self {
            fast: 9,
            medium: 21,
            slow: 50,
        }
    }
}

impl TripleEmaStrategy {
    fn stack(&self, closes: &[f64]) -> Option<TradeAction> {
        let f = ema(closes, self.fast);
        let m = ema(closes, self.medium);
        let s = ema(closes, self.slow);
        if f > m && m > s {
            Some(TradeAction::Buy)
        } else if f < m && m < s {
            Some(TradeAction::Sell)
        } else {
            None
        }
    }
}

impl Strategy for TripleEmaStrategy {
    fn name(&self) -> &'static str {
        "triple_ema"
    }

    fn warmup(&self) -> usize {
        self.slow
    }

    fn generate_signal(&self, data: &BarColumns, index: usize) -> Option<TradeAction> {
        if index < self.warmup() || index >= data.len() {
            return None;
        }
        let (_, _, closes) = data.upto(index);
        let now = self.stack(closes)?;
        let before = self.stack(&closes[..index]);
        (before != Some(now)).then_some(now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RsiMacd,
    BollingerRsi,
    TripleEma,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::RsiMacd,
        StrategyKind::BollingerRsi,
        StrategyKind::TripleEma,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RsiMacd => "rsi_macd",
            StrategyKind::BollingerRsi => "bollinger_rsi",
            StrategyKind::TripleEma => "triple_ema",
        }
    }

    /// Instance with default parameters.
    pub fn build(self) -> Box<dyn Strategy> {
        match self {
            StrategyKind::RsiMacd => Box::new(RsiMacdStrategy::default()),
            StrategyKind::BollingerRsi => Box::new(BollingerRsiStrategy::default()),
            StrategyKind::TripleEma => Box::new(TripleEmaStrategy::default()),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '+', ' '], "_");
        match normalized.as_str() {
            "rsi_macd" => Ok(StrategyKind::RsiMacd),
            "bollinger_rsi" | "bb_rsi" => Ok(StrategyKind::BollingerRsi),
            "triple_ema" | "ema" => Ok(StrategyKind::TripleEma),
            _ => Err(EngineError::UnknownStrategy(s.to_string())),
        }
    }
}

//! Technical indicator implementations.
//!
//! Every function here is pure and works on plain `&[f64]` columns. When a
//! series is too short for the requested period the function returns a
//! neutral reading rather than failing, so scoring code never has to special
//! case warm-up:
//! - `IndicatorSet`: every indicator's value at the last bar of a series
//! - `compute_indicator_set`: builds an `IndicatorSet` from OHLCV bars

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

pub use atr::atr;
pub use bollinger::{BollingerBands, bollinger};
pub use ema::{ema, ema_series};
pub use fibonacci::{FibLevel, fibonacci_levels};
pub use macd::{MacdValue, macd};
pub use rsi::rsi;
pub use sma::sma;
pub use stochastic::{StochasticValue, stochastic};

use crate::domain::ohlcv::{BarColumns, OhlcvBar};
use serde::{Deserialize, Serialize};

/// Bars used to locate the swing high/low for retracement levels.
pub const FIB_LOOKBACK: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub price: f64,
    pub rsi: f64,
    pub macd: MacdValue,
    pub bollinger: BollingerBands,
    pub stochastic: StochasticValue,
    pub atr: f64,
    pub sma_20: f64,
    pub sma_50: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub fibonacci: Vec<FibLevel>,
}

pub fn compute_indicator_set(bars: &[OhlcvBar]) -> IndicatorSet {
    let cols = BarColumns::from_bars(bars);
    compute_from_columns(&cols)
}

pub fn compute_from_columns(cols: &BarColumns) -> IndicatorSet {
    let closes = &cols.closes;
    let price = closes.last().copied().unwrap_or(0.0);

    let fib = match fibonacci::swing_range(&cols.highs, &cols.lows, FIB_LOOKBACK) {
        Some((high, low)) => fibonacci_levels(high, low),
        None => Vec::new(),
    };

    IndicatorSet {
        price,
        rsi: rsi(closes, rsi::DEFAULT_PERIOD),
        macd: macd(
            closes,
            macd::DEFAULT_FAST,
            macd::DEFAULT_SLOW,
            macd::DEFAULT_SIGNAL,
        ),
        bollinger: bollinger(
            closes,
            bollinger::DEFAULT_PERIOD,
            bollinger::DEFAULT_MULTIPLIER,
        ),
        stochastic: stochastic(&cols.highs, &cols.lows, closes, stochastic::DEFAULT_PERIOD),
        atr: atr(&cols.highs, &cols.lows, closes, atr::DEFAULT_PERIOD),
        sma_20: sma(closes, 20),
        sma_50: sma(closes, 50),
        ema_12: ema(closes, 12),
        ema_26: ema(closes, 26),
        fibonacci: fib,
    }
}

//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9.
//! Fewer than `slow` prices yields an all-zero reading.

use crate::domain::indicator::ema::ema_series;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Full MACD series, one value per input price.
pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<MacdValue> {
    if closes.is_empty() {
        return Vec::new();
    }

    let ema_fast = ema_series(closes, fast);
    let ema_slow = ema_series(closes, slow);
    let line: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema_series(&line, signal);

    line.iter()
        .zip(&signal_line)
        .map(|(&macd, &signal)| MacdValue {
            macd,
            signal,
            histogram: macd - signal,
        })
        .collect()
}

/// MACD reading at the last bar.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdValue {
    if closes.len() < slow {
        return MacdValue::default();
    }
    macd_series(closes, fast, slow, signal)
        .last()
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn macd_short_series_is_zero() {
        let v = macd(&rising(25), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert_eq!(v, MacdValue::default());
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let v = macd(&rising(60), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!((v.histogram - (v.macd - v.signal)).abs() < 1e-12);
    }

    #[test]
    fn macd_positive_in_uptrend() {
        let v = macd(&rising(60), DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!(v.macd > 0.0);
        assert!(v.histogram > 0.0);
    }

    #[test]
    fn macd_negative_in_downtrend() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let v = macd(&closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!(v.macd < 0.0);
        assert!(v.histogram < 0.0);
    }

    #[test]
    fn macd_flat_is_zero() {
        let v = macd(&[50.0; 40], DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
        assert!(v.macd.abs() < 1e-12);
        assert!(v.signal.abs() < 1e-12);
    }

    #[test]
    fn macd_series_matches_input_length() {
        let series = macd_series(&rising(30), 12, 26, 9);
        assert_eq!(series.len(), 30);
        assert!(macd_series(&[], 12, 26, 9).is_empty());
    }

    #[test]
    fn macd_line_is_ema_difference() {
        let closes = rising(40);
        let fast = ema_series(&closes, 12);
        let slow = ema_series(&closes, 26);
        let v = macd(&closes, 12, 26, 9);
        assert!((v.macd - (fast[39] - slow[39])).abs() < 1e-12);
    }
}

//! Stochastic oscillator.
//!
//! %K = (close - lowest_low) / (highest_high - lowest_low) × 100 over the
//! trailing window.
//!
//! %D is reported equal to %K: there is no separate 3-period smoothing of %K
//! as in the textbook definition. Signal scoring only reads %K, so the two
//! fields stay identical until a smoothed %D is needed somewhere.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIOD: usize = 14;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticValue {
    pub k: f64,
    pub d: f64,
}

impl Default for StochasticValue {
    fn default() -> Self {
        StochasticValue { k: 50.0, d: 50.0 }
    }
}

pub fn stochastic(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> StochasticValue {
    let n = closes.len().min(highs.len()).min(lows.len());
    if period == 0 || n < period {
        return StochasticValue::default();
    }

    let start = n - period;
    let highest = highs[start..n]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let lowest = lows[start..n].iter().copied().fold(f64::INFINITY, f64::min);
    let range = highest - lowest;

    if range <= 0.0 {
        return StochasticValue::default();
    }

    let k = ((closes[n - 1] - lowest) / range * 100.0).clamp(0.0, 100.0);
    StochasticValue { k, d: k }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stochastic_short_series_is_neutral() {
        let v = stochastic(&[1.0; 5], &[1.0; 5], &[1.0; 5], 14);
        assert_eq!(v, StochasticValue { k: 50.0, d: 50.0 });
    }

    #[test]
    fn stochastic_close_at_high_is_100() {
        let highs = [10.0, 11.0, 12.0];
        let lows = [8.0, 9.0, 10.0];
        let closes = [9.0, 10.0, 12.0];
        let v = stochastic(&highs, &lows, &closes, 3);
        assert!((v.k - 100.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_close_at_low_is_0() {
        let highs = [10.0, 11.0, 12.0];
        let lows = [8.0, 9.0, 10.0];
        let closes = [9.0, 10.0, 8.0];
        let v = stochastic(&highs, &lows, &closes, 3);
        assert!(v.k.abs() < 1e-12);
    }

    #[test]
    fn stochastic_d_equals_k() {
        let highs = [10.0, 11.0, 12.0, 13.0];
        let lows = [8.0, 9.0, 10.0, 9.5];
        let closes = [9.0, 10.0, 11.0, 11.5];
        let v = stochastic(&highs, &lows, &closes, 4);
        assert_eq!(v.k, v.d);
        // (11.5 - 8) / (13 - 8) = 70
        assert!((v.k - 70.0).abs() < 1e-12);
    }

    #[test]
    fn stochastic_flat_window_is_neutral() {
        let v = stochastic(&[5.0; 14], &[5.0; 14], &[5.0; 14], 14);
        assert_eq!(v.k, 50.0);
    }
}

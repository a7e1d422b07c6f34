//! Fibonacci retracement levels between a swing high and low.

use serde::{Deserialize, Serialize};

pub const RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FibLevel {
    pub ratio: f64,
    pub price: f64,
}

/// Level 0 sits at `high`, level 1 at `low`.
pub fn fibonacci_levels(high: f64, low: f64) -> Vec<FibLevel> {
    let range = high - low;
    RATIOS
        .iter()
        .map(|&ratio| FibLevel {
            ratio,
            price: high - range * ratio,
        })
        .collect()
}

/// Swing high/low over the trailing `lookback` bars.
pub fn swing_range(highs: &[f64], lows: &[f64], lookback: usize) -> Option<(f64, f64)> {
    let n = highs.len().min(lows.len());
    if n == 0 {
        return None;
    }
    let start = n.saturating_sub(lookback.max(1));
    let high = highs[start..n].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let low = lows[start..n].iter().copied().fold(f64::INFINITY, f64::min);
    Some((high, low))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_interpolate_linearly() {
        let levels = fibonacci_levels(200.0, 100.0);
        assert_eq!(levels.len(), 7);
        assert_eq!(levels[0].price, 200.0);
        assert!((levels[1].price - 176.4).abs() < 1e-9);
        assert!((levels[3].price - 150.0).abs() < 1e-9);
        assert!((levels[4].price - 138.2).abs() < 1e-9);
        assert_eq!(levels[6].price, 100.0);
    }

    #[test]
    fn levels_are_descending() {
        let levels = fibonacci_levels(50.0, 10.0);
        for w in levels.windows(2) {
            assert!(w[0].price >= w[1].price);
        }
    }

    #[test]
    fn swing_range_trailing() {
        let highs = [500.0, 12.0, 15.0, 11.0];
        let lows = [1.0, 9.0, 10.0, 8.0];
        assert_eq!(swing_range(&highs, &lows, 3), Some((15.0, 8.0)));
        assert_eq!(swing_range(&[], &[], 3), None);
    }
}

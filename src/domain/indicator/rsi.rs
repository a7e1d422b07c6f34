//! RSI (Relative Strength Index).
//!
//! Average gain and average loss over the last `period` price changes:
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)), and RSI = 100 when
//! avg_loss == 0.
//!
//! Fewer than `period + 1` prices yields the neutral 50.

pub const DEFAULT_PERIOD: usize = 14;
pub const NEUTRAL_RSI: f64 = 50.0;

pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let start = closes.len() - period - 1;
    let mut gains = 0.0;
    let mut losses = 0.0;

    for w in closes[start..].windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let value = 100.0 - (100.0 / (1.0 + avg_gain / avg_loss));
    value.clamp(0.0, 100.0)
}

//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper: Middle + (k × StdDev)
//! - Lower: Middle - (k × StdDev)
//!
//! StdDev is the population standard deviation. `position` places the current
//! price inside the band on a 0–100 scale (clamped; 50 when the band has
//! collapsed) and `width` is the band width as a percentage of the middle.
//!
//! Default parameters: period=20, k=2.0.

use crate::domain::indicator::sma::sma;
use crate::domain::indicator::stddev::stddev;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub position: f64,
    pub width: f64,
}

impl BollingerBands {
    fn collapsed(price: f64) -> Self {
        BollingerBands {
            upper: price,
            middle: price,
            lower: price,
            position: 50.0,
            width: 0.0,
        }
    }
}

pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let price = closes.last().copied().unwrap_or(0.0);
    if period == 0 || closes.len() < period {
        return BollingerBands::collapsed(price);
    }

    let middle = sma(closes, period);
    let sd = stddev(closes, period);
    let upper = middle + multiplier * sd;
    let lower = middle - multiplier * sd;

    BollingerBands {
        upper,
        middle,
        lower,
        position: band_position(price, upper, lower),
        width: if middle != 0.0 {
            (upper - lower) / middle * 100.0
        } else {
            0.0
        },
    }
}

/// Percentile of `price` within `[lower, upper]`, clamped to 0–100.
pub fn band_position(price: f64, upper: f64, lower: f64) -> f64 {
    let range = upper - lower;
    if range <= 0.0 {
        return 50.0;
    }
    ((price - lower) / range * 100.0).clamp(0.0, 100.0)
}

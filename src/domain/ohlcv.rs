//! OHLCV bar representation.
//!
//! A price series is a plain `&[OhlcvBar]` ordered by strictly increasing
//! timestamp. Gap handling is the data source's responsibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Column-oriented view of a series, built once per analysis pass so the
/// indicator functions can work on plain `&[f64]` slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarColumns {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl BarColumns {
    pub fn from_bars(bars: &[OhlcvBar]) -> Self {
        let mut cols = BarColumns {
            closes: Vec::with_capacity(bars.len()),
            highs: Vec::with_capacity(bars.len()),
            lows: Vec::with_capacity(bars.len()),
            volumes: Vec::with_capacity(bars.len()),
        };
        for bar in bars {
            cols.closes.push(bar.close);
            cols.highs.push(bar.high);
            cols.lows.push(bar.low);
            cols.volumes.push(bar.volume);
        }
        cols
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Columns truncated to `..=index`, i.e. everything a strategy may see at
    /// bar `index` without looking ahead.
    pub fn upto(&self, index: usize) -> (&[f64], &[f64], &[f64]) {
        let end = (index + 1).min(self.len());
        (&self.highs[..end], &self.lows[..end], &self.closes[..end])
    }
}

/// Last close of a series, if any.
pub fn last_close(bars: &[OhlcvBar]) -> Option<f64> {
    bars.last().map(|b| b.close)
}

//! Exponential Moving Average.
//!
//! k = 2/(n+1), EMA[0] = C[0], then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//!
//! Seeding with the first value (rather than an SMA over the first n bars)
//! biases the early values toward the opening price. MACD and the trend
//! classifiers are calibrated against this seeding, so keep it.

pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (period.max(1) as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);

    for &v in &values[1..] {
        ema = v * k + ema * (1.0 - k);
        out.push(ema);
    }

    out
}

/// EMA value at the last bar, 0.0 for an empty series.
pub fn ema(values: &[f64], period: usize) -> f64 {
    ema_series(values, period).last().copied().unwrap_or(0.0)
}

//! Population standard deviation over the trailing window.
//!
//! STDDEV(n) = sqrt(sum((C[i-j] - SMA(n))^2 for j in 0..n) / n)
//! Fewer than `period` values yields 0.0.

pub fn stddev(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return 0.0;
    }

    let window = &values[values.len() - period..];
    let mean: f64 = window.iter().sum::<f64>() / period as f64;

    let variance: f64 = window
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;

    variance.sqrt()
}

//! Simple Moving Average over the trailing window.

/// Mean of the last `period` values. With fewer values than `period` the
/// last value is returned (0.0 for an empty slice).
pub fn sma(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return values.last().copied().unwrap_or(0.0);
    }
    let window = &values[values.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_trailing_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((sma(&values, 3) - 4.0).abs() < f64::EPSILON);
        assert!((sma(&values, 5) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn sma_short_series_falls_back_to_last() {
        assert_eq!(sma(&[7.0, 9.0], 20), 9.0);
        assert_eq!(sma(&[], 20), 0.0);
    }

    #[test]
    fn sma_zero_period() {
        assert_eq!(sma(&[1.0, 2.0], 0), 2.0);
    }
}

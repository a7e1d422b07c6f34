//! Average True Range.
//!
//! Simple mean of the true range over the trailing `period` bars, where the
//! true range of a bar is max(high - low, |high - prev_close|, |low - prev_close|).
//! The first bar has no previous close and contributes high - low.
//!
//! With fewer than `period + 1` bars the mean is taken over whatever true
//! ranges exist, so a short series still gets a usable volatility estimate.

pub const DEFAULT_PERIOD: usize = 14;

pub fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = closes.len().min(highs.len()).min(lows.len());
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let hl = highs[i] - lows[i];
        let tr = if i == 0 {
            hl
        } else {
            let prev_close = closes[i - 1];
            hl.max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        };
        out.push(tr);
    }
    out
}

pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> f64 {
    let tr = true_ranges(highs, lows, closes);
    if tr.is_empty() {
        return 0.0;
    }

    // Skip the first bar's plain high-low when enough history exists.
    let usable = if tr.len() > 1 { &tr[1..] } else { &tr[..] };
    let take = period.max(1).min(usable.len());
    let window = &usable[usable.len() - take..];
    window.iter().sum::<f64>() / take as f64
}

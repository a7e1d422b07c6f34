//! Multi-timeframe trend classification and confluence.
//!
//! Each timeframe is classified on its own by a five-vote trend classifier
//! (EMA stack worth two votes, then RSI, MACD histogram and Bollinger position
//! one each). The confluence combines the per-timeframe trends with integer
//! weights that grow with the bar interval, and derives entry, stop and
//! take-profit levels from the average support/resistance across timeframes.

use crate::domain::indicator::{bollinger, ema, macd, rsi};
use crate::domain::ohlcv::{BarColumns, OhlcvBar};
use crate::domain::risk::{self, Side};
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::{MarketDataPort, fetch_with_timeout};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bars a timeframe must supply to take part in a confluence pass.
pub const MIN_TIMEFRAME_BARS: usize = 50;
/// Bars used for support/resistance.
pub const SR_LOOKBACK: usize = 20;
const MAX_VOTES: f64 = 5.0;
/// Buffer placed beyond support/resistance for structural stops.
const STOP_BUFFER_PCT: f64 = 0.5;
/// Stop distance used when the structural stop sits on the wrong side of price.
const FALLBACK_STOP_PCT: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bias {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl Bias {
    pub fn from_diff(diff: f64) -> Self {
        if diff > 60.0 {
            Bias::StrongBuy
        } else if diff > 30.0 {
            Bias::Buy
        } else if diff < -60.0 {
            Bias::StrongSell
        } else if diff < -30.0 {
            Bias::Sell
        } else {
            Bias::Neutral
        }
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Bias::StrongBuy | Bias::Buy => Some(Side::Long),
            Bias::StrongSell | Bias::Sell => Some(Side::Short),
            Bias::Neutral => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeSignal {
    pub timeframe: Timeframe,
    pub trend: Trend,
    pub strength: f64,
    pub contributing_signals: Vec<String>,
    pub support: f64,
    pub resistance: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryZone {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfit {
    pub level: u8,
    pub price: f64,
    pub weight_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceResult {
    pub bias: Bias,
    pub score: f64,
    pub bullish_pct: f64,
    pub bearish_pct: f64,
    pub price: f64,
    pub entry_zone: EntryZone,
    pub stop_loss: Option<f64>,
    pub take_profits: Vec<TakeProfit>,
    pub timeframes: Vec<TimeframeSignal>,
    pub excluded: Vec<Timeframe>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConfluenceOutcome {
    Analyzed(ConfluenceResult),
    NoData { symbol: String, excluded: Vec<Timeframe> },
}

impl ConfluenceOutcome {
    pub fn result(&self) -> Option<&ConfluenceResult> {
        match self {
            ConfluenceOutcome::Analyzed(r) => Some(r),
            ConfluenceOutcome::NoData { .. } => None,
        }
    }
}

/// Classify the trend of a single timeframe's series.
pub fn classify_timeframe(timeframe: Timeframe, bars: &[OhlcvBar]) -> TimeframeSignal {
    let cols = BarColumns::from_bars(bars);
    let closes = &cols.closes;
    let price = closes.last().copied().unwrap_or(0.0);

    let mut bull = 0u32;
    let mut bear = 0u32;
    let mut contributing = Vec::new();

    let ema9 = ema(closes, 9);
    let ema21 = ema(closes, 21);
    let ema50 = ema(closes, 50);
    if ema9 > ema21 && ema21 > ema50 {
        bull += 2;
        contributing.push("EMA stack bullish (9 > 21 > 50)".to_string());
    } else if ema9 < ema21 && ema21 < ema50 {
        bear += 2;
        contributing.push("EMA stack bearish (9 < 21 < 50)".to_string());
    }

    let rsi_value = rsi(closes, rsi::DEFAULT_PERIOD);
    if rsi_value > 50.0 {
        bull += 1;
        contributing.push(format!("RSI {:.1} above 50", rsi_value));
    } else if rsi_value < 50.0 {
        bear += 1;
        contributing.push(format!("RSI {:.1} below 50", rsi_value));
    }

    let macd_value = macd(
        closes,
        macd::DEFAULT_FAST,
        macd::DEFAULT_SLOW,
        macd::DEFAULT_SIGNAL,
    );
    if macd_value.histogram > 0.0 {
        bull += 1;
        contributing.push("MACD histogram positive".to_string());
    } else if macd_value.histogram < 0.0 {
        bear += 1;
        contributing.push("MACD histogram negative".to_string());
    }

    let bands = bollinger(
        closes,
        bollinger::DEFAULT_PERIOD,
        bollinger::DEFAULT_MULTIPLIER,
    );
    if bands.position > 60.0 {
        bull += 1;
        contributing.push(format!("Price in upper band ({:.0}%)", bands.position));
    } else if bands.position < 40.0 {
        bear += 1;
        contributing.push(format!("Price in lower band ({:.0}%)", bands.position));
    }

    let trend = if bull > bear {
        Trend::Bullish
    } else if bear > bull {
        Trend::Bearish
    } else {
        Trend::Neutral
    };
    let strength = 50.0 + (bull.abs_diff(bear) as f64 / MAX_VOTES) * 50.0;

    let (support, resistance) = support_resistance(&cols, SR_LOOKBACK);

    TimeframeSignal {
        timeframe,
        trend,
        strength,
        contributing_signals: contributing,
        support,
        resistance,
        price,
    }
}

/// Lowest low and highest high over the trailing window.
pub fn support_resistance(cols: &BarColumns, lookback: usize) -> (f64, f64) {
    if cols.is_empty() {
        return (0.0, 0.0);
    }
    let start = cols.len().saturating_sub(lookback.max(1));
    let support = cols.lows[start..].iter().copied().fold(f64::INFINITY, f64::min);
    let resistance = cols.highs[start..]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    (support, resistance)
}

/// Combine per-timeframe signals. `price` is the reference price for levels;
/// callers pass the close of the finest timeframe analysed.
pub fn compute_confluence(
    signals: Vec<TimeframeSignal>,
    excluded: Vec<Timeframe>,
    price: f64,
) -> ConfluenceResult {
    let total_weight: f64 = signals.iter().map(|s| s.timeframe.weight() as f64).sum();

    let weighted = |trend: Trend| -> f64 {
        if total_weight == 0.0 {
            return 0.0;
        }
        signals
            .iter()
            .filter(|s| s.trend == trend)
            .map(|s| s.timeframe.weight() as f64 * s.strength)
            .sum::<f64>()
            / total_weight
    };

    let bullish_pct = weighted(Trend::Bullish);
    let bearish_pct = weighted(Trend::Bearish);
    let bias = Bias::from_diff(bullish_pct - bearish_pct);
    let score = bullish_pct.max(bearish_pct).clamp(0.0, 100.0);

    let n = signals.len().max(1) as f64;
    let avg_support = signals.iter().map(|s| s.support).sum::<f64>() / n;
    let avg_resistance = signals.iter().map(|s| s.resistance).sum::<f64>() / n;

    let (entry_zone, stop_loss, take_profits) =
        trade_levels(bias, price, avg_support, avg_resistance);

    ConfluenceResult {
        bias,
        score,
        bullish_pct,
        bearish_pct,
        price,
        entry_zone,
        stop_loss,
        take_profits,
        timeframes: signals,
        excluded,
    }
}

fn trade_levels(
    bias: Bias,
    price: f64,
    avg_support: f64,
    avg_resistance: f64,
) -> (EntryZone, Option<f64>, Vec<TakeProfit>) {
    let Some(side) = bias.side() else {
        let zone = EntryZone {
            low: avg_support.min(avg_resistance),
            high: avg_support.max(avg_resistance),
        };
        return (zone, None, Vec::new());
    };

    let (mut stop, zone, final_target) = match side {
        Side::Long => {
            let stop = avg_support * (1.0 - STOP_BUFFER_PCT / 100.0);
            let zone = EntryZone {
                low: price - (price - avg_support).max(0.0) * 0.25,
                high: price,
            };
            (stop, zone, avg_resistance)
        }
        Side::Short => {
            let stop = avg_resistance * (1.0 + STOP_BUFFER_PCT / 100.0);
            let zone = EntryZone {
                low: price,
                high: price + (avg_resistance - price).max(0.0) * 0.25,
            };
            (stop, zone, avg_support)
        }
    };

    let wrong_side = match side {
        Side::Long => stop >= price,
        Side::Short => stop <= price,
    };
    if wrong_side {
        stop = risk::percent_stop(price, FALLBACK_STOP_PCT, side);
    }

    let tp1 = risk::r_multiple_target(price, stop, risk::TARGET_1_R, side);
    let tp2 = risk::r_multiple_target(price, stop, risk::TARGET_2_R, side);
    let tp3 = match side {
        Side::Long if final_target > tp2 => final_target,
        Side::Short if final_target < tp2 => final_target,
        // structure already reached: extend one more R past the second target
        _ => risk::r_multiple_target(price, stop, risk::TARGET_2_R + 1.0, side),
    };

    let take_profits = vec![
        TakeProfit {
            level: 1,
            price: tp1,
            weight_pct: 30.0,
        },
        TakeProfit {
            level: 2,
            price: tp2,
            weight_pct: 40.0,
        },
        TakeProfit {
            level: 3,
            price: tp3,
            weight_pct: 30.0,
        },
    ];

    (zone, Some(stop), take_profits)
}

/// Fetch every requested timeframe, classify the usable ones and combine
/// them. Timeframes that fail, time out or are too short are excluded; the
/// pass only reports `NoData` when nothing usable remains.
pub async fn analyze_timeframes(
    port: &dyn MarketDataPort,
    symbol: &str,
    timeframes: &[Timeframe],
    timeout: Duration,
) -> ConfluenceOutcome {
    let mut signals = Vec::new();
    let mut excluded = Vec::new();
    let mut reference_price: Option<(Timeframe, f64)> = None;

    for &tf in timeframes {
        let bars = match fetch_with_timeout(port, symbol, tf, timeout).await {
            Some(bars) if bars.len() >= MIN_TIMEFRAME_BARS => bars,
            Some(bars) => {
                tracing::warn!(%symbol, timeframe = %tf, bars = bars.len(), "too few bars, timeframe excluded");
                excluded.push(tf);
                continue;
            }
            None => {
                tracing::warn!(%symbol, timeframe = %tf, "no data, timeframe excluded");
                excluded.push(tf);
                continue;
            }
        };

        let signal = classify_timeframe(tf, &bars);
        tracing::debug!(%symbol, timeframe = %tf, trend = ?signal.trend, strength = signal.strength, "timeframe classified");

        if reference_price.is_none_or(|(ref_tf, _)| tf < ref_tf) {
            reference_price = Some((tf, signal.price));
        }
        signals.push(signal);
    }

    match reference_price {
        Some((_, price)) => {
            ConfluenceOutcome::Analyzed(compute_confluence(signals, excluded, price))
        }
        None => ConfluenceOutcome::NoData {
            symbol: symbol.to_string(),
            excluded,
        },
    }
}

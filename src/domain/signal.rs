//! Per-indicator signals and the composite score for a single series.
//!
//! Each indicator maps to a discrete [`SignalStrength`] with a confidence
//! between 50 and 85. The composite is
//!
//! ```text
//! score = Σ(value × confidence / 100) / (n × 2) × 100
//! ```
//!
//! which lands in -100..=100. Recommendation bands are fixed: > 50 strong buy,
//! > 20 buy, < -50 strong sell, < -20 sell, otherwise hold.

use crate::domain::indicator::{IndicatorSet, compute_indicator_set};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::Side;
use serde::{Deserialize, Serialize};

/// Bars required before a series is scored at all.
pub const MIN_BARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl SignalStrength {
    pub fn value(self) -> i32 {
        match self {
            SignalStrength::StrongBuy => 2,
            SignalStrength::Buy => 1,
            SignalStrength::Neutral => 0,
            SignalStrength::Sell => -1,
            SignalStrength::StrongSell => -2,
        }
    }

    pub fn is_bullish(self) -> bool {
        self.value() > 0
    }

    pub fn is_bearish(self) -> bool {
        self.value() < 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl Recommendation {
    pub fn from_score(score: f64) -> Self {
        if score > 50.0 {
            Recommendation::StrongBuy
        } else if score > 20.0 {
            Recommendation::Buy
        } else if score < -50.0 {
            Recommendation::StrongSell
        } else if score < -20.0 {
            Recommendation::Sell
        } else {
            Recommendation::Hold
        }
    }

    pub fn is_actionable(self) -> bool {
        self != Recommendation::Hold
    }

    pub fn side(self) -> Option<Side> {
        match self {
            Recommendation::StrongBuy | Recommendation::Buy => Some(Side::Long),
            Recommendation::StrongSell | Recommendation::Sell => Some(Side::Short),
            Recommendation::Hold => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub indicator: String,
    pub direction: SignalStrength,
    pub value: i32,
    pub confidence: u32,
}

impl Signal {
    fn new(indicator: &str, direction: SignalStrength, confidence: u32) -> Self {
        Signal {
            indicator: indicator.to_string(),
            direction,
            value: direction.value(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeSignal {
    pub score: f64,
    pub recommendation: Recommendation,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAnalysis {
    pub indicators: IndicatorSet,
    pub signals: Vec<Signal>,
    pub composite: CompositeSignal,
}

/// Result of scoring one series. `InsufficientData` is an ordinary outcome,
/// not an error: callers must check it before reading indicators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScoreOutcome {
    Scored(SeriesAnalysis),
    InsufficientData { bars: usize, required: usize },
}

impl ScoreOutcome {
    pub fn analysis(&self) -> Option<&SeriesAnalysis> {
        match self {
            ScoreOutcome::Scored(a) => Some(a),
            ScoreOutcome::InsufficientData { .. } => None,
        }
    }
}

pub fn score_series(bars: &[OhlcvBar]) -> ScoreOutcome {
    if bars.len() < MIN_BARS {
        return ScoreOutcome::InsufficientData {
            bars: bars.len(),
            required: MIN_BARS,
        };
    }

    let indicators = compute_indicator_set(bars);
    let signals = indicator_signals(&indicators);
    let composite = composite_signal(&signals);

    ScoreOutcome::Scored(SeriesAnalysis {
        indicators,
        signals,
        composite,
    })
}

pub fn indicator_signals(set: &IndicatorSet) -> Vec<Signal> {
    vec![
        rsi_signal(set.rsi),
        macd_signal(set.macd.macd, set.macd.histogram),
        bollinger_signal(set.bollinger.position),
        stochastic_signal(set.stochastic.k),
        trend_signal(set.price, set.ema_12, set.sma_50),
    ]
}

pub fn rsi_signal(rsi: f64) -> Signal {
    let (dir, conf) = if rsi < 20.0 {
        (SignalStrength::StrongBuy, 85)
    } else if rsi < 30.0 {
        (SignalStrength::Buy, 70)
    } else if rsi > 80.0 {
        (SignalStrength::StrongSell, 85)
    } else if rsi > 70.0 {
        (SignalStrength::Sell, 70)
    } else {
        (SignalStrength::Neutral, 50)
    };
    Signal::new("rsi", dir, conf)
}

pub fn macd_signal(line: f64, histogram: f64) -> Signal {
    let (dir, conf) = if histogram > 0.0 && line > 0.0 {
        (SignalStrength::StrongBuy, 75)
    } else if histogram > 0.0 {
        (SignalStrength::Buy, 60)
    } else if histogram < 0.0 && line < 0.0 {
        (SignalStrength::StrongSell, 75)
    } else if histogram < 0.0 {
        (SignalStrength::Sell, 60)
    } else {
        (SignalStrength::Neutral, 50)
    };
    Signal::new("macd", dir, conf)
}

pub fn bollinger_signal(position: f64) -> Signal {
    let (dir, conf) = if position <= 5.0 {
        (SignalStrength::StrongBuy, 80)
    } else if position < 20.0 {
        (SignalStrength::Buy, 65)
    } else if position >= 95.0 {
        (SignalStrength::StrongSell, 80)
    } else if position > 80.0 {
        (SignalStrength::Sell, 65)
    } else {
        (SignalStrength::Neutral, 50)
    };
    Signal::new("bollinger", dir, conf)
}

pub fn stochastic_signal(k: f64) -> Signal {
    let (dir, conf) = if k < 10.0 {
        (SignalStrength::StrongBuy, 75)
    } else if k < 20.0 {
        (SignalStrength::Buy, 65)
    } else if k > 90.0 {
        (SignalStrength::StrongSell, 75)
    } else if k > 80.0 {
        (SignalStrength::Sell, 65)
    } else {
        (SignalStrength::Neutral, 50)
    };
    Signal::new("stochastic", dir, conf)
}

pub fn trend_signal(price: f64, ema_fast: f64, sma_slow: f64) -> Signal {
    let (dir, conf) = if price > ema_fast && ema_fast > sma_slow {
        (SignalStrength::StrongBuy, 80)
    } else if price > sma_slow {
        (SignalStrength::Buy, 60)
    } else if price < ema_fast && ema_fast < sma_slow {
        (SignalStrength::StrongSell, 80)
    } else if price < sma_slow {
        (SignalStrength::Sell, 60)
    } else {
        (SignalStrength::Neutral, 50)
    };
    Signal::new("trend", dir, conf)
}

pub fn composite_signal(signals: &[Signal]) -> CompositeSignal {
    let bullish_count = signals.iter().filter(|s| s.direction.is_bullish()).count();
    let bearish_count = signals.iter().filter(|s| s.direction.is_bearish()).count();
    let neutral_count = signals.len() - bullish_count - bearish_count;

    let score = if signals.is_empty() {
        0.0
    } else {
        let weighted: f64 = signals
            .iter()
            .map(|s| s.value as f64 * s.confidence as f64 / 100.0)
            .sum();
        weighted / (signals.len() as f64 * 2.0) * 100.0
    };

    CompositeSignal {
        score,
        recommendation: Recommendation::from_score(score),
        bullish_count,
        bearish_count,
        neutral_count,
    }
}

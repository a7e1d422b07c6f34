#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use confluence::domain::auto_trader::config::TradeConfig;
use confluence::domain::auto_trader::trade::AutoTrade;
use confluence::domain::error::EngineError;
pub use confluence::domain::ohlcv::OhlcvBar;
use confluence::domain::timeframe::Timeframe;
use confluence::ports::data_port::MarketDataPort;
use confluence::ports::trade_store::TradeStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Market data served from memory, per symbol and timeframe, with optional
/// per-timeframe delays for timeout tests.
#[derive(Default)]
pub struct MockMarketData {
    pub series: HashMap<(String, Timeframe), Vec<OhlcvBar>>,
    pub delays: HashMap<Timeframe, Duration>,
    pub fetches: AtomicUsize,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<OhlcvBar>) -> Self {
        self.series.insert((symbol.to_string(), timeframe), bars);
        self
    }

    /// Same series for every listed timeframe.
    pub fn with_all(mut self, symbol: &str, timeframes: &[Timeframe], bars: Vec<OhlcvBar>) -> Self {
        for &tf in timeframes {
            self.series.insert((symbol.to_string(), tf), bars.clone());
        }
        self
    }

    pub fn with_delay(mut self, timeframe: Timeframe, delay: Duration) -> Self {
        self.delays.insert(timeframe, delay);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataPort for MockMarketData {
    async fn fetch_ohlc(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<OhlcvBar>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(&timeframe) {
            tokio::time::sleep(*delay).await;
        }
        self.series.get(&(symbol.to_string(), timeframe)).cloned()
    }
}

/// Store whose every call fails, as an unreachable database would.
pub struct FailingStore;

fn unreachable_store() -> EngineError {
    EngineError::Storage {
        reason: "connection refused".into(),
    }
}

#[async_trait]
impl TradeStore for FailingStore {
    async fn save_config(&self, _user_id: &str, _config: &TradeConfig) -> Result<(), EngineError> {
        Err(unreachable_store())
    }

    async fn load_config(&self, _user_id: &str) -> Result<Option<TradeConfig>, EngineError> {
        Err(unreachable_store())
    }

    async fn list_configs(&self) -> Result<Vec<(String, TradeConfig)>, EngineError> {
        Err(unreachable_store())
    }

    async fn save_trade(&self, _trade: &AutoTrade) -> Result<(), EngineError> {
        Err(unreachable_store())
    }

    async fn list_open_trades(&self) -> Result<Vec<AutoTrade>, EngineError> {
        Err(unreachable_store())
    }

    async fn list_user_trades(&self, _user_id: &str) -> Result<Vec<AutoTrade>, EngineError> {
        Err(unreachable_store())
    }

    async fn get_balance(&self, _user_id: &str) -> Result<Option<f64>, EngineError> {
        Err(unreachable_store())
    }

    async fn adjust_balance(
        &self,
        _user_id: &str,
        _initial: f64,
        _delta: f64,
    ) -> Result<f64, EngineError> {
        Err(unreachable_store())
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly bars with a ±1 high/low band around each close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start_time() + ChronoDuration::hours(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        })
        .collect()
}

pub fn trending(n: usize, start: f64, step: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    bars_from_closes(&closes)
}

pub fn flat(n: usize, price: f64) -> Vec<OhlcvBar> {
    bars_from_closes(&vec![price; n])
}

/// Deterministic oscillating series around a drifting mean.
pub fn wave(n: usize, base: f64, amplitude: f64, period: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let t = i as f64;
            base + amplitude * (t * std::f64::consts::TAU / period).sin() + t * 0.05
        })
        .collect();
    bars_from_closes(&closes)
}

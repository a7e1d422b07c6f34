//! Read-through TTL cache in front of any market data source.

use crate::domain::cache::TtlCache;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

type SeriesKey = (String, Timeframe);

pub struct CachedMarketData {
    inner: Arc<dyn MarketDataPort>,
    cache: TtlCache<SeriesKey, Vec<OhlcvBar>>,
}

impl CachedMarketData {
    pub fn new(inner: Arc<dyn MarketDataPort>, ttl: Duration) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl),
        }
    }

    fn key(symbol: &str, timeframe: Timeframe) -> SeriesKey {
        (symbol.to_uppercase(), timeframe)
    }

    pub fn invalidate(&self, symbol: &str, timeframe: Timeframe) -> bool {
        self.cache.invalidate(&Self::key(symbol, timeframe))
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cached_series(&self) -> usize {
        self.cache.len()
    }
}

#[async_trait]
impl MarketDataPort for CachedMarketData {
    async fn fetch_ohlc(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<OhlcvBar>> {
        let key = Self::key(symbol, timeframe);
        if let Some(bars) = self.cache.get(&key) {
            tracing::trace!(%symbol, %timeframe, "series cache hit");
            return Some(bars);
        }

        // misses are not cached so a recovering source is picked up on the next call
        let bars = self.inner.fetch_ohlc(symbol, timeframe).await?;
        self.cache.insert(key, bars.clone());
        Some(bars)
    }
}

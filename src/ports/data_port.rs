//! Market data port trait.

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use async_trait::async_trait;
use std::time::Duration;

/// Source of OHLCV series. `None` means the source is unavailable or has
/// nothing for the symbol; it is never an error for analysis callers.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    async fn fetch_ohlc(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<OhlcvBar>>;
}

/// Fetch with a caller-supplied deadline. A timed-out fetch reads as "no data".
pub async fn fetch_with_timeout(
    port: &dyn MarketDataPort,
    symbol: &str,
    timeframe: Timeframe,
    timeout: Duration,
) -> Option<Vec<OhlcvBar>> {
    match tokio::time::timeout(timeout, port.fetch_ohlc(symbol, timeframe)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(%symbol, %timeframe, ?timeout, "market data fetch timed out");
            None
        }
    }
}

//! CSV market data adapter.
//!
//! One file per symbol and interval, named `<SYMBOL>_<timeframe>.csv`
//! (`BTC_1h.csv`), with a header row and the columns
//! `timestamp,open,high,low,close,volume`. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date.

use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::MarketDataPort;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CsvMarketData {
    base_path: PathBuf,
}

fn data_error(symbol: &str, reason: impl Into<String>) -> EngineError {
    EngineError::NoData {
        symbol: symbol.to_string(),
        reason: reason.into(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

fn parse_field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    symbol: &str,
) -> Result<f64, EngineError> {
    let raw = record
        .get(index)
        .ok_or_else(|| data_error(symbol, format!("missing {name} column")))?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| data_error(symbol, format!("invalid {name} value {raw:?}: {e}")))?;
    if !value.is_finite() {
        return Err(data_error(symbol, format!("non-finite {name} value")));
    }
    Ok(value)
}

impl CsvMarketData {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol.to_uppercase(), timeframe))
    }

    /// Read and validate one series. Bars come back sorted by timestamp with
    /// duplicate timestamps collapsed to the last row seen.
    pub fn load_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<OhlcvBar>, EngineError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path)
            .map_err(|e| data_error(symbol, format!("failed to read {}: {e}", path.display())))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| data_error(symbol, format!("CSV parse error: {e}")))?;

            let raw_ts = record
                .get(0)
                .ok_or_else(|| data_error(symbol, "missing timestamp column"))?;
            let timestamp = parse_timestamp(raw_ts)
                .ok_or_else(|| data_error(symbol, format!("invalid timestamp {raw_ts:?}")))?;

            bars.push(OhlcvBar {
                timestamp,
                open: parse_field(&record, 1, "open", symbol)?,
                high: parse_field(&record, 2, "high", symbol)?,
                low: parse_field(&record, 3, "low", symbol)?,
                close: parse_field(&record, 4, "close", symbol)?,
                volume: parse_field(&record, 5, "volume", symbol)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by(|later, earlier| {
            if later.timestamp == earlier.timestamp {
                *earlier = later.clone();
                true
            } else {
                false
            }
        });
        Ok(bars)
    }

    /// Symbols that have a file for `timeframe`, sorted.
    pub fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(&self.base_path)?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(symbol) = name.strip_suffix(&suffix) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[async_trait]
impl MarketDataPort for CsvMarketData {
    async fn fetch_ohlc(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<OhlcvBar>> {
        let source = self.clone();
        let owned_symbol = symbol.to_string();
        let loaded =
            tokio::task::spawn_blocking(move || source.load_series(&owned_symbol, timeframe)).await;

        match loaded {
            Ok(Ok(bars)) if !bars.is_empty() => Some(bars),
            Ok(Ok(_)) => {
                tracing::debug!(%symbol, %timeframe, "csv series is empty");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(%symbol, %timeframe, error = %e, "csv series unavailable");
                None
            }
            Err(e) => {
                tracing::error!(%symbol, %timeframe, error = %e, "csv loader task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15T02:00:00Z,101.0,111.0,91.0,106.0,51000.5\n\
            2024-01-15T00:00:00Z,100.0,110.0,90.0,105.0,50000\n\
            2024-01-15 01:00:00,105.0,115.0,100.0,110.0,60000\n";

        fs::write(path.join("BTC_1h.csv"), csv_content).unwrap();
        fs::write(path.join("ETH_1h.csv"), "timestamp,open,high,low,close,volume\n").unwrap();
        fs::write(
            path.join("ETH_1d.csv"),
            "timestamp,open,high,low,close,volume\n2024-01-15,1,2,0.5,1.5,10\n",
        )
        .unwrap();
        fs::write(
            path.join("BAD_1h.csv"),
            "timestamp,open,high,low,close,volume\nyesterday,1,2,0.5,1.5,10\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn load_series_sorts_by_timestamp() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketData::new(path);

        let bars = adapter.load_series("BTC", Timeframe::H1).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[1].close, 110.0);
        assert_eq!(bars[2].volume, 51000.5);
    }

    #[test]
    fn bare_dates_are_midnight_utc() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketData::new(path);

        let bars = adapter.load_series("eth", Timeframe::D1).unwrap();
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketData::new(path);

        let err = adapter.load_series("BAD", Timeframe::H1).unwrap_err();
        assert!(matches!(err, EngineError::NoData { .. }));
    }

    #[tokio::test]
    async fn fetch_reads_missing_and_empty_as_none() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketData::new(path);

        assert_eq!(adapter.fetch_ohlc("BTC", Timeframe::H1).await.map(|b| b.len()), Some(3));
        assert!(adapter.fetch_ohlc("XYZ", Timeframe::H1).await.is_none());
        assert!(adapter.fetch_ohlc("ETH", Timeframe::H1).await.is_none());
        assert!(adapter.fetch_ohlc("BAD", Timeframe::H1).await.is_none());
    }

    #[test]
    fn list_symbols_by_timeframe() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvMarketData::new(path);

        assert_eq!(
            adapter.list_symbols(Timeframe::H1).unwrap(),
            vec!["BAD", "BTC", "ETH"]
        );
        assert_eq!(adapter.list_symbols(Timeframe::D1).unwrap(), vec!["ETH"]);
        assert!(adapter.list_symbols(Timeframe::W1).unwrap().is_empty());
    }
}

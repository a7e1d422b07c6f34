//! Engine facade.
//!
//! Wires a market data source, the auto trader and the analysis functions
//! behind the operations callers use. Expected conditions (missing data,
//! hold verdicts, failed gates) come back as outcome values; only unknown
//! strategy or timeframe names and bad configuration are errors.

use crate::adapters::cached_market_data::CachedMarketData;
use crate::domain::auto_trader::config::{TradeConfig, TradeConfigUpdate, normalize_symbol};
use crate::domain::auto_trader::stats::UserStats;
use crate::domain::auto_trader::trade::{AutoTrade, TradeSignal, TradeStatus};
use crate::domain::auto_trader::{AutoTrader, Clock, DEFAULT_BALANCE, ProcessOutcome};
use crate::domain::backtest::{self, BacktestConfig, BacktestOutcome};
use crate::domain::config_validation::{validate_backtest_config, validate_engine_config};
use crate::domain::confluence::{self, Bias, ConfluenceOutcome, ConfluenceResult};
use crate::domain::error::EngineError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::risk::{self, PositionSize, Side};
use crate::domain::signal::{self, MIN_BARS, Recommendation, ScoreOutcome, SeriesAnalysis};
use crate::domain::strategy::StrategyKind;
use crate::domain::timeframe::{DEFAULT_TIMEFRAMES, Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{MarketDataPort, fetch_with_timeout};
use crate::ports::trade_store::TradeStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub timeframes: Vec<Timeframe>,
    /// Interval used for single-series scoring and backtests.
    pub default_timeframe: Timeframe,
    pub fetch_timeout: Duration,
    /// Zero disables the market data cache.
    pub cache_ttl: Duration,
    pub backtest: BacktestConfig,
    pub default_balance: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeframes: DEFAULT_TIMEFRAMES.to_vec(),
            default_timeframe: Timeframe::D1,
            fetch_timeout: Duration::from_secs(10),
            cache_ttl: Duration::ZERO,
            backtest: BacktestConfig::default(),
            default_balance: DEFAULT_BALANCE,
        }
    }
}

impl EngineSettings {
    /// Read `[engine]`, `[backtest]` and `[auto_trade]`, falling back to the
    /// defaults for absent keys.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        validate_engine_config(config)?;
        validate_backtest_config(config)?;

        let defaults = Self::default();
        let bt = &defaults.backtest;

        let timeframes = match config.get_string("engine", "timeframes") {
            Some(raw) => parse_timeframes(&raw)?,
            None => defaults.timeframes.clone(),
        };
        let default_timeframe = match config.get_string("engine", "default_timeframe") {
            Some(raw) => raw.parse()?,
            None => defaults.default_timeframe,
        };

        Ok(Self {
            timeframes,
            default_timeframe,
            fetch_timeout: Duration::from_secs_f64(config.get_double(
                "engine",
                "fetch_timeout_secs",
                defaults.fetch_timeout.as_secs_f64(),
            )),
            cache_ttl: Duration::from_secs(config.get_int("engine", "cache_ttl_secs", 0).max(0) as u64),
            backtest: BacktestConfig {
                initial_capital: config.get_double("backtest", "initial_capital", bt.initial_capital),
                risk_per_trade_pct: config.get_double(
                    "backtest",
                    "risk_per_trade_pct",
                    bt.risk_per_trade_pct,
                ),
                atr_period: config.get_int("backtest", "atr_period", bt.atr_period as i64).max(1)
                    as usize,
                atr_multiplier: config.get_double("backtest", "atr_multiplier", bt.atr_multiplier),
                commission_pct: config.get_double("backtest", "commission_pct", bt.commission_pct),
                allow_short: config.get_bool("backtest", "allow_short", bt.allow_short),
            },
            default_balance: config.get_double(
                "auto_trade",
                "default_balance",
                defaults.default_balance,
            ),
        })
    }
}

/// Single-series score on the default timeframe plus the multi-timeframe
/// confluence for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAnalysis {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub analysis: ScoreOutcome,
    pub confluence: ConfluenceOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecommendation {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub side: Side,
    pub recommendation: Recommendation,
    pub composite_score: f64,
    pub confluence_bias: Option<Bias>,
    pub confluence_score: Option<f64>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_reward: f64,
    pub position: Option<PositionSize>,
    /// Why no position size could be suggested.
    pub sizing_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    Recommended(TradeRecommendation),
    Hold {
        symbol: String,
        composite_score: f64,
        reason: String,
    },
    NoData {
        symbol: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub symbol: String,
    pub price: f64,
    pub score: f64,
    pub recommendation: Recommendation,
    pub confluence_bias: Option<Bias>,
    pub confluence_score: Option<f64>,
}

pub struct TradingEngine {
    market_data: Arc<dyn MarketDataPort>,
    trader: AutoTrader,
    settings: EngineSettings,
}

impl TradingEngine {
    pub fn new(
        market_data: Arc<dyn MarketDataPort>,
        store: Arc<dyn TradeStore>,
        settings: EngineSettings,
    ) -> Self {
        let market_data: Arc<dyn MarketDataPort> = if settings.cache_ttl.is_zero() {
            market_data
        } else {
            Arc::new(CachedMarketData::new(market_data, settings.cache_ttl))
        };
        let trader = AutoTrader::new(store).with_default_balance(settings.default_balance);

        Self {
            market_data,
            trader,
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.trader = self.trader.with_clock(clock);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn auto_trader(&self) -> &AutoTrader {
        &self.trader
    }

    /// Reload persisted trader state. Call once before serving signals.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        self.trader.restore().await
    }

    pub async fn analyze_asset(&self, symbol: &str) -> AssetAnalysis {
        let symbol = normalize_symbol(symbol);
        let timeframe = self.settings.default_timeframe;

        let bars = fetch_with_timeout(
            self.market_data.as_ref(),
            &symbol,
            timeframe,
            self.settings.fetch_timeout,
        )
        .await;
        let analysis = match &bars {
            Some(bars) => signal::score_series(bars),
            None => ScoreOutcome::InsufficientData {
                bars: 0,
                required: MIN_BARS,
            },
        };

        let source = Prefetched {
            inner: self.market_data.as_ref(),
            symbol: &symbol,
            timeframe,
            bars,
        };
        let confluence = confluence::analyze_timeframes(
            &source,
            &symbol,
            &self.settings.timeframes,
            self.settings.fetch_timeout,
        )
        .await;

        AssetAnalysis {
            symbol,
            timeframe,
            analysis,
            confluence,
        }
    }

    /// Direction from the composite score, vetoed when the confluence bias
    /// points the other way. Stops and targets come from the ATR calculator
    /// and the size from the configured risk percentage of `capital`.
    pub async fn get_trade_recommendation(
        &self,
        symbol: &str,
        capital: f64,
    ) -> RecommendationOutcome {
        let asset = self.analyze_asset(symbol).await;
        let symbol = asset.symbol;

        let Some(analysis) = asset.analysis.analysis() else {
            return RecommendationOutcome::NoData {
                reason: format!(
                    "not enough {} bars to score (need {MIN_BARS})",
                    asset.timeframe
                ),
                symbol,
            };
        };

        recommend(
            symbol,
            asset.timeframe,
            analysis,
            asset.confluence.result(),
            capital,
            &self.settings.backtest,
        )
    }

    /// Actionable symbols ranked by composite strength, strongest first,
    /// ties broken by symbol. Holds and unscorable symbols are left out.
    pub async fn scan_best_opportunities(&self, symbols: &[String], limit: usize) -> Vec<Opportunity> {
        let mut found = Vec::new();

        for symbol in symbols {
            let asset = self.analyze_asset(symbol).await;
            let Some(analysis) = asset.analysis.analysis() else {
                tracing::debug!(symbol = %asset.symbol, "scan: not enough data");
                continue;
            };
            if !analysis.composite.recommendation.is_actionable() {
                continue;
            }
            let confluence = asset.confluence.result();
            found.push(Opportunity {
                price: analysis.indicators.price,
                score: analysis.composite.score,
                recommendation: analysis.composite.recommendation,
                confluence_bias: confluence.map(|c| c.bias),
                confluence_score: confluence.map(|c| c.score),
                symbol: asset.symbol,
            });
        }

        rank_opportunities(found, limit)
    }

    /// Replay a named strategy over the symbol's history. A missing series
    /// reads as zero bars.
    pub async fn run_backtest(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
        strategy: &str,
    ) -> Result<BacktestOutcome, EngineError> {
        let kind: StrategyKind = strategy.parse()?;
        let strategy = kind.build();
        let symbol = normalize_symbol(symbol);
        let timeframe = timeframe.unwrap_or(self.settings.default_timeframe);

        let bars = fetch_with_timeout(
            self.market_data.as_ref(),
            &symbol,
            timeframe,
            self.settings.fetch_timeout,
        )
        .await
        .unwrap_or_default();

        let outcome = backtest::run_backtest(&bars, strategy.as_ref(), &self.settings.backtest);
        match &outcome {
            BacktestOutcome::Completed(result) => tracing::info!(
                %symbol,
                %timeframe,
                strategy = %kind,
                trades = result.total_trades,
                total_return_pct = result.total_return_pct,
                "backtest completed"
            ),
            BacktestOutcome::InsufficientData { bars, required } => tracing::warn!(
                %symbol,
                %timeframe,
                strategy = %kind,
                bars,
                required,
                "backtest skipped, not enough data"
            ),
        }
        Ok(outcome)
    }

    pub async fn configure_user(
        &self,
        user_id: &str,
        update: &TradeConfigUpdate,
    ) -> Result<TradeConfig, EngineError> {
        self.trader.configure_user(user_id, update).await
    }

    pub async fn process_signal(
        &self,
        user_id: &str,
        symbol: &str,
        signal: &TradeSignal,
        current_price: f64,
    ) -> ProcessOutcome {
        self.trader
            .process_signal(user_id, symbol, signal, current_price)
            .await
    }

    pub async fn check_stop_loss_take_profit(&self, symbol: &str, current_price: f64) -> Vec<AutoTrade> {
        self.trader
            .check_stop_loss_take_profit(symbol, current_price)
            .await
    }

    pub async fn close_trade(&self, user_id: &str, trade_id: Uuid, price: f64) -> Option<AutoTrade> {
        self.trader.close_trade(user_id, trade_id, price).await
    }

    pub async fn get_user_trades(&self, user_id: &str, status: Option<TradeStatus>) -> Vec<AutoTrade> {
        self.trader.get_user_trades(user_id, status).await
    }

    pub async fn get_user_stats(&self, user_id: &str) -> UserStats {
        self.trader.get_user_stats(user_id).await
    }
}

fn recommend(
    symbol: String,
    timeframe: Timeframe,
    analysis: &SeriesAnalysis,
    confluence: Option<&ConfluenceResult>,
    capital: f64,
    sizing: &BacktestConfig,
) -> RecommendationOutcome {
    let composite = &analysis.composite;
    let Some(side) = composite.recommendation.side() else {
        return RecommendationOutcome::Hold {
            symbol,
            composite_score: composite.score,
            reason: format!("composite score {:.1} is inside the hold band", composite.score),
        };
    };

    if let Some(bias_side) = confluence.and_then(|c| c.bias.side())
        && bias_side != side
    {
        return RecommendationOutcome::Hold {
            symbol,
            composite_score: composite.score,
            reason: format!(
                "{} signal conflicts with {} timeframe bias",
                side.as_str(),
                bias_side.as_str()
            ),
        };
    }

    let entry = analysis.indicators.price;
    let levels = risk::atr_stop_targets(entry, analysis.indicators.atr, sizing.atr_multiplier, side);
    let (position, sizing_error) = match risk::calculate_position_size(
        capital,
        sizing.risk_per_trade_pct,
        entry,
        levels.stop_loss,
        Some(capital),
    ) {
        Ok(size) => (Some(size), None),
        Err(err) => (None, Some(err.to_string())),
    };

    RecommendationOutcome::Recommended(TradeRecommendation {
        symbol,
        timeframe,
        side,
        recommendation: composite.recommendation,
        composite_score: composite.score,
        confluence_bias: confluence.map(|c| c.bias),
        confluence_score: confluence.map(|c| c.score),
        entry_price: entry,
        stop_loss: levels.stop_loss,
        take_profit_1: levels.take_profit_1,
        take_profit_2: levels.take_profit_2,
        risk_reward: risk::risk_reward_ratio(entry, levels.stop_loss, levels.take_profit_2),
        position,
        sizing_error,
    })
}

/// Strongest |score| first, ties by symbol, cut to `limit`.
fn rank_opportunities(mut found: Vec<Opportunity>, limit: usize) -> Vec<Opportunity> {
    found.sort_by(|a, b| {
        b.score
            .abs()
            .total_cmp(&a.score.abs())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    found.truncate(limit);
    found
}

/// Serves the series `analyze_asset` already fetched and forwards every
/// other request, so the default timeframe is read once per analysis.
struct Prefetched<'a> {
    inner: &'a dyn MarketDataPort,
    symbol: &'a str,
    timeframe: Timeframe,
    bars: Option<Vec<OhlcvBar>>,
}

#[async_trait]
impl MarketDataPort for Prefetched<'_> {
    async fn fetch_ohlc(&self, symbol: &str, timeframe: Timeframe) -> Option<Vec<OhlcvBar>> {
        if timeframe == self.timeframe && symbol == self.symbol {
            return self.bars.clone();
        }
        self.inner.fetch_ohlc(symbol, timeframe).await
    }
}

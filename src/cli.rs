//! CLI definition and dispatch.
//!
//! Every command prints its structured result as JSON on stdout; progress and
//! diagnostics go to stderr through `tracing`.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_store::InMemoryTradeStore;
use crate::domain::auto_trader::config::TradeConfigUpdate;
use crate::domain::auto_trader::trade::{TradeSignal, TradeStatus};
use crate::domain::config_validation::validate_all;
use crate::domain::error::EngineError;
use crate::domain::strategy::{StrategyKind, TradeAction};
use crate::domain::timeframe::Timeframe;
use crate::engine::{EngineSettings, TradingEngine};
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store::TradeStore;

const DEFAULT_CSV_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(name = "confluence", about = "Market analysis and paper-trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score a symbol and compute its multi-timeframe confluence
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Suggest a trade with stops, targets and size for the given capital
    Recommend {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,
    },
    /// Rank the strongest opportunities across symbols
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated; defaults to [data] symbols, then every CSV file
        #[arg(long)]
        symbols: Option<String>,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Replay a built-in strategy over a symbol's history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "rsi_macd")]
        strategy: String,
        #[arg(long)]
        timeframe: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List the built-in strategies
    Strategies,
    /// Paper-trading operations against the configured trade store
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        command: TradeCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum TradeCommand {
    /// Create or update a user's auto-trading settings
    Configure {
        #[arg(long)]
        user: String,
        #[arg(long)]
        enabled: Option<bool>,
        /// Comma separated
        #[arg(long)]
        allowed_symbols: Option<String>,
        #[arg(long)]
        min_score: Option<f64>,
        #[arg(long)]
        max_daily_trades: Option<u32>,
        #[arg(long)]
        max_daily_loss_pct: Option<f64>,
        #[arg(long)]
        max_position_pct: Option<f64>,
        #[arg(long)]
        risk_pct: Option<f64>,
        /// Enables the trailing stop at this distance
        #[arg(long)]
        trailing_stop_pct: Option<f64>,
    },
    /// Submit a signal for a user and open a trade if every gate passes
    Signal {
        #[arg(long)]
        user: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, value_enum)]
        action: SignalAction,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        stop_loss: Option<f64>,
        #[arg(long)]
        take_profit: Option<f64>,
    },
    /// Apply a price tick to every open trade on a symbol
    Tick {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        price: f64,
    },
    /// Close one of a user's open trades
    Close {
        #[arg(long)]
        user: String,
        #[arg(long)]
        trade_id: Uuid,
        #[arg(long)]
        price: f64,
    },
    /// List a user's trades, newest first
    List {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum)]
        status: Option<StatusFilter>,
    },
    /// Balance, win rate and today's counters for a user
    Stats {
        #[arg(long)]
        user: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
}

impl From<SignalAction> for TradeAction {
    fn from(action: SignalAction) -> Self {
        match action {
            SignalAction::Buy => TradeAction::Buy,
            SignalAction::Sell => TradeAction::Sell,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Pending,
    Open,
    Closed,
    Cancelled,
    StoppedOut,
    TakeProfit,
}

impl From<StatusFilter> for TradeStatus {
    fn from(status: StatusFilter) -> Self {
        match status {
            StatusFilter::Pending => TradeStatus::Pending,
            StatusFilter::Open => TradeStatus::Open,
            StatusFilter::Closed => TradeStatus::Closed,
            StatusFilter::Cancelled => TradeStatus::Cancelled,
            StatusFilter::StoppedOut => TradeStatus::StoppedOut,
            StatusFilter::TakeProfit => TradeStatus::TakeProfit,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Analyze { config, symbol } => run_analyze(&config, &symbol),
        Command::Recommend {
            config,
            symbol,
            capital,
        } => run_recommend(&config, &symbol, capital),
        Command::Scan {
            config,
            symbols,
            limit,
        } => run_scan(&config, symbols.as_deref(), limit),
        Command::Backtest {
            config,
            symbol,
            strategy,
            timeframe,
        } => run_backtest(&config, &symbol, &strategy, timeframe.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Strategies => print_json(&StrategyKind::ALL),
        Command::Trade { config, command } => run_trade(&config, command),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, EngineError> {
    tracing::info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

pub fn csv_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("data", "csv_dir")
            .unwrap_or_else(|| DEFAULT_CSV_DIR.to_string()),
    )
}

#[cfg(feature = "sqlite")]
fn build_store(config: &dyn ConfigPort) -> Result<Arc<dyn TradeStore>, EngineError> {
    use crate::adapters::sqlite_adapter::SqliteTradeStore;

    if config.get_string("sqlite", "path").is_some() {
        return Ok(Arc::new(SqliteTradeStore::from_config(config)?));
    }
    Ok(Arc::new(InMemoryTradeStore::new()))
}

#[cfg(not(feature = "sqlite"))]
fn build_store(config: &dyn ConfigPort) -> Result<Arc<dyn TradeStore>, EngineError> {
    if config.get_string("sqlite", "path").is_some() {
        tracing::warn!("sqlite feature disabled, using in-memory trade store");
    }
    Ok(Arc::new(InMemoryTradeStore::new()))
}

/// Engine over the configured CSV directory and trade store.
pub fn build_engine(config: &dyn ConfigPort) -> Result<TradingEngine, EngineError> {
    let settings = EngineSettings::from_config(config)?;
    let market_data = Arc::new(CsvMarketData::new(csv_dir(config)));
    let store = build_store(config)?;
    Ok(TradingEngine::new(market_data, store, settings))
}

/// Engine with the trader state reloaded from the store. Every trade
/// command goes through here so limits and open positions carry across
/// invocations.
pub async fn open_engine(config: &dyn ConfigPort) -> Result<TradingEngine, EngineError> {
    let engine = build_engine(config)?;
    let restored = engine.restore().await?;
    tracing::debug!(open_trades = restored, "trader state loaded");
    Ok(engine)
}

/// Run one trade command and return its result as JSON.
pub async fn execute_trade_command(
    engine: &TradingEngine,
    command: TradeCommand,
) -> Result<Value, EngineError> {
    match command {
        TradeCommand::Configure {
            user,
            enabled,
            allowed_symbols,
            min_score,
            max_daily_trades,
            max_daily_loss_pct,
            max_position_pct,
            risk_pct,
            trailing_stop_pct,
        } => {
            let update = TradeConfigUpdate {
                enabled,
                allowed_symbols: allowed_symbols.map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                }),
                min_confluence_score: min_score,
                max_daily_trades,
                max_daily_loss_pct,
                max_position_size_pct: max_position_pct,
                risk_per_trade_pct: risk_pct,
                trailing_stop_enabled: trailing_stop_pct.map(|_| true),
                trailing_stop_pct,
                ..Default::default()
            };
            to_json(&engine.configure_user(&user, &update).await?)
        }
        TradeCommand::Signal {
            user,
            symbol,
            action,
            score,
            price,
            stop_loss,
            take_profit,
        } => {
            let signal = TradeSignal {
                stop_loss,
                take_profit,
                ..TradeSignal::new(action.into(), score)
            };
            to_json(&engine.process_signal(&user, &symbol, &signal, price).await)
        }
        TradeCommand::Tick { symbol, price } => {
            to_json(&engine.check_stop_loss_take_profit(&symbol, price).await)
        }
        TradeCommand::Close {
            user,
            trade_id,
            price,
        } => match engine.close_trade(&user, trade_id, price).await {
            Some(trade) => to_json(&trade),
            None => Err(EngineError::TradeNotFound {
                user_id: user,
                trade_id: trade_id.to_string(),
            }),
        },
        TradeCommand::List { user, status } => {
            to_json(&engine.get_user_trades(&user, status.map(Into::into)).await)
        }
        TradeCommand::Stats { user } => to_json(&engine.get_user_stats(&user).await),
    }
}

/// `--symbols` wins, then `[data] symbols`, then every CSV file for the
/// default timeframe.
pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
    timeframe: Timeframe,
) -> Result<Vec<String>, EngineError> {
    let split = |raw: &str| -> Vec<String> {
        raw.split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    };

    if let Some(raw) = symbols_override {
        return Ok(split(raw));
    }
    if let Some(list) = config.get_list("data", "symbols")
        && !list.is_empty()
    {
        return Ok(list.iter().map(|s| s.to_uppercase()).collect());
    }
    CsvMarketData::new(csv_dir(config)).list_symbols(timeframe)
}

fn runtime() -> Result<tokio::runtime::Runtime, EngineError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn encode_error(e: serde_json::Error) -> EngineError {
    EngineError::Io(std::io::Error::other(format!("failed to encode output: {e}")))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, EngineError> {
    serde_json::to_value(value).map_err(encode_error)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), EngineError> {
    let out = serde_json::to_string_pretty(value).map_err(encode_error)?;
    println!("{out}");
    Ok(())
}

fn run_analyze(config_path: &Path, symbol: &str) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let analysis = runtime()?.block_on(engine.analyze_asset(symbol));
    print_json(&analysis)
}

fn run_recommend(config_path: &Path, symbol: &str, capital: f64) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let outcome = runtime()?.block_on(engine.get_trade_recommendation(symbol, capital));
    print_json(&outcome)
}

fn run_scan(config_path: &Path, symbols: Option<&str>, limit: usize) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let symbols = resolve_symbols(symbols, &config, engine.settings().default_timeframe)?;
    if symbols.is_empty() {
        return Err(EngineError::ConfigMissing {
            section: "data".into(),
            key: "symbols".into(),
        });
    }

    tracing::info!(count = symbols.len(), limit, "scanning symbols");
    let found = runtime()?.block_on(engine.scan_best_opportunities(&symbols, limit));
    print_json(&found)
}

fn run_backtest(
    config_path: &Path,
    symbol: &str,
    strategy: &str,
    timeframe: Option<&str>,
) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    let timeframe = timeframe.map(str::parse::<Timeframe>).transpose()?;
    let engine = build_engine(&config)?;
    let outcome = runtime()?.block_on(engine.run_backtest(symbol, timeframe, strategy))?;
    print_json(&outcome)
}

fn run_validate(config_path: &Path) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    validate_all(&config)?;
    let settings = EngineSettings::from_config(&config)?;
    eprintln!(
        "configuration is valid: timeframes {:?}, default {}, csv dir {}",
        settings
            .timeframes
            .iter()
            .map(|tf| tf.as_str())
            .collect::<Vec<_>>(),
        settings.default_timeframe,
        csv_dir(&config).display()
    );
    Ok(())
}

fn run_trade(config_path: &Path, command: TradeCommand) -> Result<(), EngineError> {
    let config = load_config(config_path)?;
    if config.get_string("sqlite", "path").is_none() {
        tracing::warn!("no [sqlite] path configured, trades will not outlive this command");
    }
    let output = runtime()?.block_on(async {
        let engine = open_engine(&config).await?;
        execute_trade_command(&engine, command).await
    })?;
    print_json(&output)
}

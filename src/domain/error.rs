//! Domain error types.
//!
//! Only conditions the caller cannot recover from locally live here. Missing
//! data, failed trade gates and degenerate sizing are reported through outcome
//! enums instead (see [`crate::domain::signal::ScoreOutcome`],
//! [`crate::domain::auto_trader::ProcessOutcome`]).

/// Top-level error type for confluence.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("storage query error: {reason}")]
    StorageQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid trade config for user {user_id}: {reason}")]
    InvalidTradeConfig { user_id: String, reason: String },

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("no data for {symbol}: {reason}")]
    NoData { symbol: String, reason: String },

    #[error("no open trade {trade_id} for user {user_id}")]
    TradeNotFound { user_id: String, trade_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. }
            | EngineError::InvalidTradeConfig { .. } => 2,
            EngineError::Storage { .. } | EngineError::StorageQuery { .. } => 3,
            EngineError::UnknownStrategy(_) | EngineError::UnknownTimeframe(_) => 4,
            EngineError::NoData { .. } | EngineError::TradeNotFound { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}

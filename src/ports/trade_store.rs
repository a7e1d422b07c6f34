//! Persistence port for auto-trading state.

use crate::domain::auto_trader::config::TradeConfig;
use crate::domain::auto_trader::trade::AutoTrade;
use crate::domain::error::EngineError;
use async_trait::async_trait;

/// Record store for per-user configs, trades and simulated balances.
///
/// Implementations are free to be slow or unreliable; the auto trader treats
/// every write failure as non-fatal and keeps its in-memory state.
#[async_trait]
pub trait TradeStore: Send + Sync {
    async fn save_config(&self, user_id: &str, config: &TradeConfig) -> Result<(), EngineError>;

    async fn load_config(&self, user_id: &str) -> Result<Option<TradeConfig>, EngineError>;

    async fn list_configs(&self) -> Result<Vec<(String, TradeConfig)>, EngineError>;

    /// Insert or replace by `trade.id`.
    async fn save_trade(&self, trade: &AutoTrade) -> Result<(), EngineError>;

    async fn list_open_trades(&self) -> Result<Vec<AutoTrade>, EngineError>;

    async fn list_user_trades(&self, user_id: &str) -> Result<Vec<AutoTrade>, EngineError>;

    async fn get_balance(&self, user_id: &str) -> Result<Option<f64>, EngineError>;

    /// Add `delta` (negative to debit) and return the new balance. A user
    /// without a balance starts from `initial`.
    async fn adjust_balance(
        &self,
        user_id: &str,
        initial: f64,
        delta: f64,
    ) -> Result<f64, EngineError>;
}

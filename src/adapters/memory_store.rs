//! In-process trade store. Default backend and test double.

use crate::domain::auto_trader::config::TradeConfig;
use crate::domain::auto_trader::trade::AutoTrade;
use crate::domain::error::EngineError;
use crate::ports::trade_store::TradeStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Records {
    configs: BTreeMap<String, TradeConfig>,
    trades: HashMap<Uuid, AutoTrade>,
    balances: HashMap<String, f64>,
}

#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    records: RwLock<Records>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn save_config(&self, user_id: &str, config: &TradeConfig) -> Result<(), EngineError> {
        self.records
            .write()
            .await
            .configs
            .insert(user_id.to_string(), config.clone());
        Ok(())
    }

    async fn load_config(&self, user_id: &str) -> Result<Option<TradeConfig>, EngineError> {
        Ok(self.records.read().await.configs.get(user_id).cloned())
    }

    async fn list_configs(&self) -> Result<Vec<(String, TradeConfig)>, EngineError> {
        Ok(self
            .records
            .read()
            .await
            .configs
            .iter()
            .map(|(user, config)| (user.clone(), config.clone()))
            .collect())
    }

    async fn save_trade(&self, trade: &AutoTrade) -> Result<(), EngineError> {
        self.records
            .write()
            .await
            .trades
            .insert(trade.id, trade.clone());
        Ok(())
    }

    async fn list_open_trades(&self) -> Result<Vec<AutoTrade>, EngineError> {
        let records = self.records.read().await;
        let mut open: Vec<AutoTrade> = records
            .trades
            .values()
            .filter(|t| t.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn list_user_trades(&self, user_id: &str) -> Result<Vec<AutoTrade>, EngineError> {
        let records = self.records.read().await;
        let mut trades: Vec<AutoTrade> = records
            .trades
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        trades.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(trades)
    }

    async fn get_balance(&self, user_id: &str) -> Result<Option<f64>, EngineError> {
        Ok(self.records.read().await.balances.get(user_id).copied())
    }

    async fn adjust_balance(
        &self,
        user_id: &str,
        initial: f64,
        delta: f64,
    ) -> Result<f64, EngineError> {
        let mut records = self.records.write().await;
        let balance = records
            .balances
            .entry(user_id.to_string())
            .or_insert(initial);
        *balance += delta;
        Ok(*balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn balance_starts_from_initial() {
        let store = InMemoryTradeStore::new();
        assert_eq!(store.get_balance("u1").await.unwrap(), None);
        assert_eq!(store.adjust_balance("u1", 1000.0, -250.0).await.unwrap(), 750.0);
        assert_eq!(store.adjust_balance("u1", 1000.0, 50.0).await.unwrap(), 800.0);
        assert_eq!(store.get_balance("u1").await.unwrap(), Some(800.0));
    }

    #[tokio::test]
    async fn configs_round_trip() {
        let store = InMemoryTradeStore::new();
        let config = TradeConfig {
            enabled: true,
            ..TradeConfig::default()
        };
        store.save_config("u1", &config).await.unwrap();
        assert_eq!(store.load_config("u1").await.unwrap(), Some(config.clone()));
        assert_eq!(store.load_config("u2").await.unwrap(), None);
        assert_eq!(store.list_configs().await.unwrap(), vec![("u1".to_string(), config)]);
    }
}

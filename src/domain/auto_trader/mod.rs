//! Per-user paper-trading engine.
//!
//! All mutable state lives in one [`TraderState`] behind a single async
//! mutex. `process_signal`, `check_stop_loss_take_profit` and `close_trade`
//! take the lock before their first read and keep it through their last
//! write, including the awaited store calls in between, so concurrent
//! signals for the same user and symbol cannot both pass the open-position
//! gate.
//!
//! The store is write-through: a failed write is logged and the in-memory
//! transition stands.

pub mod config;
pub mod stats;
pub mod trade;

use crate::domain::error::EngineError;
use crate::domain::risk::{self, Side};
use crate::ports::trade_store::TradeStore;
use chrono::{DateTime, NaiveDate, Utc};
use config::{TradeConfig, TradeConfigUpdate, normalize_symbol};
use serde::{Deserialize, Serialize};
use stats::{DailyStats, UserStats};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use trade::{AutoTrade, CloseReason, TradeSignal, TradeStatus};
use uuid::Uuid;

/// Simulated starting balance for users the store knows nothing about.
pub const DEFAULT_BALANCE: f64 = 10_000.0;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessOutcome {
    Executed { trade: AutoTrade },
    Skip { reason: String },
}

impl ProcessOutcome {
    pub fn trade(&self) -> Option<&AutoTrade> {
        match self {
            ProcessOutcome::Executed { trade } => Some(trade),
            ProcessOutcome::Skip { .. } => None,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, ProcessOutcome::Skip { .. })
    }
}

#[derive(Debug, Default)]
pub struct TraderState {
    pub configs: HashMap<String, TradeConfig>,
    /// Open trades, plus closed ones whose final state has not reached the
    /// store yet, keyed by id.
    pub trades: HashMap<Uuid, AutoTrade>,
    pub daily_stats: HashMap<(String, NaiveDate), DailyStats>,
    pub balances: HashMap<String, f64>,
}

impl TraderState {
    fn has_open_trade(&self, user_id: &str, symbol: &str) -> bool {
        self.trades
            .values()
            .any(|t| t.is_open() && t.user_id == user_id && t.symbol == symbol)
    }

    fn open_trade_ids(&self, symbol: &str) -> Vec<Uuid> {
        let mut ids: Vec<(DateTime<Utc>, Uuid)> = self
            .trades
            .values()
            .filter(|t| t.is_open() && t.symbol == symbol)
            .map(|t| (t.created_at, t.id))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }
}

pub struct AutoTrader {
    state: Mutex<TraderState>,
    store: Arc<dyn TradeStore>,
    clock: Clock,
    default_balance: f64,
}

impl AutoTrader {
    pub fn new(store: Arc<dyn TradeStore>) -> Self {
        Self {
            state: Mutex::new(TraderState::default()),
            store,
            clock: Arc::new(Utc::now),
            default_balance: DEFAULT_BALANCE,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_balance(mut self, balance: f64) -> Self {
        self.default_balance = balance;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Load configs, open trades and balances from the store, and rebuild
    /// today's daily counters from the stored trades. Meant for startup;
    /// returns the number of open trades restored.
    pub async fn restore(&self) -> Result<usize, EngineError> {
        let configs = self.store.list_configs().await?;
        let open = self.store.list_open_trades().await?;

        let mut state = self.state.lock().await;
        for (user_id, config) in configs {
            if let Some(balance) = self.store.get_balance(&user_id).await? {
                state.balances.insert(user_id.clone(), balance);
            }
            state.configs.insert(user_id, config.clamped());
        }
        let mut restored = 0;
        for trade in open.into_iter().filter(AutoTrade::is_open) {
            if !state.balances.contains_key(&trade.user_id) {
                if let Some(balance) = self.store.get_balance(&trade.user_id).await? {
                    state.balances.insert(trade.user_id.clone(), balance);
                }
            }
            state.trades.insert(trade.id, trade);
            restored += 1;
        }

        let today = self.now().date_naive();
        let users: BTreeSet<String> = state
            .configs
            .keys()
            .chain(state.trades.values().map(|t| &t.user_id))
            .cloned()
            .collect();
        for user_id in users {
            let trades = self.store.list_user_trades(&user_id).await?;
            let balance = state
                .balances
                .get(&user_id)
                .copied()
                .unwrap_or(self.default_balance);
            if let Some(stats) = DailyStats::rebuild(today, balance, &trades) {
                state.daily_stats.insert((user_id, today), stats);
            }
        }

        tracing::info!(
            configs = state.configs.len(),
            open_trades = restored,
            daily_stats = state.daily_stats.len(),
            "auto trader state restored"
        );
        Ok(restored)
    }

    /// Merge, clamp and store a user's configuration.
    pub async fn configure_user(
        &self,
        user_id: &str,
        update: &TradeConfigUpdate,
    ) -> Result<TradeConfig, EngineError> {
        let mut state = self.state.lock().await;
        let current = state.configs.get(user_id).cloned().unwrap_or_default();
        let config = current.apply(user_id, update)?;

        if let Err(err) = self.store.save_config(user_id, &config).await {
            tracing::warn!(%user_id, %err, "failed to persist trade config");
        }
        state.configs.insert(user_id.to_string(), config.clone());
        tracing::info!(%user_id, enabled = config.enabled, "trade config updated");
        Ok(config)
    }

    pub async fn get_config(&self, user_id: &str) -> Option<TradeConfig> {
        self.state.lock().await.configs.get(user_id).cloned()
    }

    /// Current simulated balance, loading it from the store on first use.
    async fn balance(&self, state: &mut TraderState, user_id: &str) -> f64 {
        if let Some(&balance) = state.balances.get(user_id) {
            return balance;
        }
        let balance = match self.store.get_balance(user_id).await {
            Ok(Some(balance)) => balance,
            Ok(None) => self.default_balance,
            Err(err) => {
                tracing::warn!(%user_id, %err, "balance lookup failed, using default");
                self.default_balance
            }
        };
        state.balances.insert(user_id.to_string(), balance);
        balance
    }

    async fn adjust_balance(&self, state: &mut TraderState, user_id: &str, delta: f64) -> f64 {
        let current = self.balance(state, user_id).await;
        let updated = current + delta;
        state.balances.insert(user_id.to_string(), updated);
        if let Err(err) = self
            .store
            .adjust_balance(user_id, self.default_balance, delta)
            .await
        {
            tracing::warn!(%user_id, delta, %err, "failed to persist balance change");
        }
        updated
    }

    async fn today_stats<'s>(
        &self,
        state: &'s mut TraderState,
        user_id: &str,
        date: NaiveDate,
    ) -> &'s mut DailyStats {
        let key = (user_id.to_string(), date);
        if !state.daily_stats.contains_key(&key) {
            let balance = self.balance(state, user_id).await;
            state
                .daily_stats
                .insert(key.clone(), DailyStats::new(date, balance));
        }
        state
            .daily_stats
            .entry(key)
            .or_insert_with(|| DailyStats::new(date, self.default_balance))
    }

    async fn persist_trade(&self, trade: &AutoTrade) -> bool {
        match self.store.save_trade(trade).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(trade_id = %trade.id, %err, "failed to persist trade");
                false
            }
        }
    }

    /// Number of trades held in memory.
    pub async fn tracked_trades(&self) -> usize {
        self.state.lock().await.trades.len()
    }

    /// Run a live signal through the gates and open a trade if all pass.
    pub async fn process_signal(
        &self,
        user_id: &str,
        symbol: &str,
        signal: &TradeSignal,
        current_price: f64,
    ) -> ProcessOutcome {
        let symbol = normalize_symbol(symbol);
        let now = self.now();
        let mut state = self.state.lock().await;

        let Some(config) = state.configs.get(user_id).cloned() else {
            return skipped(user_id, &symbol, "auto trading not configured");
        };
        if !config.enabled {
            return skipped(user_id, &symbol, "auto trading disabled");
        }
        if !config.is_symbol_allowed(&symbol) {
            return skipped(user_id, &symbol, format!("symbol {symbol} not allowed"));
        }
        if signal.confluence_score.is_nan() || signal.confluence_score < config.min_confluence_score
        {
            return skipped(
                user_id,
                &symbol,
                format!(
                    "confluence score {:.1} below minimum {:.1}",
                    signal.confluence_score, config.min_confluence_score
                ),
            );
        }

        let today = self.today_stats(&mut state, user_id, now.date_naive()).await;
        if let Err(reason) = today.within_limits(config.max_daily_trades, config.max_daily_loss_pct)
        {
            return skipped(user_id, &symbol, reason);
        }

        if state.has_open_trade(user_id, &symbol) {
            return skipped(user_id, &symbol, format!("open {symbol} position already exists"));
        }

        let side = signal.side();
        let stop_loss = match signal.stop_loss {
            Some(stop) => stop,
            None => risk::percent_stop(
                current_price,
                signal
                    .stop_loss_percent
                    .unwrap_or(trade::DEFAULT_STOP_LOSS_PCT),
                side,
            ),
        };
        let wrong_side = match side {
            Side::Long => stop_loss >= current_price,
            Side::Short => stop_loss <= current_price,
        };
        if wrong_side {
            return skipped(
                user_id,
                &symbol,
                format!("stop {stop_loss} on wrong side of entry {current_price}"),
            );
        }

        let balance = self.balance(&mut state, user_id).await;
        let size = match risk::calculate_position_size(
            balance,
            config.risk_per_trade_pct,
            current_price,
            stop_loss,
            Some(balance * config.max_position_size_pct / 100.0),
        ) {
            Ok(size) => size,
            Err(err) => return skipped(user_id, &symbol, format!("position sizing failed: {err}")),
        };

        let take_profit = config.use_take_profit.then(|| {
            signal.take_profit.unwrap_or_else(|| {
                risk::r_multiple_target(current_price, stop_loss, trade::DEFAULT_TAKE_PROFIT_R, side)
            })
        });

        let trade = AutoTrade {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            symbol: symbol.clone(),
            side,
            entry_price: current_price,
            quantity: size.quantity,
            position_value: size.position_value,
            stop_loss,
            take_profit,
            status: TradeStatus::Open,
            signal_score: signal.confluence_score,
            created_at: now,
            closed_at: None,
            exit_price: None,
            pnl: None,
            pnl_percent: None,
            close_reason: None,
        };

        self.persist_trade(&trade).await;
        self.adjust_balance(&mut state, user_id, -trade.position_value)
            .await;
        self.today_stats(&mut state, user_id, now.date_naive())
            .await
            .record_open();
        state.trades.insert(trade.id, trade.clone());

        tracing::info!(
            %user_id,
            %symbol,
            trade_id = %trade.id,
            side = side.as_str(),
            entry = current_price,
            quantity = trade.quantity,
            stop_loss,
            "auto trade opened"
        );
        ProcessOutcome::Executed { trade }
    }

    /// Close every open trade on `symbol` whose stop or target `current_price`
    /// crosses, across all users. Surviving trades of users with trailing
    /// stops enabled get their stop ratcheted. Returns the trades closed by
    /// this tick.
    pub async fn check_stop_loss_take_profit(
        &self,
        symbol: &str,
        current_price: f64,
    ) -> Vec<AutoTrade> {
        let symbol = normalize_symbol(symbol);
        let now = self.now();
        let mut state = self.state.lock().await;
        let mut closed = Vec::new();

        for id in state.open_trade_ids(&symbol) {
            let Some(trade) = state.trades.get(&id) else {
                continue;
            };
            let reason = if trade.stop_crossed(current_price) {
                Some(CloseReason::StopLoss)
            } else if trade.target_crossed(current_price) {
                Some(CloseReason::TakeProfit)
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    if let Some(trade) = self
                        .settle(&mut state, id, current_price, reason, now)
                        .await
                    {
                        closed.push(trade);
                    }
                }
                None => {
                    let user_id = trade.user_id.clone();
                    let trailing = state
                        .configs
                        .get(&user_id)
                        .filter(|c| c.trailing_stop_enabled)
                        .map(|c| c.trailing_stop_pct);
                    let Some(pct) = trailing else {
                        continue;
                    };
                    let Some(trade) = state.trades.get_mut(&id) else {
                        continue;
                    };
                    if trade.trail_stop(current_price, pct) {
                        tracing::debug!(trade_id = %id, stop_loss = trade.stop_loss, "trailing stop moved");
                        let snapshot = trade.clone();
                        self.persist_trade(&snapshot).await;
                    }
                }
            }
        }

        closed
    }

    /// Close one of the user's open trades at `price`. `None` when the trade
    /// does not exist, belongs to someone else or is already closed.
    pub async fn close_trade(&self, user_id: &str, trade_id: Uuid, price: f64) -> Option<AutoTrade> {
        let now = self.now();
        let mut state = self.state.lock().await;
        let owned = state
            .trades
            .get(&trade_id)
            .is_some_and(|t| t.user_id == user_id && t.is_open());
        if !owned {
            return None;
        }
        self.settle(&mut state, trade_id, price, CloseReason::Manual, now)
            .await
    }

    /// Terminal transition plus the balance credit and daily P&L. The trade
    /// leaves memory once the store has its final state.
    async fn settle(
        &self,
        state: &mut TraderState,
        id: Uuid,
        price: f64,
        reason: CloseReason,
        now: DateTime<Utc>,
    ) -> Option<AutoTrade> {
        let trade = state.trades.get_mut(&id)?;
        let pnl = trade.close(price, reason, now)?;
        let trade = trade.clone();

        let persisted = self.persist_trade(&trade).await;
        self.adjust_balance(state, &trade.user_id, trade.position_value + pnl)
            .await;
        self.today_stats(state, &trade.user_id, now.date_naive())
            .await
            .record_pnl(pnl);
        if persisted {
            state.trades.remove(&id);
        }

        tracing::info!(
            user_id = %trade.user_id,
            symbol = %trade.symbol,
            trade_id = %trade.id,
            exit = price,
            pnl,
            reason = ?reason,
            "auto trade closed"
        );
        Some(trade)
    }

    /// The user's trades, newest first, merged from memory and the store.
    pub async fn get_user_trades(
        &self,
        user_id: &str,
        status: Option<TradeStatus>,
    ) -> Vec<AutoTrade> {
        let state = self.state.lock().await;
        let mut by_id: HashMap<Uuid, AutoTrade> = match self.store.list_user_trades(user_id).await
        {
            Ok(trades) => trades.into_iter().map(|t| (t.id, t)).collect(),
            Err(err) => {
                tracing::warn!(%user_id, %err, "failed to load stored trades");
                HashMap::new()
            }
        };
        for trade in state.trades.values().filter(|t| t.user_id == user_id) {
            by_id.insert(trade.id, trade.clone());
        }

        let mut trades: Vec<AutoTrade> = by_id
            .into_values()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        trades
    }

    pub async fn get_user_stats(&self, user_id: &str) -> UserStats {
        let trades = self.get_user_trades(user_id, None).await;
        let now = self.now();
        let mut state = self.state.lock().await;
        let balance = self.balance(&mut state, user_id).await;
        let today = state
            .daily_stats
            .get(&(user_id.to_string(), now.date_naive()))
            .cloned()
            .unwrap_or_else(|| DailyStats::new(now.date_naive(), balance));

        let open = trades.iter().filter(|t| t.is_open()).count();
        let realized: Vec<f64> = trades
            .iter()
            .filter(|t| t.status.is_terminal())
            .filter_map(|t| t.pnl)
            .collect();

        UserStats::summarize(user_id, balance, open, &realized, today)
    }
}

fn skipped(user_id: &str, symbol: &str, reason: impl Into<String>) -> ProcessOutcome {
    let reason = reason.into();
    tracing::info!(%user_id, %symbol, %reason, "signal skipped");
    ProcessOutcome::Skip { reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_store::InMemoryTradeStore;
    use crate::domain::strategy::TradeAction;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;

    fn fixed_clock(at: DateTime<Utc>) -> (Clock, Arc<StdMutex<DateTime<Utc>>>) {
        let now = Arc::new(StdMutex::new(at));
        let handle = now.clone();
        let clock: Clock = Arc::new(move || *handle.lock().unwrap());
        (clock, now)
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap()
    }

    async fn trader_with_user(update: TradeConfigUpdate) -> AutoTrader {
        let trader = AutoTrader::new(Arc::new(InMemoryTradeStore::new()));
        let update = TradeConfigUpdate {
            enabled: Some(true),
            ..update
        };
        trader.configure_user("alice", &update).await.unwrap();
        trader
    }

    fn buy(score: f64) -> TradeSignal {
        TradeSignal::new(TradeAction::Buy, score)
    }

    #[tokio::test]
    async fn unconfigured_user_is_skipped() {
        let trader = AutoTrader::new(Arc::new(InMemoryTradeStore::new()));
        let outcome = trader.process_signal("bob", "BTC", &buy(90.0), 100.0).await;
        assert!(outcome.is_skip());
    }

    #[tokio::test]
    async fn disabled_config_never_trades() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        trader
            .configure_user(
                "alice",
                &TradeConfigUpdate {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = trader.process_signal("alice", "BTC", &buy(95.0), 100.0).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Skip {
                reason: "auto trading disabled".into()
            }
        );
        assert!(trader.get_user_trades("alice", None).await.is_empty());
    }

    #[tokio::test]
    async fn symbol_gate_is_case_insensitive() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        assert!(!trader.process_signal("alice", "btc", &buy(90.0), 100.0).await.is_skip());
        assert!(trader.process_signal("alice", "DOGE", &buy(90.0), 100.0).await.is_skip());
    }

    #[tokio::test]
    async fn low_confluence_is_skipped() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        let outcome = trader.process_signal("alice", "BTC", &buy(60.0), 100.0).await;
        match outcome {
            ProcessOutcome::Skip { reason } => assert!(reason.contains("below minimum")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reference_sizing_scenario() {
        let trader = trader_with_user(TradeConfigUpdate {
            max_position_size_pct: Some(25.0),
            ..Default::default()
        })
        .await;
        let signal = TradeSignal {
            stop_loss_percent: Some(2.0),
            ..buy(80.0)
        };
        let outcome = trader.process_signal("alice", "BTC", &signal, 50_000.0).await;
        let trade = outcome.trade().unwrap();
        // 1% of 10000 over 1000 risk = 0.1, capped by 25% of balance = 2500
        assert!((trade.stop_loss - 49_000.0).abs() < 1e-9);
        assert!((trade.position_value - 2_500.0).abs() < 1e-6);
        assert!((trade.quantity - 0.05).abs() < 1e-12);
        assert_eq!(trade.status, TradeStatus::Open);

        let stats = trader.get_user_stats("alice").await;
        assert!((stats.balance - 7_500.0).abs() < 1e-6);
        assert_eq!(stats.today.trades_count, 1);
        assert_eq!(stats.open_trades, 1);
    }

    #[tokio::test]
    async fn one_open_trade_per_symbol() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        assert!(!trader.process_signal("alice", "BTC", &buy(90.0), 100.0).await.is_skip());
        assert!(trader.process_signal("alice", "BTC", &buy(90.0), 101.0).await.is_skip());
        assert!(!trader.process_signal("alice", "ETH", &buy(90.0), 10.0).await.is_skip());
    }

    #[tokio::test]
    async fn daily_trade_limit_resets_on_new_day() {
        let (clock, now) = fixed_clock(start());
        let trader = AutoTrader::new(Arc::new(InMemoryTradeStore::new())).with_clock(clock);
        trader
            .configure_user(
                "alice",
                &TradeConfigUpdate {
                    enabled: Some(true),
                    max_daily_trades: Some(1),
                    allowed_symbols: Some(vec!["BTC".into(), "ETH".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!trader.process_signal("alice", "BTC", &buy(90.0), 100.0).await.is_skip());
        let second = trader.process_signal("alice", "ETH", &buy(90.0), 10.0).await;
        assert!(second.is_skip());

        *now.lock().unwrap() = start() + chrono::Duration::days(1);
        assert!(!trader.process_signal("alice", "ETH", &buy(90.0), 10.0).await.is_skip());
    }

    #[tokio::test]
    async fn restart_keeps_todays_trade_count() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (clock, _) = fixed_clock(start());
        let first = AutoTrader::new(store.clone()).with_clock(clock.clone());
        first
            .configure_user(
                "alice",
                &TradeConfigUpdate {
                    enabled: Some(true),
                    max_daily_trades: Some(1),
                    allowed_symbols: Some(vec!["BTC".into(), "ETH".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!first.process_signal("alice", "BTC", &buy(90.0), 100.0).await.is_skip());

        let second = AutoTrader::new(store).with_clock(clock);
        assert_eq!(second.restore().await.unwrap(), 1);
        let stats = second.get_user_stats("alice").await;
        assert_eq!(stats.today.trades_count, 1);
        assert!((stats.today.starting_balance - 10_000.0).abs() < 1e-6);
        match second.process_signal("alice", "ETH", &buy(90.0), 10.0).await {
            ProcessOutcome::Skip { reason } => assert!(reason.contains("daily trade limit")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn restart_keeps_todays_loss() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (clock, _) = fixed_clock(start());
        let first = AutoTrader::new(store.clone()).with_clock(clock.clone());
        first
            .configure_user(
                "alice",
                &TradeConfigUpdate {
                    enabled: Some(true),
                    max_daily_loss_pct: Some(1.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let trade = first
            .process_signal("alice", "BTC", &buy(90.0), 100.0)
            .await
            .trade()
            .unwrap()
            .clone();
        // 10 units closed 20 lower: -200, 2% of the day's 10000
        first.close_trade("alice", trade.id, 80.0).await.unwrap();

        let second = AutoTrader::new(store).with_clock(clock);
        assert_eq!(second.restore().await.unwrap(), 0);
        let today = second.get_user_stats("alice").await.today;
        assert!((today.total_pnl + 200.0).abs() < 1e-9);
        assert!((today.total_pnl_percent + 2.0).abs() < 1e-9);
        match second.process_signal("alice", "BTC", &buy(90.0), 100.0).await {
            ProcessOutcome::Skip { reason } => assert!(reason.contains("loss limit")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn settled_trades_leave_memory_once_stored() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        let trade = trader
            .process_signal("alice", "BTC", &buy(90.0), 100.0)
            .await
            .trade()
            .unwrap()
            .clone();
        assert_eq!(trader.tracked_trades().await, 1);

        trader.close_trade("alice", trade.id, 101.0).await.unwrap();
        assert_eq!(trader.tracked_trades().await, 0);
        assert!(trader.close_trade("alice", trade.id, 102.0).await.is_none());

        let closed = trader.get_user_trades("alice", Some(TradeStatus::Closed)).await;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, trade.id);
        assert_eq!(trader.get_user_stats("alice").await.closed_trades, 1);
    }

    #[tokio::test]
    async fn stop_loss_closes_and_credits_balance() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        let opened = trader.process_signal("alice", "BTC", &buy(90.0), 100.0).await;
        let trade = opened.trade().unwrap().clone();

        assert!(trader.check_stop_loss_take_profit("BTC", 99.0).await.is_empty());
        let closed = trader.check_stop_loss_take_profit("BTC", 97.0).await;
        assert_eq!(closed.len(), 1);
        let closed = &closed[0];
        assert_eq!(closed.status, TradeStatus::StoppedOut);
        assert_eq!(closed.close_reason, Some(CloseReason::StopLoss));
        let expected_pnl = (97.0 - 100.0) * trade.quantity;
        assert!((closed.pnl.unwrap() - expected_pnl).abs() < 1e-9);

        // repeated ticks are no-ops
        assert!(trader.check_stop_loss_take_profit("BTC", 90.0).await.is_empty());

        let stats = trader.get_user_stats("alice").await;
        assert!((stats.balance - (10_000.0 + expected_pnl)).abs() < 1e-6);
        assert_eq!(stats.losing_trades, 1);
        assert_eq!(stats.open_trades, 0);
    }

    #[tokio::test]
    async fn take_profit_on_short() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        let signal = TradeSignal::new(TradeAction::Sell, 90.0);
        let trade = trader
            .process_signal("alice", "ETH", &signal, 100.0)
            .await
            .trade()
            .unwrap()
            .clone();
        // 2% stop at 102, 2R target at 96
        assert!((trade.take_profit.unwrap() - 96.0).abs() < 1e-9);

        let closed = trader.check_stop_loss_take_profit("eth", 95.0).await;
        assert_eq!(closed[0].status, TradeStatus::TakeProfit);
        assert!(closed[0].pnl.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn trailing_stop_ratchets_then_exits() {
        let trader = trader_with_user(TradeConfigUpdate {
            trailing_stop_enabled: Some(true),
            trailing_stop_pct: Some(2.0),
            use_take_profit: Some(false),
            ..Default::default()
        })
        .await;
        trader.process_signal("alice", "BTC", &buy(90.0), 100.0).await;

        assert!(trader.check_stop_loss_take_profit("BTC", 120.0).await.is_empty());
        assert!(trader.check_stop_loss_take_profit("BTC", 119.0).await.is_empty());
        let open = trader
            .get_user_trades("alice", Some(TradeStatus::Open))
            .await;
        assert!((open[0].stop_loss - 117.6).abs() < 1e-9);

        let closed = trader.check_stop_loss_take_profit("BTC", 117.0).await;
        assert_eq!(closed.len(), 1);
        assert!(closed[0].pnl.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn manual_close_only_for_owner() {
        let trader = trader_with_user(TradeConfigUpdate::default()).await;
        let trade = trader
            .process_signal("alice", "BTC", &buy(90.0), 100.0)
            .await
            .trade()
            .unwrap()
            .clone();

        assert!(trader.close_trade("mallory", trade.id, 105.0).await.is_none());
        let closed = trader.close_trade("alice", trade.id, 105.0).await.unwrap();
        assert_eq!(closed.status, TradeStatus::Closed);
        assert_eq!(closed.close_reason, Some(CloseReason::Manual));
        assert!(trader.close_trade("alice", trade.id, 106.0).await.is_none());
    }

    #[tokio::test]
    async fn daily_loss_limit_blocks_new_trades() {
        let trader = trader_with_user(TradeConfigUpdate {
            max_daily_loss_pct: Some(1.0),
            max_position_size_pct: Some(25.0),
            risk_per_trade_pct: Some(2.0),
            ..Default::default()
        })
        .await;
        let signal = TradeSignal {
            stop_loss_percent: Some(10.0),
            ..buy(90.0)
        };
        trader.process_signal("alice", "BTC", &signal, 100.0).await;
        // 20 units at 100; a fall to 80 loses 400, 4% of the day's balance
        let closed = trader.check_stop_loss_take_profit("BTC", 80.0).await;
        assert_eq!(closed.len(), 1);

        let outcome = trader.process_signal("alice", "ETH", &buy(90.0), 10.0).await;
        match outcome {
            ProcessOutcome::Skip { reason } => assert!(reason.contains("loss limit")),
            other => panic!("expected skip, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn restore_reloads_open_trades() {
        let store = Arc::new(InMemoryTradeStore::new());
        let trader = AutoTrader::new(store.clone());
        trader
            .configure_user(
                "alice",
                &TradeConfigUpdate {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        trader.process_signal("alice", "BTC", &buy(90.0), 100.0).await;

        let restarted = AutoTrader::new(store);
        assert_eq!(restarted.restore().await.unwrap(), 1);
        assert!(restarted.get_config("alice").await.unwrap().enabled);
        assert!(restarted.process_signal("alice", "BTC", &buy(90.0), 100.0).await.is_skip());
        let closed = restarted.check_stop_loss_take_profit("BTC", 90.0).await;
        assert_eq!(closed.len(), 1);
    }
}

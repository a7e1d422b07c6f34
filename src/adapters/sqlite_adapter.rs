//! SQLite trade store.
//!
//! Configs and trades are stored as JSON documents next to the columns the
//! queries filter on. Every call runs on the blocking pool with its own
//! pooled connection.

use crate::domain::auto_trader::config::TradeConfig;
use crate::domain::auto_trader::trade::{AutoTrade, TradeStatus};
use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store::TradeStore;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};

pub struct SqliteTradeStore {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> EngineError {
    EngineError::Storage {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> EngineError {
    EngineError::StorageQuery {
        reason: e.to_string(),
    }
}

fn json_error(e: serde_json::Error) -> EngineError {
    EngineError::StorageQuery {
        reason: format!("corrupt record: {e}"),
    }
}

fn status_key(status: TradeStatus) -> Result<String, EngineError> {
    match serde_json::to_value(status).map_err(json_error)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(EngineError::StorageQuery {
            reason: format!("unexpected status encoding {other}"),
        }),
    }
}

fn decode_trades(rows: Vec<String>) -> Result<Vec<AutoTrade>, EngineError> {
    rows.iter()
        .map(|body| serde_json::from_str(body).map_err(json_error))
        .collect()
}

impl SqliteTradeStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EngineError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trade_configs (
                user_id TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS auto_trades (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                body TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_auto_trades_user ON auto_trades(user_id);
            CREATE INDEX IF NOT EXISTS idx_auto_trades_status ON auto_trades(status);
            CREATE TABLE IF NOT EXISTS balances (
                user_id TEXT PRIMARY KEY,
                balance REAL NOT NULL
            );",
        )
        .map_err(query_error)?;

        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, EngineError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(pool_error)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| EngineError::Storage {
            reason: format!("storage task failed: {e}"),
        })?
    }

    /// JSON bodies of the rows matching a single-parameter query.
    fn select_bodies(
        conn: &Connection,
        query: &str,
        param: &str,
    ) -> Result<Vec<String>, EngineError> {
        let mut stmt = conn.prepare(query).map_err(query_error)?;
        let rows = stmt
            .query_map(params![param], |row| row.get::<_, String>(0))
            .map_err(query_error)?;
        rows.collect::<rusqlite::Result<Vec<String>>>()
            .map_err(query_error)
    }
}

#[async_trait]
impl TradeStore for SqliteTradeStore {
    async fn save_config(&self, user_id: &str, config: &TradeConfig) -> Result<(), EngineError> {
        let user_id = user_id.to_string();
        let body = serde_json::to_string(config).map_err(json_error)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO trade_configs (user_id, body) VALUES (?1, ?2)",
                params![user_id, body],
            )
            .map_err(query_error)?;
            Ok(())
        })
        .await
    }

    async fn load_config(&self, user_id: &str) -> Result<Option<TradeConfig>, EngineError> {
        let user_id = user_id.to_string();
        let body: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT body FROM trade_configs WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(query_error)
            })
            .await?;

        body.map(|b| serde_json::from_str(&b).map_err(json_error))
            .transpose()
    }

    async fn list_configs(&self) -> Result<Vec<(String, TradeConfig)>, EngineError> {
        let rows: Vec<(String, String)> = self
            .with_conn(|conn| {
                let mut stmt = conn
                    .prepare("SELECT user_id, body FROM trade_configs ORDER BY user_id")
                    .map_err(query_error)?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                    .map_err(query_error)?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row.map_err(query_error)?);
                }
                Ok(out)
            })
            .await?;

        rows.into_iter()
            .map(|(user, body)| Ok((user, serde_json::from_str(&body).map_err(json_error)?)))
            .collect()
    }

    async fn save_trade(&self, trade: &AutoTrade) -> Result<(), EngineError> {
        let body = serde_json::to_string(trade).map_err(json_error)?;
        let status = status_key(trade.status)?;
        let id = trade.id.to_string();
        let user_id = trade.user_id.clone();
        let symbol = trade.symbol.clone();
        let created_at = trade.created_at.to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO auto_trades (id, user_id, symbol, status, created_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, user_id, symbol, status, created_at, body],
            )
            .map_err(query_error)?;
            Ok(())
        })
        .await
    }

    async fn list_open_trades(&self) -> Result<Vec<AutoTrade>, EngineError> {
        let open = status_key(TradeStatus::Open)?;
        let bodies = self
            .with_conn(move |conn| {
                Self::select_bodies(
                    conn,
                    "SELECT body FROM auto_trades WHERE status = ?1 ORDER BY created_at, id",
                    &open,
                )
            })
            .await?;
        decode_trades(bodies)
    }

    async fn list_user_trades(&self, user_id: &str) -> Result<Vec<AutoTrade>, EngineError> {
        let user_id = user_id.to_string();
        let bodies = self
            .with_conn(move |conn| {
                Self::select_bodies(
                    conn,
                    "SELECT body FROM auto_trades WHERE user_id = ?1 ORDER BY created_at, id",
                    &user_id,
                )
            })
            .await?;
        decode_trades(bodies)
    }

    async fn get_balance(&self, user_id: &str) -> Result<Option<f64>, EngineError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT balance FROM balances WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_error)
        })
        .await
    }

    async fn adjust_balance(
        &self,
        user_id: &str,
        initial: f64,
        delta: f64,
    ) -> Result<f64, EngineError> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(query_error)?;
            tx.execute(
                "INSERT OR IGNORE INTO balances (user_id, balance) VALUES (?1, ?2)",
                params![user_id, initial],
            )
            .map_err(query_error)?;
            tx.execute(
                "UPDATE balances SET balance = balance + ?2 WHERE user_id = ?1",
                params![user_id, delta],
            )
            .map_err(query_error)?;
            let balance: f64 = tx
                .query_row(
                    "SELECT balance FROM balances WHERE user_id = ?1",
                    params![user_id],
                    |row| row.get(0),
                )
                .map_err(query_error)?;
            tx.commit().map_err(query_error)?;
            Ok(balance)
        })
        .await
    }
}

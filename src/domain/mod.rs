//! Core domain types and logic.

pub mod ohlcv;
pub mod timeframe;
pub mod indicator;
pub mod signal;
pub mod confluence;
pub mod risk;
pub mod position;
pub mod strategy;
pub mod backtest;
pub mod metrics;
pub mod auto_trader;
pub mod cache;
pub mod config_validation;
pub mod error;

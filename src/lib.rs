//! confluence: market analysis and paper-trading engine.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and the [`engine::TradingEngine`]
//! facade tying them together.

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod engine;
pub mod cli;

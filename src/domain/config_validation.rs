//! Configuration validation.
//!
//! Checks every INI field the engine reads before anything is built, so a
//! bad file fails fast with the offending section and key.

use crate::domain::error::EngineError;
use crate::domain::timeframe::{Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_timeframes(config)?;
    validate_default_timeframe(config)?;
    validate_fetch_timeout(config)?;
    validate_cache_ttl(config)?;
    validate_default_balance(config)?;
    Ok(())
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_initial_capital(config)?;
    validate_risk_per_trade(config)?;
    validate_atr(config)?;
    validate_commission(config)?;
    Ok(())
}

/// Every section, engine first.
pub fn validate_all(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_engine_config(config)?;
    validate_backtest_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let Some(raw) = config.get_string("engine", "timeframes") else {
        return Ok(());
    };
    let parsed =
        parse_timeframes(&raw).map_err(|e| invalid("engine", "timeframes", e.to_string()))?;
    if parsed.is_empty() {
        return Err(invalid(
            "engine",
            "timeframes",
            "at least one timeframe is required",
        ));
    }
    Ok(())
}

fn validate_default_timeframe(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if let Some(raw) = config.get_string("engine", "default_timeframe") {
        raw.parse::<Timeframe>()
            .map_err(|e| invalid("engine", "default_timeframe", e.to_string()))?;
    }
    Ok(())
}

fn validate_fetch_timeout(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("engine", "fetch_timeout_secs", 10.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "engine",
            "fetch_timeout_secs",
            "fetch_timeout_secs must be positive",
        ));
    }
    Ok(())
}

fn validate_cache_ttl(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_int("engine", "cache_ttl_secs", 0);
    if value < 0 {
        return Err(invalid(
            "engine",
            "cache_ttl_secs",
            "cache_ttl_secs must be non-negative",
        ));
    }
    Ok(())
}

fn validate_default_balance(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("auto_trade", "default_balance", 10_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "auto_trade",
            "default_balance",
            "default_balance must be positive",
        ));
    }
    Ok(())
}

fn validate_data_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    match config.get_string("data", "csv_dir") {
        Some(dir) if dir.trim().is_empty() => {
            Err(invalid("data", "csv_dir", "csv_dir must not be empty"))
        }
        _ => Ok(()),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("backtest", "initial_capital", 10_000.0);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_risk_per_trade(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("backtest", "risk_per_trade_pct", 2.0);
    if !(value > 0.0 && value <= 100.0) {
        return Err(invalid(
            "backtest",
            "risk_per_trade_pct",
            "risk_per_trade_pct must be in (0, 100]",
        ));
    }
    Ok(())
}

fn validate_atr(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let period = config.get_int("backtest", "atr_period", 14);
    if period < 1 {
        return Err(invalid(
            "backtest",
            "atr_period",
            "atr_period must be at least 1",
        ));
    }
    let multiplier = config.get_double("backtest", "atr_multiplier", 2.0);
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(invalid(
            "backtest",
            "atr_multiplier",
            "atr_multiplier must be positive",
        ));
    }
    Ok(())
}

fn validate_commission(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let pct = config.get_double("backtest", "commission_pct", 0.1);
    if !pct.is_finite() || !(0.0..100.0).contains(&pct) {
        return Err(invalid(
            "backtest",
            "commission_pct",
            "commission_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

//! Position sizing and stop/target calculators.
//!
//! Shared by the backtester and the auto trader. Degenerate inputs (zero price
//! risk, non-positive capital) come back as [`RiskError`] values instead of
//! NaN or infinity.

use serde::{Deserialize, Serialize};

/// Reward multiples of the initial risk used for the two ATR targets.
pub const TARGET_1_R: f64 = 1.5;
pub const TARGET_2_R: f64 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "long",
            Side::Short => "short",
        }
    }

    /// Signed P&L of `quantity` units moved from `entry` to `exit`.
    pub fn pnl(self, entry: f64, exit: f64, quantity: f64) -> f64 {
        match self {
            Side::Long => (exit - entry) * quantity,
            Side::Short => (entry - exit) * quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("entry and stop are equal ({price}); price risk is zero")]
    ZeroPriceRisk { price: f64 },

    #[error("invalid sizing input: {reason}")]
    InvalidInput { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub risk_amount: f64,
    pub price_risk: f64,
    pub quantity: f64,
    pub position_value: f64,
    /// True when the max position value cut the risk-based quantity.
    pub capped: bool,
}

/// `risk_pct` is a percentage (2.0 means 2%).
pub fn calculate_position_size(
    capital: f64,
    risk_pct: f64,
    entry: f64,
    stop: f64,
    max_position_value: Option<f64>,
) -> Result<PositionSize, RiskError> {
    if !capital.is_finite() || capital <= 0.0 {
        return Err(RiskError::InvalidInput {
            reason: format!("capital must be positive, got {capital}"),
        });
    }
    if !risk_pct.is_finite() || risk_pct <= 0.0 {
        return Err(RiskError::InvalidInput {
            reason: format!("risk percent must be positive, got {risk_pct}"),
        });
    }
    if !entry.is_finite() || entry <= 0.0 || !stop.is_finite() {
        return Err(RiskError::InvalidInput {
            reason: format!("entry {entry} / stop {stop} must be finite and entry positive"),
        });
    }

    let price_risk = (entry - stop).abs();
    if price_risk == 0.0 {
        return Err(RiskError::ZeroPriceRisk { price: entry });
    }

    let risk_amount = capital * risk_pct / 100.0;
    let mut quantity = risk_amount / price_risk;
    let mut capped = false;

    if let Some(max_value) = max_position_value {
        if max_value <= 0.0 {
            return Err(RiskError::InvalidInput {
                reason: format!("max position value must be positive, got {max_value}"),
            });
        }
        let max_quantity = max_value / entry;
        if max_quantity < quantity {
            quantity = max_quantity;
            capped = true;
        }
    }

    Ok(PositionSize {
        risk_amount,
        price_risk,
        quantity,
        position_value: quantity * entry,
        capped,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopTargets {
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_per_unit: f64,
}

/// stop = entry ∓ atr × multiplier, targets at 1.5R and 2.5R.
pub fn atr_stop_targets(entry: f64, atr: f64, multiplier: f64, side: Side) -> StopTargets {
    let risk = atr.abs() * multiplier.abs();
    match side {
        Side::Long => StopTargets {
            stop_loss: entry - risk,
            take_profit_1: entry + risk * TARGET_1_R,
            take_profit_2: entry + risk * TARGET_2_R,
            risk_per_unit: risk,
        },
        Side::Short => StopTargets {
            stop_loss: entry + risk,
            take_profit_1: entry - risk * TARGET_1_R,
            take_profit_2: entry - risk * TARGET_2_R,
            risk_per_unit: risk,
        },
    }
}

/// Stop placed `pct` percent away from entry against the position.
pub fn percent_stop(entry: f64, pct: f64, side: Side) -> f64 {
    match side {
        Side::Long => entry * (1.0 - pct / 100.0),
        Side::Short => entry * (1.0 + pct / 100.0),
    }
}

/// Target placed `multiple` risk units in favour of the position.
pub fn r_multiple_target(entry: f64, stop: f64, multiple: f64, side: Side) -> f64 {
    let risk = (entry - stop).abs();
    match side {
        Side::Long => entry + risk * multiple,
        Side::Short => entry - risk * multiple,
    }
}

/// Reward-to-risk ratio, 0.0 when the risk is zero.
pub fn risk_reward_ratio(entry: f64, stop: f64, target: f64) -> f64 {
    let risk = (entry - stop).abs();
    if risk == 0.0 {
        return 0.0;
    }
    (target - entry).abs() / risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn position_size_reference_case() {
        let size = calculate_position_size(1000.0, 2.0, 100.0, 95.0, None).unwrap();
        assert_relative_eq!(size.risk_amount, 20.0);
        assert_relative_eq!(size.price_risk, 5.0);
        assert_relative_eq!(size.quantity, 4.0);
        assert_relative_eq!(size.position_value, 400.0);
        assert!(!size.capped);
    }

    #[test]
    fn position_size_zero_price_risk_is_error() {
        let err = calculate_position_size(1000.0, 2.0, 100.0, 100.0, None).unwrap_err();
        assert_eq!(err, RiskError::ZeroPriceRisk { price: 100.0 });
    }

    #[test]
    fn position_size_short_uses_absolute_risk() {
        let size = calculate_position_size(1000.0, 2.0, 100.0, 105.0, None).unwrap();
        assert_relative_eq!(size.quantity, 4.0);
    }

    #[test]
    fn position_size_capped_by_max_value() {
        // 10000 capital, 1% risk, entry 50000, stop 49000 → qty 0.1, value 5000
        let uncapped = calculate_position_size(10_000.0, 1.0, 50_000.0, 49_000.0, None).unwrap();
        assert_relative_eq!(uncapped.quantity, 0.1);
        assert_relative_eq!(uncapped.position_value, 5000.0);

        let capped =
            calculate_position_size(10_000.0, 1.0, 50_000.0, 49_000.0, Some(1000.0)).unwrap();
        assert!(capped.capped);
        assert_relative_eq!(capped.quantity, 0.02);
        assert_relative_eq!(capped.position_value, 1000.0);
        assert_relative_eq!(capped.risk_amount, 100.0);
    }

    #[test]
    fn position_size_cap_above_quantity_is_ignored() {
        let size = calculate_position_size(1000.0, 2.0, 100.0, 95.0, Some(10_000.0)).unwrap();
        assert!(!size.capped);
        assert_relative_eq!(size.quantity, 4.0);
    }

    #[test]
    fn position_size_rejects_bad_inputs() {
        assert!(matches!(
            calculate_position_size(0.0, 2.0, 100.0, 95.0, None),
            Err(RiskError::InvalidInput { .. })
        ));
        assert!(matches!(
            calculate_position_size(1000.0, f64::NAN, 100.0, 95.0, None),
            Err(RiskError::InvalidInput { .. })
        ));
        assert!(matches!(
            calculate_position_size(1000.0, 2.0, 100.0, 95.0, Some(0.0)),
            Err(RiskError::InvalidInput { .. })
        ));
    }

    #[test]
    fn atr_targets_long() {
        let st = atr_stop_targets(100.0, 2.0, 2.0, Side::Long);
        assert_relative_eq!(st.stop_loss, 96.0);
        assert_relative_eq!(st.take_profit_1, 106.0);
        assert_relative_eq!(st.take_profit_2, 110.0);
        assert_relative_eq!(st.risk_per_unit, 4.0);
    }

    #[test]
    fn atr_targets_short() {
        let st = atr_stop_targets(100.0, 2.0, 2.0, Side::Short);
        assert_relative_eq!(st.stop_loss, 104.0);
        assert_relative_eq!(st.take_profit_1, 94.0);
        assert_relative_eq!(st.take_profit_2, 90.0);
    }

    #[test]
    fn percent_stop_both_sides() {
        assert_relative_eq!(percent_stop(50_000.0, 2.0, Side::Long), 49_000.0);
        assert_relative_eq!(percent_stop(50_000.0, 2.0, Side::Short), 51_000.0);
    }

    #[test]
    fn r_multiple_and_ratio() {
        let target = r_multiple_target(100.0, 95.0, 2.0, Side::Long);
        assert_relative_eq!(target, 110.0);
        assert_relative_eq!(risk_reward_ratio(100.0, 95.0, target), 2.0);
        assert_eq!(risk_reward_ratio(100.0, 100.0, 110.0), 0.0);
        assert_relative_eq!(r_multiple_target(100.0, 105.0, 2.0, Side::Short), 90.0);
    }

    #[test]
    fn side_pnl() {
        assert_relative_eq!(Side::Long.pnl(100.0, 110.0, 2.0), 20.0);
        assert_relative_eq!(Side::Short.pnl(100.0, 110.0, 2.0), -20.0);
    }
}

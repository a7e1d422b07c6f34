//! Property tests for indicator ranges, position sizing and backtest
//! invariants.

use chrono::{Duration, TimeZone, Utc};
use confluence::domain::backtest::{BacktestConfig, BacktestOutcome, REPORTED_TRADES, run_backtest};
use confluence::domain::indicator::{bollinger, rsi, stochastic};
use confluence::domain::metrics::MAX_EQUITY_POINTS;
use confluence::domain::ohlcv::OhlcvBar;
use confluence::domain::risk::{Side, calculate_position_size};
use confluence::domain::strategy::StrategyKind;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    (
        20.0..500.0_f64,
        prop::collection::vec(-0.015..0.015_f64, min..max),
    )
        .prop_map(|(start, moves)| {
            let mut price = start;
            moves
                .into_iter()
                .map(|m| {
                    price *= 1.0 + m;
                    price
                })
                .collect()
        })
}

fn to_bars(closes: &[f64]) -> Vec<OhlcvBar> {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            timestamp: start + Duration::hours(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1_000.0,
        })
        .collect()
}

fn arb_strategy() -> impl Strategy<Value = StrategyKind> {
    prop::sample::select(StrategyKind::ALL.to_vec())
}

// ── Indicator ranges ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_stays_in_range(closes in arb_closes(0, 120), period in 2usize..30) {
        let value = rsi(&closes, period);
        prop_assert!((0.0..=100.0).contains(&value), "rsi {value}");
    }

    #[test]
    fn bollinger_position_stays_in_range(closes in arb_closes(1, 120), period in 2usize..30) {
        let bands = bollinger(&closes, period, 2.0);
        prop_assert!((0.0..=100.0).contains(&bands.position));
        prop_assert!(bands.lower <= bands.middle && bands.middle <= bands.upper);
    }

    #[test]
    fn stochastic_stays_in_range(closes in arb_closes(1, 120), period in 2usize..30) {
        let highs: Vec<f64> = closes.iter().map(|c| c * 1.01).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c * 0.99).collect();
        let value = stochastic(&highs, &lows, &closes, period);
        prop_assert!((0.0..=100.0).contains(&value.k));
        prop_assert_eq!(value.k, value.d);
    }
}

// ── Position sizing ──────────────────────────────────────────────────

proptest! {
    /// Risked amount never exceeds the budget and the cap is respected.
    #[test]
    fn sizing_respects_budget_and_cap(
        capital in 100.0..1_000_000.0_f64,
        risk_pct in 0.1..10.0_f64,
        entry in 1.0..10_000.0_f64,
        stop_frac in 0.5..0.999_f64,
        cap_pct in 1.0..100.0_f64,
    ) {
        let stop = entry * stop_frac;
        let cap = capital * cap_pct / 100.0;
        let size = calculate_position_size(capital, risk_pct, entry, stop, Some(cap)).unwrap();

        let budget = capital * risk_pct / 100.0;
        prop_assert!(size.quantity > 0.0);
        prop_assert!(size.quantity * size.price_risk <= budget * (1.0 + 1e-9));
        prop_assert!(size.position_value <= cap * (1.0 + 1e-9));
    }
}

// ── Backtest invariants ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn backtest_invariants(
        closes in arb_closes(60, 260),
        kind in arb_strategy(),
        allow_short in any::<bool>(),
    ) {
        let bars = to_bars(&closes);
        let strategy = kind.build();
        let config = BacktestConfig { allow_short, ..BacktestConfig::default() };

        let outcome = run_backtest(&bars, strategy.as_ref(), &config);
        let BacktestOutcome::Completed(result) = &outcome else {
            // too short for this strategy's warmup
            return Ok(());
        };

        prop_assert_eq!(result.bars, bars.len());
        prop_assert!(result.equity_curve.len() <= MAX_EQUITY_POINTS);
        prop_assert!(result.trades.len() <= REPORTED_TRADES);
        prop_assert_eq!(result.total_trades, result.all_trades.len());
        prop_assert!(result.winning_trades + result.losing_trades <= result.total_trades);
        prop_assert!((0.0..=100.0).contains(&result.win_rate));
        prop_assert!(result.max_drawdown_pct >= 0.0);
        prop_assert!(result.final_capital.is_finite());

        for trade in &result.all_trades {
            prop_assert!(trade.entry_index < trade.exit_index);
            prop_assert!(trade.entry_date < trade.exit_date);
            prop_assert!(trade.exit_index < bars.len());
            prop_assert!(trade.quantity > 0.0);
        }
        if !allow_short {
            prop_assert!(result.all_trades.iter().all(|t| t.side == Side::Long));
        }

        let again = run_backtest(&bars, strategy.as_ref(), &config);
        let again = again.result().unwrap();
        prop_assert_eq!(result.total_trades, again.total_trades);
        prop_assert_eq!(result.final_capital, again.final_capital);
    }
}

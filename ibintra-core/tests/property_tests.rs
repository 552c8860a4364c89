//! Property tests for row normalization and window planning.
//!
//! Uses proptest to verify:
//! 1. Volume clamp: output equals max(0, v) and clamping is idempotent
//! 2. Timestamp split: date loses its dashes, time is kept verbatim
//! 3. Transform: row count, column layout and per-row values survive
//! 4. Recent plan: exactly one window for every valid day count

use ibintra_core::transform::OUTPUT_COLUMNS;
use ibintra_core::{
    clamp_volume, plan_recent, split_timestamp, transform, InstrumentClass, PlanError, SymbolInfo,
};
use polars::prelude::*;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_stamp() -> impl Strategy<Value = (u32, u32, u32, u32, u32, u32)> {
    (2000u32..2030, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60)
}

fn arb_volume() -> impl Strategy<Value = f64> {
    prop_oneof![(-1.0e6..1.0e6_f64), Just(0.0), Just(-0.0)]
}

// ── 1. Volume clamp ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn clamp_is_max_with_zero(v in arb_volume()) {
        let clamped = clamp_volume(v);
        prop_assert!(clamped >= 0.0);
        prop_assert_eq!(clamped, v.max(0.0));
    }

    #[test]
    fn clamp_is_idempotent(v in arb_volume()) {
        prop_assert_eq!(clamp_volume(clamp_volume(v)), clamp_volume(v));
    }
}

// ── 2. Timestamp split ───────────────────────────────────────────────

proptest! {
    #[test]
    fn split_compacts_date_and_keeps_time((y, mo, d, h, mi, s) in arb_stamp()) {
        let stamp = format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}");
        let (date, time) = split_timestamp(&stamp);

        prop_assert_eq!(date, format!("{y:04}{mo:02}{d:02}"));
        prop_assert_eq!(time, Some(format!("{h:02}:{mi:02}:{s:02}")));
    }

    #[test]
    fn split_without_time_gives_none((y, mo, d, _, _, _) in arb_stamp()) {
        let (date, time) = split_timestamp(&format!("{y:04}-{mo:02}-{d:02}"));
        prop_assert_eq!(date.len(), 8);
        prop_assert!(time.is_none());
    }
}

// ── 3. Transform ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn transform_keeps_rows_and_layout(
        rows in prop::collection::vec((arb_stamp(), 1.0..100.0_f64, arb_volume()), 0..20),
    ) {
        let dates: Vec<String> = rows
            .iter()
            .map(|((y, mo, d, h, mi, s), _, _)| {
                format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}")
            })
            .collect();
        let prices: Vec<f64> = rows.iter().map(|(_, p, _)| *p).collect();
        let volumes: Vec<f64> = rows.iter().map(|(_, _, v)| *v).collect();

        let raw = df! {
            "date" => dates.clone(),
            "open" => prices.clone(),
            "high" => prices.clone(),
            "low" => prices.clone(),
            "close" => prices.clone(),
            "volume" => volumes.clone(),
        }
        .unwrap();

        let out = transform(&raw, "Euro_FX", "EURUSD").unwrap();

        prop_assert_eq!(out.height(), rows.len());
        let names: Vec<String> = out
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        prop_assert_eq!(names, OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());

        let series = |name: &str| out.column(name).unwrap().as_materialized_series().clone();
        let out_dates = series("date");
        let out_dates = out_dates.str().unwrap();
        let out_volume = series("volume");
        let out_volume = out_volume.f64().unwrap();
        let out_close = series("close");
        let out_close = out_close.f64().unwrap();
        for i in 0..rows.len() {
            let (expected_date, _) = split_timestamp(&dates[i]);
            prop_assert_eq!(out_dates.get(i), Some(expected_date.as_str()));
            prop_assert_eq!(out_volume.get(i), Some(clamp_volume(volumes[i])));
            prop_assert_eq!(out_close.get(i), Some(prices[i]));
        }
    }
}

// ── 4. Recent plan ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn recent_plan_is_one_window(days in 0i64..=360) {
        let plan = plan_recent(&SymbolInfo::forex("EURUSD"), InstrumentClass::Forex, days).unwrap();
        prop_assert_eq!(plan.len(), 1);
        prop_assert!(plan[0].end_timestamp().is_none());
        prop_assert_eq!(plan[0].duration(), format!("{days} D"));
    }

    #[test]
    fn recent_plan_rejects_out_of_range(days in prop_oneof![-1000i64..0, 361i64..10_000]) {
        let info = SymbolInfo::forex("EURUSD");
        let err = plan_recent(&info, InstrumentClass::Forex, days).unwrap_err();
        prop_assert!(matches!(err, PlanError::DayCountOutOfRange(d) if d == days));
    }
}

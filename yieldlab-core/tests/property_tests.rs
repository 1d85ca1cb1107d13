//! Property tests for the incremental update invariants.
//!
//! Uses proptest to verify:
//! 1. Merge idempotence: merging a series with itself changes nothing
//! 2. Newest wins: overlapping present values come from the incoming table
//! 3. Normalizer idempotence: normalizing twice equals normalizing once
//! 4. Fill bound: a gap is filled only when it fits inside the horizon
//! 5. Planner monotonicity: the window always starts after the last date

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use yieldlab_core::data::{merge, normalize, plan, Calendar, FillPolicy};
use yieldlab_core::domain::{DatasetDescriptor, Lookback, ObservationRow, Series};

// ── Strategies (proptest) ────────────────────────────────────────────

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn arb_yield() -> impl Strategy<Value = Option<f64>> {
    prop::option::weighted(0.8, (0.0..8.0_f64).prop_map(|y| (y * 1000.0).round() / 1000.0))
}

/// A sparse two-column series: each day is either absent or carries
/// (possibly missing) values.
fn arb_series() -> impl Strategy<Value = Series> {
    prop::collection::vec((any::<bool>(), arb_yield(), arb_yield()), 1..60).prop_map(|days| {
        let rows = days
            .into_iter()
            .enumerate()
            .filter(|(_, (present, _, _))| *present)
            .map(|(i, (_, us, kr))| {
                ObservationRow::new(base_date() + Days::new(i as u64))
                    .with("US_10Y", us)
                    .with("KR_10Y", kr)
            });
        Series::from_rows(rows).unwrap()
    })
}

fn arb_calendar() -> impl Strategy<Value = Calendar> {
    prop_oneof![Just(Calendar::Daily), Just(Calendar::BusinessDays)]
}

// ── 1. Merge idempotence ─────────────────────────────────────────────

proptest! {
    #[test]
    fn merge_with_self_is_identity(series in arb_series(), horizon in 0u32..10) {
        let normalized = normalize(&series, &Calendar::Daily, FillPolicy::new(horizon));
        prop_assert_eq!(merge(Some(&normalized), &normalized), normalized);
    }
}

// ── 2. Newest wins ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn overlapping_present_values_come_from_incoming(
        existing in arb_series(),
        incoming in arb_series(),
    ) {
        let merged = merge(Some(&existing), &incoming);

        let mut dates: Vec<NaiveDate> = existing.dates().chain(incoming.dates()).collect();
        dates.sort();
        dates.dedup();
        prop_assert_eq!(merged.dates().collect::<Vec<_>>(), dates);

        for (date, _) in incoming.iter() {
            for column in ["US_10Y", "KR_10Y"] {
                let expected = incoming.get(date, column).or(existing.get(date, column));
                prop_assert_eq!(merged.get(date, column), expected);
            }
        }
    }
}

// ── 3. Normalizer idempotence ────────────────────────────────────────

proptest! {
    #[test]
    fn normalize_is_idempotent(
        series in arb_series(),
        calendar in arb_calendar(),
        horizon in 0u32..10,
    ) {
        let policy = FillPolicy::new(horizon);
        let once = normalize(&series, &calendar, policy);
        let twice = normalize(&once, &calendar, policy);
        prop_assert_eq!(once, twice);
    }
}

// ── 4. Fill bound ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn gap_is_filled_only_within_horizon(gap in 1u64..20, horizon in 0u32..15) {
        let first = base_date();
        let last = first + Days::new(gap + 1);
        let series = Series::from_rows(vec![
            ObservationRow::new(first).with("US_10Y", Some(3.0)),
            ObservationRow::new(last).with("US_10Y", Some(3.5)),
        ])
        .unwrap();

        let out = normalize(&series, &Calendar::Daily, FillPolicy::new(horizon));
        prop_assert_eq!(out.len() as u64, gap + 2);

        let expected = (gap <= u64::from(horizon)).then_some(3.0);
        for i in 1..=gap {
            prop_assert_eq!(out.get(first + Days::new(i), "US_10Y"), expected);
        }
        prop_assert_eq!(out.get(last, "US_10Y"), Some(3.5));
    }
}

// ── 5. Planner monotonicity ──────────────────────────────────────────

proptest! {
    #[test]
    fn planned_window_starts_after_last_date(
        series in arb_series(),
        offset in -10i64..40,
        lookback in 0u32..2000,
    ) {
        prop_assume!(!series.is_empty());
        let descriptor = DatasetDescriptor::new("d", "d.csv", Lookback::Days(lookback));
        let last = series.last_date().unwrap();
        let today = if offset >= 0 {
            last + Days::new(offset as u64)
        } else {
            last - Days::new(offset.unsigned_abs())
        };

        match plan(Some(&series), today, &descriptor) {
            Some(window) => {
                prop_assert!(last < today);
                prop_assert_eq!(window.start(), last + Days::new(1));
                prop_assert_eq!(window.end(), today);
            }
            None => prop_assert!(last >= today),
        }

        let first_run = plan(None, today, &descriptor).unwrap();
        prop_assert_eq!(first_run.days(), i64::from(lookback) + 1);
    }
}

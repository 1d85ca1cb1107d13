//! Incremental fetch planning.

use crate::domain::{DatasetDescriptor, FetchWindow, Series};
use chrono::NaiveDate;

/// Decide which window to fetch for a dataset.
///
/// - nothing persisted: `[today - default_window, today]`
/// - last persisted date `L < today`: `[L + 1, today]`
/// - `L >= today`: `None`, the dataset is up to date
pub fn plan(
    existing: Option<&Series>,
    today: NaiveDate,
    descriptor: &DatasetDescriptor,
) -> Option<FetchWindow> {
    match existing.and_then(Series::last_date) {
        None => FetchWindow::new(descriptor.default_window.start_from(today), today),
        Some(last) if last >= today => None,
        Some(last) => FetchWindow::new(last.succ_opt()?, today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lookback, ObservationRow};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn descriptor(window: Lookback) -> DatasetDescriptor {
        DatasetDescriptor::new("global_treasury", "global_treasury.csv", window)
    }

    fn ending_on(date: &str) -> Series {
        Series::from_rows(vec![
            ObservationRow::new(d("2024-01-02")).with("US_10Y", Some(3.9)),
            ObservationRow::new(d(date)).with("US_10Y", Some(4.0)),
        ])
        .unwrap()
    }

    #[test]
    fn first_run_uses_default_window() {
        let window = plan(None, d("2024-06-01"), &descriptor(Lookback::Days(365))).unwrap();
        assert_eq!(window.start(), d("2023-06-02"));
        assert_eq!(window.end(), d("2024-06-01"));
    }

    #[test]
    fn empty_existing_counts_as_first_run() {
        let empty = Series::default();
        let window = plan(Some(&empty), d("2024-06-01"), &descriptor(Lookback::Years(5))).unwrap();
        assert_eq!(window.start(), d("2019-06-01"));
    }

    #[test]
    fn resumes_day_after_last_date() {
        let existing = ending_on("2024-01-10");
        let window = plan(Some(&existing), d("2024-01-15"), &descriptor(Lookback::Days(365))).unwrap();
        assert_eq!(window.start(), d("2024-01-11"));
        assert_eq!(window.end(), d("2024-01-15"));
    }

    #[test]
    fn up_to_date_skips_fetch() {
        let existing = ending_on("2024-01-15");
        assert!(plan(Some(&existing), d("2024-01-15"), &descriptor(Lookback::Days(365))).is_none());
    }

    #[test]
    fn future_last_date_never_inverts_window() {
        let existing = ending_on("2024-01-20");
        assert!(plan(Some(&existing), d("2024-01-15"), &descriptor(Lookback::Days(365))).is_none());
    }

    #[test]
    fn zero_length_default_window_fetches_today_only() {
        let window = plan(None, d("2024-06-01"), &descriptor(Lookback::Days(0))).unwrap();
        assert_eq!(window.days(), 1);
    }
}

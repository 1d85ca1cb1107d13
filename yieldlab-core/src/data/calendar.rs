//! Calendar normalization.
//!
//! Reindexes a series onto a canonical calendar spanning its first to last
//! date and forward-fills short gaps. A gap is a run of consecutive missing
//! slots between two observed values of the same column; it is filled only
//! when its length is within the horizon, otherwise the whole run stays
//! missing. Values are never extrapolated before a column's first
//! observation or after its last.

use crate::domain::{CalendarKind, Series};
use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// Target calendar for reindexing.
#[derive(Debug, Clone, PartialEq)]
pub enum Calendar {
    Daily,
    BusinessDays,
    Observed(BTreeSet<NaiveDate>),
}

impl Calendar {
    /// Build the calendar for a dataset. `observed` is only used by
    /// `CalendarKind::Observed`.
    pub fn for_kind(kind: CalendarKind, observed: impl IntoIterator<Item = NaiveDate>) -> Self {
        match kind {
            CalendarKind::Daily => Calendar::Daily,
            CalendarKind::BusinessDays => Calendar::BusinessDays,
            CalendarKind::Observed => Calendar::Observed(observed.into_iter().collect()),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Calendar::Daily => true,
            Calendar::BusinessDays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            Calendar::Observed(dates) => dates.contains(&date),
        }
    }

    /// Calendar dates in `[start, end]`, ascending.
    pub fn dates_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        if start > end {
            return Vec::new();
        }
        match self {
            Calendar::Observed(dates) => dates.range(start..=end).copied().collect(),
            _ => start
                .iter_days()
                .take_while(|d| *d <= end)
                .filter(|d| self.contains(*d))
                .collect(),
        }
    }
}

/// Forward-fill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillPolicy {
    /// Longest run of missing slots that is filled.
    pub horizon: u32,
}

impl FillPolicy {
    pub fn new(horizon: u32) -> Self {
        Self { horizon }
    }
}

/// Reindex `series` onto `calendar` and forward-fill gaps within the horizon.
///
/// Rows whose dates are not on the calendar are dropped. Normalizing an
/// already-normalized series returns it unchanged.
pub fn normalize(series: &Series, calendar: &Calendar, policy: FillPolicy) -> Series {
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return series.clone();
    };

    let index = calendar.dates_between(first, last);
    let width = series.columns().len();

    // Column-major view on the target index.
    let mut grid: Vec<Vec<Option<f64>>> = (0..width)
        .map(|col| {
            index
                .iter()
                .map(|date| series.row(*date).and_then(|cells| cells[col]))
                .collect()
        })
        .collect();

    for column in &mut grid {
        fill_bounded(column, policy.horizon as usize);
    }

    let mut out = series.empty_like();
    for (i, date) in index.iter().enumerate() {
        let cells = out.row_mut(*date);
        for (col, values) in grid.iter().enumerate() {
            cells[col] = values[i];
        }
    }
    out
}

/// Fill interior runs of `None` no longer than `horizon` with the preceding value.
fn fill_bounded(values: &mut [Option<f64>], horizon: usize) {
    let mut last_seen: Option<(usize, f64)> = None;
    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };
        if let Some((prev_idx, prev_value)) = last_seen {
            let gap = i - prev_idx - 1;
            if gap > 0 && gap <= horizon {
                for slot in &mut values[prev_idx + 1..i] {
                    *slot = Some(prev_value);
                }
            }
        }
        last_seen = Some((i, current));
    }
}

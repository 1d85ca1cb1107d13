//! Series merging: existing persisted history + a freshly fetched window.
//!
//! Rows are deduplicated by date. For a date present in both tables, a
//! present incoming cell replaces the existing one (sources revise recent
//! days after first publication); a missing incoming cell never erases a
//! present existing cell. Columns are unioned: existing columns keep their
//! order, new incoming columns are appended.

use crate::domain::Series;
use chrono::{Days, NaiveDate};

/// Merge tuning knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Revisions to values dated more than this many days before the last
    /// existing date are ignored. `None` accepts every revision.
    pub revision_window_days: Option<u32>,
}

/// Merge with default options (always prefer the latest fetch).
pub fn merge(existing: Option<&Series>, incoming: &Series) -> Series {
    merge_with(existing, incoming, MergeOptions::default())
}

/// Merge `incoming` into `existing`.
///
/// An empty incoming table returns `existing` unchanged (or an empty series
/// when nothing exists), so a failed or empty fetch never shortens history.
pub fn merge_with(existing: Option<&Series>, incoming: &Series, opts: MergeOptions) -> Series {
    let Some(existing) = existing.filter(|s| !s.columns().is_empty() || !s.is_empty()) else {
        return incoming.clone();
    };
    if incoming.is_empty() {
        return existing.clone();
    }

    let revision_cutoff = revision_cutoff(existing, opts);
    let mut merged = existing.clone();

    // Map incoming column positions onto merged positions, adding new columns.
    let mapping: Vec<usize> = incoming
        .columns()
        .iter()
        .map(|name| merged.union_column(name))
        .collect();

    for (date, cells) in incoming.iter() {
        let protected = revision_cutoff.is_some_and(|cutoff| date < cutoff);
        let target = merged.row_mut(date);
        for (src, value) in cells.iter().enumerate() {
            let Some(value) = value else {
                continue;
            };
            let slot = &mut target[mapping[src]];
            if protected && slot.is_some() {
                continue;
            }
            *slot = Some(*value);
        }
    }

    merged
}

fn revision_cutoff(existing: &Series, opts: MergeOptions) -> Option<NaiveDate> {
    let days = opts.revision_window_days?;
    let last = existing.last_date()?;
    Some(last.checked_sub_days(Days::new(u64::from(days))).unwrap_or(NaiveDate::MIN))
}

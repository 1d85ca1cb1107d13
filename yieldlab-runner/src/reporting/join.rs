//! Outer join of datasets and point lookups.

use chrono::NaiveDate;
use yieldlab_core::data::{normalize, Calendar, DataError, FillPolicy, SeriesStore};
use yieldlab_core::domain::{DatasetDescriptor, Series};

/// Value of `column` in the latest row dated on or before `date`.
///
/// The lookup is row-based: if that row has no value for the column the
/// result is `None`, even when an older row does.
pub fn value_at_or_before(series: &Series, column: &str, date: NaiveDate) -> Option<f64> {
    let idx = series.column_index(column)?;
    let (_, cells) = series.row_at_or_before(date)?;
    cells[idx]
}

/// Outer join on date. Column sets must be disjoint.
pub fn join_series(tables: &[&Series]) -> Result<Series, DataError> {
    let columns: Vec<String> = tables
        .iter()
        .flat_map(|t| t.columns().iter().cloned())
        .collect();
    // Series::new rejects a column that appears in two tables.
    let mut joined = Series::new(columns)?;

    for table in tables {
        for (date, cells) in table.iter() {
            for (column, value) in table.columns().iter().zip(cells) {
                joined.set(date, column, *value)?;
            }
        }
    }
    Ok(joined)
}

/// Load every persisted dataset in `descriptors`, join them and fill the
/// boundaries onto a daily calendar.
///
/// A dataset that ends earlier than the others (a holiday in its market) has
/// its last value carried for up to `fill_horizon` days, so it still shows on
/// the joined last date. This fill applies to the report view only.
///
/// Datasets that have not been collected yet are skipped.
pub fn load_joined(
    store: &SeriesStore,
    descriptors: &[DatasetDescriptor],
    fill_horizon: u32,
) -> Result<Series, DataError> {
    let mut loaded = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        match store.load(descriptor)? {
            Some(series) => loaded.push(series),
            None => tracing::warn!(dataset = %descriptor.name, "no persisted data, skipped in report"),
        }
    }

    let refs: Vec<&Series> = loaded.iter().collect();
    let joined = join_series(&refs)?;
    let mut daily = normalize(&joined, &Calendar::Daily, FillPolicy::new(fill_horizon));
    fill_trailing_edges(&mut daily, fill_horizon)?;
    Ok(daily)
}

/// Carry each column's last value forward over at most `horizon` trailing rows.
fn fill_trailing_edges(series: &mut Series, horizon: u32) -> Result<(), DataError> {
    let dates: Vec<NaiveDate> = series.dates().collect();
    let columns = series.columns().to_vec();

    let mut fills = Vec::new();
    for column in &columns {
        let last_present = dates
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, date)| series.get(*date, column).map(|v| (i, v)));
        let Some((idx, value)) = last_present else {
            continue;
        };
        for date in dates.iter().skip(idx + 1).take(horizon as usize) {
            fills.push((*date, column, value));
        }
    }

    for (date, column, value) in fills {
        series.set(date, column, Some(value))?;
    }
    Ok(())
}

//! Series: a date-keyed table of yields.
//!
//! Each row is a calendar day; each column is one instrument (for example
//! `US_10Y`). A missing value is `None`, never zero. The row map is a
//! `BTreeMap`, so dates are unique and ascending by construction.

use crate::data::collector::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One record as produced by a collector: a date and the values seen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRow {
    pub date: NaiveDate,
    pub values: Vec<(String, Option<f64>)>,
}

impl ObservationRow {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            values: Vec::new(),
        }
    }

    /// Builder-style helper used by collectors and tests.
    pub fn with(mut self, column: impl Into<String>, value: Option<f64>) -> Self {
        self.values.push((column.into(), value));
        self
    }
}

/// Date-keyed numeric table with named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    columns: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<Option<f64>>>,
}

impl Series {
    /// Create an empty series with the given columns.
    ///
    /// Column names must be non-empty and unique.
    pub fn new(columns: Vec<String>) -> Result<Self, DataError> {
        for (i, name) in columns.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(DataError::MergeInconsistency(format!(
                    "column {i} has an empty name"
                )));
            }
            if columns[..i].contains(name) {
                return Err(DataError::MergeInconsistency(format!(
                    "duplicate column '{name}'"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: BTreeMap::new(),
        })
    }

    /// Build a series from collector output.
    ///
    /// Columns appear in first-seen order. If the same date occurs twice, the
    /// later row wins cell by cell (a missing later cell keeps the earlier value).
    /// A row that names the same column twice is rejected.
    pub fn from_rows(rows: impl IntoIterator<Item = ObservationRow>) -> Result<Self, DataError> {
        let mut series = Series::default();
        for row in rows {
            for (i, (name, _)) in row.values.iter().enumerate() {
                if row.values[..i].iter().any(|(other, _)| other == name) {
                    return Err(DataError::MergeInconsistency(format!(
                        "row {} names column '{name}' twice",
                        row.date
                    )));
                }
            }
            for (name, value) in row.values {
                let idx = series.ensure_column(&name)?;
                let cells = series.row_mut(row.date);
                if let Some(v) = sanitize(value) {
                    cells[idx] = Some(v);
                }
            }
            // A row with no values still marks the date as observed.
            series.row_mut(row.date);
        }
        Ok(series)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows (dates).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.keys().next_back().copied()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.rows.contains_key(&date)
    }

    /// Rows in ascending date order. Each slice is aligned with `columns()`.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[Option<f64>])> + '_ {
        self.rows.iter().map(|(d, cells)| (*d, cells.as_slice()))
    }

    pub fn row(&self, date: NaiveDate) -> Option<&[Option<f64>]> {
        self.rows.get(&date).map(|cells| cells.as_slice())
    }

    /// Value of `column` on `date`, if both exist and the cell is present.
    pub fn get(&self, date: NaiveDate, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(&date).and_then(|cells| cells[idx])
    }

    /// The latest row dated on or before `date`.
    pub fn row_at_or_before(&self, date: NaiveDate) -> Option<(NaiveDate, &[Option<f64>])> {
        self.rows
            .range(..=date)
            .next_back()
            .map(|(d, cells)| (*d, cells.as_slice()))
    }

    /// Insert or replace a full row. `cells` must match the column count.
    pub fn insert_row(&mut self, date: NaiveDate, cells: Vec<Option<f64>>) -> Result<(), DataError> {
        if cells.len() != self.columns.len() {
            return Err(DataError::MergeInconsistency(format!(
                "row {date} has {} cells, expected {}",
                cells.len(),
                self.columns.len()
            )));
        }
        let cells = cells.into_iter().map(sanitize).collect();
        self.rows.insert(date, cells);
        Ok(())
    }

    /// Set a single cell, creating the row and column as needed.
    pub fn set(&mut self, date: NaiveDate, column: &str, value: Option<f64>) -> Result<(), DataError> {
        let idx = self.ensure_column(column)?;
        self.row_mut(date)[idx] = sanitize(value);
        Ok(())
    }

    /// Rows with dates inside `[start, end]`, keeping all columns.
    pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> Series {
        let rows = if start <= end {
            self.rows
                .range(start..=end)
                .map(|(d, cells)| (*d, cells.clone()))
                .collect()
        } else {
            BTreeMap::new()
        };
        Series {
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Same columns, no rows.
    pub(crate) fn empty_like(&self) -> Series {
        Series {
            columns: self.columns.clone(),
            rows: BTreeMap::new(),
        }
    }

    /// Add `name` as a column if absent (existing rows get `None`).
    /// Returns the column index.
    pub(crate) fn ensure_column(&mut self, name: &str) -> Result<usize, DataError> {
        if let Some(idx) = self.column_index(name) {
            return Ok(idx);
        }
        if name.trim().is_empty() {
            return Err(DataError::MergeInconsistency("empty column name".into()));
        }
        Ok(self.union_column(name))
    }

    /// Add a column name taken from another series (already validated).
    pub(crate) fn union_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for cells in self.rows.values_mut() {
            cells.push(None);
        }
        self.columns.len() - 1
    }

    /// Mutable access to the row for `date`, creating an all-missing row.
    pub(crate) fn row_mut(&mut self, date: NaiveDate) -> &mut Vec<Option<f64>> {
        let width = self.columns.len();
        self.rows.entry(date).or_insert_with(|| vec![None; width])
    }
}

/// Non-finite numbers are treated as missing.
fn sanitize(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn from_rows_keeps_first_seen_column_order() {
        let series = Series::from_rows(vec![
            ObservationRow::new(d("2024-01-03"))
                .with("US_10Y", Some(4.0))
                .with("US_2Y", Some(4.3)),
            ObservationRow::new(d("2024-01-02")).with("DE_10Y", Some(2.1)),
        ])
        .unwrap();

        assert_eq!(series.columns(), &["US_10Y", "US_2Y", "DE_10Y"]);
        assert_eq!(series.first_date(), Some(d("2024-01-02")));
        assert_eq!(series.get(d("2024-01-02"), "US_10Y"), None);
        assert_eq!(series.get(d("2024-01-02"), "DE_10Y"), Some(2.1));
    }

    #[test]
    fn from_rows_rejects_duplicate_column_in_row() {
        let err = Series::from_rows(vec![ObservationRow::new(d("2024-01-02"))
            .with("US_10Y", Some(4.0))
            .with("US_10Y", Some(4.1))])
        .unwrap_err();
        assert!(matches!(err, DataError::MergeInconsistency(_)));
    }

    #[test]
    fn nan_is_stored_as_missing() {
        let series = Series::from_rows(vec![
            ObservationRow::new(d("2024-01-02")).with("US_10Y", Some(f64::NAN))
        ])
        .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.get(d("2024-01-02"), "US_10Y"), None);
    }

    #[test]
    fn new_rejects_duplicate_columns() {
        assert!(Series::new(vec!["A".into(), "A".into()]).is_err());
        assert!(Series::new(vec![" ".into()]).is_err());
    }

    #[test]
    fn insert_row_checks_width() {
        let mut series = Series::new(vec!["A".into(), "B".into()]).unwrap();
        assert!(series.insert_row(d("2024-01-02"), vec![Some(1.0)]).is_err());
        series
            .insert_row(d("2024-01-02"), vec![Some(1.0), None])
            .unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn row_at_or_before_picks_latest_prior_row() {
        let series = Series::from_rows(vec![
            ObservationRow::new(d("2024-01-02")).with("A", Some(1.0)),
            ObservationRow::new(d("2024-01-05")).with("A", Some(2.0)),
        ])
        .unwrap();

        let (date, cells) = series.row_at_or_before(d("2024-01-04")).unwrap();
        assert_eq!(date, d("2024-01-02"));
        assert_eq!(cells, &[Some(1.0)]);
        assert!(series.row_at_or_before(d("2024-01-01")).is_none());
    }

    #[test]
    fn slice_is_inclusive() {
        let series = Series::from_rows(
            ["2024-01-02", "2024-01-03", "2024-01-04"]
                .iter()
                .map(|s| ObservationRow::new(d(s)).with("A", Some(1.0))),
        )
        .unwrap();
        let sliced = series.slice(d("2024-01-03"), d("2024-01-04"));
        assert_eq!(sliced.len(), 2);
        assert!(series.slice(d("2024-01-04"), d("2024-01-03")).is_empty());
    }
}

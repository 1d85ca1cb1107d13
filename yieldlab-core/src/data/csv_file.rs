//! Collector that imports a raw table already on disk.
//!
//! Typical sources: a spreadsheet export from the KOFIA bond portal, or a
//! CSV dropped by a separate scraper job. Rows outside the requested window
//! are discarded.

use super::codec::{read_raw_rows, RawTableOptions};
use super::collector::{Collector, DataError};
use crate::domain::{FetchWindow, ObservationRow};
use std::path::PathBuf;

pub struct CsvFileCollector {
    name: String,
    path: PathBuf,
    options: RawTableOptions,
}

impl CsvFileCollector {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, options: RawTableOptions) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Collector for CsvFileCollector {
    fn name(&self) -> &str {
        &self.name
    }

    fn collect(&self, window: &FetchWindow) -> Result<Vec<ObservationRow>, DataError> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            DataError::fetch(&self.name, format!("cannot open {}: {e}", self.path.display()))
        })?;
        let rows = read_raw_rows(std::io::BufReader::new(file), &self.options, &self.name)?;
        let total = rows.len();
        let rows: Vec<ObservationRow> = rows
            .into_iter()
            .filter(|row| window.contains(row.date))
            .collect();
        tracing::debug!(
            collector = %self.name,
            read = total,
            kept = rows.len(),
            %window,
            "imported raw table"
        );
        Ok(rows)
    }
}

//! CSV encoding of series.
//!
//! Persisted layout: header `Date,<col>,<col>...`, ISO dates ascending, one
//! row per date, missing values as empty fields, floats in shortest
//! round-trip form. Raw tables (spreadsheet exports, scraper stdout) are read
//! leniently through [`RawTableOptions`].

use super::collector::DataError;
use crate::domain::{ObservationRow, Series};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Header of the date column in persisted files.
pub const DATE_COLUMN: &str = "Date";

/// Date formats accepted in raw tables, tried in order.
const RAW_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%Y%m%d",
    "%m/%d/%Y",
    "%b %d, %Y",
];

/// Encode a series as CSV.
pub fn write_series<W: Write>(writer: W, series: &Series) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = Vec::with_capacity(series.columns().len() + 1);
    header.push(DATE_COLUMN.to_string());
    header.extend(series.columns().iter().cloned());
    wtr.write_record(&header)?;

    for (date, cells) in series.iter() {
        let mut record = Vec::with_capacity(cells.len() + 1);
        record.push(date.format("%Y-%m-%d").to_string());
        record.extend(cells.iter().map(|cell| match cell {
            Some(v) => v.to_string(),
            None => String::new(),
        }));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Encode a series into an in-memory buffer.
pub fn series_to_bytes(series: &Series) -> Result<Vec<u8>, DataError> {
    let mut buf = Vec::new();
    write_series(&mut buf, series)?;
    Ok(buf)
}

/// Decode a persisted series strictly.
///
/// `origin` names the source in error messages. Dates must be ISO, unique
/// and strictly ascending; cells must be empty or numeric.
pub fn read_series<R: Read>(reader: R, origin: &str) -> Result<Series, DataError> {
    let corrupt = |reason: String| DataError::CorruptFile {
        path: origin.into(),
        reason,
    };

    // Field counts are checked per row below so they report as corruption.
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| corrupt(format!("unreadable header: {e}")))?
        .clone();
    let mut fields = headers.iter();
    match fields.next() {
        Some(first) if first.trim() == DATE_COLUMN => {}
        other => {
            return Err(corrupt(format!(
                "first column must be '{DATE_COLUMN}', found {other:?}"
            )))
        }
    }
    let columns: Vec<String> = fields.map(|h| h.trim().to_string()).collect();
    let mut series =
        Series::new(columns.clone()).map_err(|e| corrupt(format!("bad header: {e}")))?;

    let mut previous: Option<NaiveDate> = None;
    for (line, record) in rdr.records().enumerate() {
        let line = line + 2;
        let record = record.map_err(|e| corrupt(format!("line {line}: {e}")))?;
        let date_field = record.get(0).unwrap_or_default().trim();
        let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d")
            .map_err(|e| corrupt(format!("line {line}: bad date '{date_field}': {e}")))?;
        if previous.is_some_and(|p| p >= date) {
            return Err(corrupt(format!(
                "line {line}: date {date} is not after the previous row"
            )));
        }
        previous = Some(date);

        if record.len() != columns.len() + 1 {
            return Err(corrupt(format!(
                "line {line}: {} fields, expected {}",
                record.len(),
                columns.len() + 1
            )));
        }

        let cells = record
            .iter()
            .skip(1)
            .map(|field| {
                let field = field.trim();
                if field.is_empty() {
                    Ok(None)
                } else {
                    field
                        .parse::<f64>()
                        .map(Some)
                        .map_err(|_| corrupt(format!("line {line}: bad number '{field}'")))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        series.insert_row(date, cells)?;
    }

    Ok(series)
}

/// How to interpret a raw table coming from outside the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTableOptions {
    /// Header of the date column.
    pub date_column: String,
    /// Source header -> canonical column name.
    pub rename: BTreeMap<String, String>,
    /// Keep columns that have no entry in `rename` under their own header.
    pub keep_unmapped: bool,
    pub delimiter: char,
}

impl Default for RawTableOptions {
    fn default() -> Self {
        Self {
            date_column: DATE_COLUMN.to_string(),
            rename: BTreeMap::new(),
            keep_unmapped: true,
            delimiter: ',',
        }
    }
}

/// Read a raw table into observation rows.
///
/// Numbers may carry thousands separators or a trailing `%`; anything that
/// does not parse (`-`, `N/A`, blanks) becomes a missing value. Rows whose
/// date cannot be parsed are rejected as a fetch failure, since they mean the
/// source format changed.
pub fn read_raw_rows<R: Read>(
    reader: R,
    opts: &RawTableOptions,
    origin: &str,
) -> Result<Vec<ObservationRow>, DataError> {
    let delimiter = u8::try_from(opts.delimiter).map_err(|_| {
        DataError::fetch(origin, format!("delimiter {:?} is not ASCII", opts.delimiter))
    })?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    let date_idx = headers
        .iter()
        .position(|h| h == &opts.date_column)
        .ok_or_else(|| {
            DataError::fetch(
                origin,
                format!("no '{}' column in header {headers:?}", opts.date_column),
            )
        })?;

    // (source index, canonical name)
    let targets: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != date_idx)
        .filter_map(|(i, h)| match opts.rename.get(h) {
            Some(canonical) => Some((i, canonical.clone())),
            None if opts.keep_unmapped && !h.is_empty() => Some((i, h.clone())),
            None => None,
        })
        .collect();

    if targets.is_empty() {
        return Err(DataError::fetch(
            origin,
            format!("no value columns recognised in header {headers:?}"),
        ));
    }

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let raw_date = record.get(date_idx).unwrap_or_default().trim();
        if raw_date.is_empty() {
            continue;
        }
        let date = parse_raw_date(raw_date).ok_or_else(|| {
            DataError::fetch(origin, format!("line {}: unrecognised date '{raw_date}'", line + 2))
        })?;

        let mut row = ObservationRow::new(date);
        for (idx, name) in &targets {
            let value = record.get(*idx).and_then(parse_raw_number);
            row = row.with(name.clone(), value);
        }
        rows.push(row);
    }

    Ok(rows)
}

fn parse_raw_date(s: &str) -> Option<NaiveDate> {
    RAW_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn parse_raw_number(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

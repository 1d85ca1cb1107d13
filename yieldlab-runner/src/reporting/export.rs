//! CSV export of report tables.
//!
//! Column headers follow the on-screen tables: `Country`, then for each
//! tenor `{T}Y` (level in %) followed by one column per change period (bp).

use super::curve::YieldCurve;
use super::summary::ChangeSummary;
use std::io::Write;
use yieldlab_core::data::DataError;

fn cell(value: Option<f64>, decimals: usize) -> String {
    value.map(|v| format!("{v:.decimals$}")).unwrap_or_default()
}

/// Write a change summary as CSV.
pub fn write_summary_csv<W: Write>(writer: W, summary: &ChangeSummary) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["Country".to_string()];
    if let Some(first) = summary.rows.first() {
        for tenor in &first.tenors {
            header.push(format!("{}Y", tenor.tenor));
            header.extend(
                summary
                    .periods()
                    .iter()
                    .map(|p| format!("{}Y {}", tenor.tenor, p.label())),
            );
        }
    }
    wtr.write_record(&header)?;

    for row in &summary.rows {
        let mut record = vec![row.country.clone()];
        for tenor in &row.tenors {
            record.push(cell(tenor.level, 3));
            record.extend(tenor.changes_bp.iter().map(|c| cell(*c, 1)));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write a yield curve snapshot as CSV.
pub fn write_curve_csv<W: Write>(writer: W, curve: &YieldCurve) -> Result<(), DataError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["Tenor", "Level", "1W (bp)", "1M (bp)"])?;
    for point in &curve.points {
        wtr.write_record([
            format!("{}Y", point.tenor),
            cell(point.level, 3),
            cell(point.change_1w_bp(), 1),
            cell(point.change_1m_bp(), 1),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

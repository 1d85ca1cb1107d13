//! Rate change summary: level and 1D / 1W / MTD / YTD / YoY changes in basis points.

use super::join::value_at_or_before;
use chrono::{Datelike, Days, Months, NaiveDate};
use yieldlab_core::domain::{ColumnConvention, Series};

/// Lookback periods of the summary table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePeriod {
    OneDay,
    OneWeek,
    MonthToDate,
    YearToDate,
    YearOverYear,
}

impl ChangePeriod {
    pub const ALL: [ChangePeriod; 5] = [
        ChangePeriod::OneDay,
        ChangePeriod::OneWeek,
        ChangePeriod::MonthToDate,
        ChangePeriod::YearToDate,
        ChangePeriod::YearOverYear,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ChangePeriod::OneDay => "1D",
            ChangePeriod::OneWeek => "1W",
            ChangePeriod::MonthToDate => "MTD",
            ChangePeriod::YearToDate => "YTD",
            ChangePeriod::YearOverYear => "YoY",
        }
    }

    /// Date whose value the change is measured against.
    ///
    /// MTD compares with the last day of the previous month, YTD with the
    /// last day of the previous year.
    pub fn reference_date(self, as_of: NaiveDate) -> NaiveDate {
        let date = match self {
            ChangePeriod::OneDay => as_of.checked_sub_days(Days::new(1)),
            ChangePeriod::OneWeek => as_of.checked_sub_days(Days::new(7)),
            ChangePeriod::MonthToDate => as_of.with_day(1).and_then(|d| d.pred_opt()),
            ChangePeriod::YearToDate => NaiveDate::from_ymd_opt(as_of.year() - 1, 12, 31),
            ChangePeriod::YearOverYear => as_of.checked_sub_months(Months::new(12)),
        };
        date.unwrap_or(NaiveDate::MIN)
    }
}

/// Level and changes for one tenor of one country.
#[derive(Debug, Clone, PartialEq)]
pub struct TenorChanges {
    pub tenor: u32,
    pub column: String,
    /// Yield in percent on the as-of date.
    pub level: Option<f64>,
    /// Changes in basis points, aligned with [`ChangePeriod::ALL`].
    pub changes_bp: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub country: String,
    pub tenors: Vec<TenorChanges>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    pub as_of: NaiveDate,
    pub rows: Vec<SummaryRow>,
}

impl ChangeSummary {
    pub fn periods(&self) -> &'static [ChangePeriod] {
        &ChangePeriod::ALL
    }
}

/// Build the change summary at `as_of` for every `country` × `tenor`.
///
/// Countries without data still get a row so the table shape is stable.
pub fn change_summary(
    series: &Series,
    as_of: NaiveDate,
    countries: &[String],
    tenors: &[u32],
    convention: &ColumnConvention,
) -> ChangeSummary {
    let rows = countries
        .iter()
        .map(|country| SummaryRow {
            country: country.clone(),
            tenors: tenors
                .iter()
                .map(|&tenor| {
                    let tenor_label = tenor.to_string();
                    let column = convention
                        .render(&[("COUNTRY", country.as_str()), ("TENOR", tenor_label.as_str())]);
                    let level = value_at_or_before(series, &column, as_of);
                    let changes_bp = ChangePeriod::ALL
                        .iter()
                        .map(|period| {
                            let reference =
                                value_at_or_before(series, &column, period.reference_date(as_of));
                            bp_change(level, reference)
                        })
                        .collect();
                    TenorChanges {
                        tenor,
                        column,
                        level,
                        changes_bp,
                    }
                })
                .collect(),
        })
        .collect();

    ChangeSummary { as_of, rows }
}

/// `(current - reference) * 100`, when both are present.
pub(crate) fn bp_change(current: Option<f64>, reference: Option<f64>) -> Option<f64> {
    Some((current? - reference?) * 100.0)
}

//! Yield curve snapshot for one country.

use super::join::value_at_or_before;
use super::summary::bp_change;
use chrono::{Days, NaiveDate};
use yieldlab_core::domain::{ColumnConvention, Series};

/// Days back for the "one week ago" curve.
pub const WEEK_DAYS: u64 = 7;
/// Days back for the "one month ago" curve.
pub const MONTH_DAYS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct CurvePoint {
    pub tenor: u32,
    pub level: Option<f64>,
    pub week_ago: Option<f64>,
    pub month_ago: Option<f64>,
}

impl CurvePoint {
    pub fn change_1w_bp(&self) -> Option<f64> {
        bp_change(self.level, self.week_ago)
    }

    pub fn change_1m_bp(&self) -> Option<f64> {
        bp_change(self.level, self.month_ago)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct YieldCurve {
    pub country: String,
    pub as_of: NaiveDate,
    pub points: Vec<CurvePoint>,
}

impl YieldCurve {
    /// True when no tenor has a level on the as-of date.
    pub fn is_empty(&self) -> bool {
        self.points.iter().all(|p| p.level.is_none())
    }
}

/// Curve of `country` at `as_of`, plus the same tenors a week and a month earlier.
pub fn curve_at(
    series: &Series,
    country: &str,
    as_of: NaiveDate,
    tenors: &[u32],
    convention: &ColumnConvention,
) -> YieldCurve {
    let week = as_of.checked_sub_days(Days::new(WEEK_DAYS)).unwrap_or(NaiveDate::MIN);
    let month = as_of.checked_sub_days(Days::new(MONTH_DAYS)).unwrap_or(NaiveDate::MIN);

    let points = tenors
        .iter()
        .map(|&tenor| {
            let tenor_label = tenor.to_string();
            let column = convention.render(&[("COUNTRY", country), ("TENOR", tenor_label.as_str())]);
            CurvePoint {
                tenor,
                level: value_at_or_before(series, &column, as_of),
                week_ago: value_at_or_before(series, &column, week),
                month_ago: value_at_or_before(series, &column, month),
            }
        })
        .collect();

    YieldCurve {
        country: country.to_string(),
        as_of,
        points,
    }
}

/// Countries that have at least one column matching `convention`, in column order.
pub fn available_countries(series: &Series, convention: &ColumnConvention) -> Vec<String> {
    let mut countries: Vec<String> = Vec::new();
    for column in series.columns() {
        let Some(captures) = convention.parse(column) else {
            continue;
        };
        let country = captures
            .into_iter()
            .find(|(key, _)| key == "COUNTRY")
            .map(|(_, value)| value);
        if let Some(country) = country {
            if !countries.contains(&country) {
                countries.push(country);
            }
        }
    }
    countries
}

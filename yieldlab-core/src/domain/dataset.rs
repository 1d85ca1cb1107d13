//! Dataset descriptors: static metadata for one persisted series.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Default forward-fill horizon, in calendar slots.
///
/// Covers weekends plus the longest Korean market holidays (Chuseok and
/// Lunar New Year can close the market for up to six consecutive days).
pub const DEFAULT_FILL_HORIZON: u32 = 7;

/// How far back a first run reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    Days(u32),
    /// Calendar years; Feb 29 clamps to Feb 28.
    Years(u32),
}

impl Lookback {
    /// First date of the default window ending on `today`.
    pub fn start_from(self, today: NaiveDate) -> NaiveDate {
        let start = match self {
            Lookback::Days(n) => today.checked_sub_days(Days::new(u64::from(n))),
            Lookback::Years(n) => today.checked_sub_months(Months::new(n.saturating_mul(12))),
        };
        start.unwrap_or(NaiveDate::MIN)
    }

    pub fn is_zero(self) -> bool {
        matches!(self, Lookback::Days(0) | Lookback::Years(0))
    }
}

/// Which dates make up the canonical index of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    /// Every calendar day, weekends and holidays included.
    #[default]
    Daily,
    /// Monday through Friday.
    BusinessDays,
    /// Only dates that appear in the persisted table or the new fetch.
    Observed,
}

/// Column naming pattern such as `{COUNTRY}_{TENOR}Y`.
///
/// Placeholders are `{NAME}` tokens; everything else is literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnConvention(String);

impl Default for ColumnConvention {
    fn default() -> Self {
        Self("{COUNTRY}_{TENOR}Y".to_string())
    }
}

impl ColumnConvention {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn pattern(&self) -> &str {
        &self.0
    }

    /// Substitute placeholders, e.g. `render(&[("COUNTRY", "US"), ("TENOR", "10")])`.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.0.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }

    /// Match a column name against the pattern, returning placeholder values
    /// in pattern order. Placeholder values must be non-empty.
    pub fn parse(&self, column: &str) -> Option<Vec<(String, String)>> {
        let tokens = tokenize(&self.0);
        let mut captures = Vec::new();
        let mut rest = column;

        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Literal(lit) => rest = rest.strip_prefix(lit.as_str())?,
                Token::Placeholder(name) => {
                    // Capture up to the next literal (or the end).
                    let value = match tokens.get(i + 1) {
                        Some(Token::Literal(next)) => {
                            let end = rest.find(next.as_str())?;
                            &rest[..end]
                        }
                        Some(Token::Placeholder(_)) => return None,
                        None => rest,
                    };
                    if value.is_empty() {
                        return None;
                    }
                    captures.push((name.clone(), value.to_string()));
                    rest = &rest[value.len()..];
                }
            }
        }

        rest.is_empty().then_some(captures)
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = pattern;
    while !rest.is_empty() {
        match (rest.find('{'), rest.find('}')) {
            (Some(open), Some(close)) if open < close => {
                if open > 0 {
                    tokens.push(Token::Literal(rest[..open].to_string()));
                }
                tokens.push(Token::Placeholder(rest[open + 1..close].to_string()));
                rest = &rest[close + 1..];
            }
            _ => {
                tokens.push(Token::Literal(rest.to_string()));
                break;
            }
        }
    }
    tokens
}

/// Static metadata for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Unique dataset name, e.g. `global_treasury`.
    pub name: String,
    /// File name of the persisted CSV, relative to the data directory.
    pub file: String,
    /// Window fetched when nothing is persisted yet.
    pub default_window: Lookback,
    /// Naming pattern every column of this dataset is expected to follow.
    pub columns: ColumnConvention,
    pub calendar: CalendarKind,
    /// Longest gap (in calendar slots) that is forward-filled.
    pub fill_horizon: u32,
    /// Revisions older than this many days before the last persisted date
    /// are ignored. `None` always prefers the latest fetch.
    pub revision_window_days: Option<u32>,
}

impl DatasetDescriptor {
    /// Descriptor with the default calendar, convention and fill horizon.
    pub fn new(name: impl Into<String>, file: impl Into<String>, default_window: Lookback) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            default_window,
            columns: ColumnConvention::default(),
            calendar: CalendarKind::default(),
            fill_horizon: DEFAULT_FILL_HORIZON,
            revision_window_days: None,
        }
    }

    /// Columns that do not match the dataset's naming convention.
    pub fn nonconforming_columns<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        columns
            .iter()
            .filter(|c| self.columns.parse(c).is_none())
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn lookback_days_crosses_leap_day() {
        assert_eq!(Lookback::Days(365).start_from(d("2024-06-01")), d("2023-06-02"));
    }

    #[test]
    fn lookback_years_clamps_leap_day() {
        assert_eq!(Lookback::Years(1).start_from(d("2024-02-29")), d("2023-02-28"));
        assert_eq!(Lookback::Years(5).start_from(d("2024-06-01")), d("2019-06-01"));
    }

    #[test]
    fn convention_render_and_parse() {
        let conv = ColumnConvention::default();
        assert_eq!(conv.render(&[("COUNTRY", "US"), ("TENOR", "10")]), "US_10Y");

        let parsed = conv.parse("KR_30Y").unwrap();
        assert_eq!(
            parsed,
            vec![
                ("COUNTRY".to_string(), "KR".to_string()),
                ("TENOR".to_string(), "30".to_string())
            ]
        );
        assert!(conv.parse("KR_30").is_none());
        assert!(conv.parse("_10Y").is_none());
    }

    #[test]
    fn convention_with_literal_only() {
        let conv = ColumnConvention::new("CD_91D");
        assert_eq!(conv.parse("CD_91D"), Some(vec![]));
        assert!(conv.parse("CP_91D").is_none());
    }

    #[test]
    fn nonconforming_columns_follow_descriptor_convention() {
        let mut desc = DatasetDescriptor::new("kofia_treasury", "kofia_treasury.csv", Lookback::Years(5));
        let columns: Vec<String> = ["KR_3Y", "국고채(10년)", "KR_10Y", "Price"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(desc.nonconforming_columns(&columns), vec!["국고채(10년)", "Price"]);

        desc.columns = ColumnConvention::new("{NAME}");
        assert!(desc.nonconforming_columns(&columns).is_empty());
    }

    #[test]
    fn lookback_deserializes_from_inline_table() {
        #[derive(Deserialize)]
        struct Wrapper {
            window: Lookback,
        }
        let w: Wrapper = serde_json::from_str(r#"{"window": {"years": 5}}"#).unwrap();
        assert_eq!(w.window, Lookback::Years(5));
    }
}

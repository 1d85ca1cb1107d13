//! Read-only analytics over persisted datasets.
//!
//! Everything here consumes series produced by the collection cycle and never
//! writes to the store.

pub mod curve;
pub mod export;
pub mod join;
pub mod summary;

pub use curve::{available_countries, curve_at, CurvePoint, YieldCurve};
pub use export::{write_curve_csv, write_summary_csv};
pub use join::{join_series, load_joined, value_at_or_before};
pub use summary::{change_summary, ChangePeriod, ChangeSummary, SummaryRow, TenorChanges};

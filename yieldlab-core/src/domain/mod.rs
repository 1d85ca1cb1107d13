//! Domain types for yieldlab

pub mod dataset;
pub mod series;
pub mod window;

pub use dataset::{CalendarKind, ColumnConvention, DatasetDescriptor, Lookback, DEFAULT_FILL_HORIZON};
pub use series::{ObservationRow, Series};
pub use window::FetchWindow;

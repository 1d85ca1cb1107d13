//! Data pipeline: collectors, calendar normalization, merging, planning and persistence.

pub mod calendar;
pub mod codec;
pub mod collector;
pub mod command;
pub mod csv_file;
pub mod merge;
pub mod planner;
pub mod store;

pub use calendar::{normalize, Calendar, FillPolicy};
pub use codec::RawTableOptions;
pub use collector::{Collector, DataError};
pub use command::CommandCollector;
pub use csv_file::CsvFileCollector;
pub use merge::{merge, merge_with, MergeOptions};
pub use planner::plan;
pub use store::{CommitStatus, SeriesStore, StoreMeta, StoreStatus};

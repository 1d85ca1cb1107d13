//! Collector trait and structured error types.
//!
//! A collector is whatever obtains raw rows for a date window: a downloaded
//! spreadsheet export, a browser scraper run as a subprocess, a test double.
//! The merge/persist pipeline only sees `Collector::collect`.

use crate::domain::{FetchWindow, ObservationRow};
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and log lines.
#[derive(Debug, Error)]
pub enum DataError {
    /// The external source could not deliver data (network, bot block, parse).
    #[error("fetch failed ({collector}): {reason}")]
    FetchFailed { collector: String, reason: String },

    /// Incoming data has a shape that cannot be merged.
    #[error("merge inconsistency: {0}")]
    MergeInconsistency(String),

    /// Writing the persisted file failed. The previous file is intact.
    #[error("persistence failure for {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    /// The persisted file exists but cannot be trusted.
    #[error("corrupt data file {}: {reason}", path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DataError {
    pub fn fetch(collector: &str, reason: impl Into<String>) -> Self {
        DataError::FetchFailed {
            collector: collector.to_string(),
            reason: reason.into(),
        }
    }

    /// True for failures that originate in the external source.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, DataError::FetchFailed { .. })
    }
}

/// Trait for collectors (file import, external scraper command, etc).
///
/// Implementations handle the specifics of a particular source. The store sits
/// above this trait; collectors never touch persisted state.
pub trait Collector: Send + Sync {
    /// Human-readable name of this collector.
    fn name(&self) -> &str;

    /// Fetch rows for the inclusive window.
    ///
    /// An empty `Vec` means the source had nothing for the window (for
    /// example a weekend); an `Err` means the source could not be read.
    fn collect(&self, window: &FetchWindow) -> Result<Vec<ObservationRow>, DataError>;
}

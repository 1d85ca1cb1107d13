//! CSV store and persistence gate.
//!
//! Layout: `{data_dir}/{file}` plus a metadata sidecar `{data_dir}/{file}.meta.json`.
//!
//! Features:
//! - Atomic writes (write to .tmp, fsync, rename into place)
//! - Failure gate: a failed fetch or merge never touches the persisted file
//! - No-change detection (byte-identical content is not rewritten)
//! - Strict validation on load (header, ISO dates, strictly ascending)
//! - Metadata sidecar per dataset (hash, date range, columns)

use super::codec;
use super::collector::DataError;
use crate::domain::{DatasetDescriptor, Series};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Metadata sidecar for a persisted dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub dataset: String,
    pub file: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
}

/// Result of a commit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    /// New content was written.
    Written { rows: usize, columns: usize },
    /// Merged content is identical to what is on disk.
    SkippedNoChange,
    /// Upstream failed; persisted state was not touched.
    SkippedFailure { reason: String },
}

impl CommitStatus {
    pub fn is_written(&self) -> bool {
        matches!(self, CommitStatus::Written { .. })
    }
}

/// The dataset store. Sole writer of persisted series.
pub struct SeriesStore {
    data_dir: PathBuf,
}

impl SeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the persisted CSV for a dataset.
    pub fn path(&self, descriptor: &DatasetDescriptor) -> PathBuf {
        self.data_dir.join(&descriptor.file)
    }

    /// Path to the metadata sidecar for a dataset.
    fn meta_path(&self, descriptor: &DatasetDescriptor) -> PathBuf {
        sibling(&self.path(descriptor), "meta.json")
    }

    /// Load the persisted series.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet. A file that
    /// exists but fails validation is an error, never treated as absent.
    pub fn load(&self, descriptor: &DatasetDescriptor) -> Result<Option<Series>, DataError> {
        let path = self.path(descriptor);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DataError::Io(e)),
        };
        let series = codec::read_series(std::io::BufReader::new(file), &path.to_string_lossy())?;
        Ok(Some(series))
    }

    /// Persist a merged series, or record why nothing was persisted.
    ///
    /// `Err` input never touches the file. Empty series are refused for the
    /// same reason: writing them would truncate history.
    pub fn commit(
        &self,
        descriptor: &DatasetDescriptor,
        merged: Result<Series, DataError>,
    ) -> Result<CommitStatus, DataError> {
        let series = match merged {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(dataset = %descriptor.name, error = %e, "commit skipped, keeping previous file");
                return Ok(CommitStatus::SkippedFailure {
                    reason: e.to_string(),
                });
            }
        };

        if series.is_empty() || series.columns().is_empty() {
            tracing::warn!(dataset = %descriptor.name, "refusing to persist an empty series");
            return Ok(CommitStatus::SkippedFailure {
                reason: "merged series is empty".into(),
            });
        }

        let bytes = codec::series_to_bytes(&series)?;
        let path = self.path(descriptor);

        match fs::read(&path) {
            Ok(current) if current == bytes => {
                tracing::debug!(dataset = %descriptor.name, "content unchanged");
                return Ok(CommitStatus::SkippedNoChange);
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(persistence(&path, format!("read current file: {e}"))),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| persistence(&path, format!("failed to create dir: {e}")))?;
        }
        write_atomic(&path, &bytes)?;

        if let Err(e) = self.write_meta(descriptor, &series, &bytes) {
            // The data file is already in place; the sidecar is advisory.
            tracing::warn!(dataset = %descriptor.name, error = %e, "metadata sidecar not written");
        }

        tracing::info!(
            dataset = %descriptor.name,
            rows = series.len(),
            path = %path.display(),
            "series written"
        );
        Ok(CommitStatus::Written {
            rows: series.len(),
            columns: series.columns().len(),
        })
    }

    fn write_meta(
        &self,
        descriptor: &DatasetDescriptor,
        series: &Series,
        bytes: &[u8],
    ) -> Result<(), DataError> {
        let (Some(first_date), Some(last_date)) = (series.first_date(), series.last_date()) else {
            return Ok(());
        };
        let meta = StoreMeta {
            dataset: descriptor.name.clone(),
            file: descriptor.file.clone(),
            first_date,
            last_date,
            row_count: series.len(),
            columns: series.columns().to_vec(),
            data_hash: blake3::hash(bytes).to_hex().to_string(),
            written_at: chrono::Local::now().naive_local(),
        };
        let path = self.meta_path(descriptor);
        let json = serde_json::to_vec_pretty(&meta)
            .map_err(|e| persistence(&path, format!("meta serialization: {e}")))?;
        write_atomic(&path, &json)
    }

    /// Read the metadata sidecar, if present and parseable.
    pub fn get_meta(&self, descriptor: &DatasetDescriptor) -> Option<StoreMeta> {
        let content = fs::read_to_string(self.meta_path(descriptor)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Which datasets have persisted data, and their date ranges.
    ///
    /// The sidecar is trusted only when its hash matches the file. Otherwise
    /// the range is read from the file itself and `meta_stale` is set.
    pub fn status(&self, descriptors: &[DatasetDescriptor]) -> Vec<StoreStatus> {
        descriptors
            .iter()
            .map(|descriptor| self.status_of(descriptor))
            .collect()
    }

    fn status_of(&self, descriptor: &DatasetDescriptor) -> StoreStatus {
        let path = self.path(descriptor);
        let mut status = StoreStatus {
            dataset: descriptor.name.clone(),
            path,
            persisted: false,
            size_bytes: None,
            first_date: None,
            last_date: None,
            row_count: None,
            meta_stale: false,
        };
        let Ok(bytes) = fs::read(&status.path) else {
            return status;
        };
        status.persisted = true;
        status.size_bytes = Some(bytes.len() as u64);

        let hash = blake3::hash(&bytes).to_hex().to_string();
        match self.get_meta(descriptor) {
            Some(meta) if meta.data_hash == hash => {
                status.first_date = Some(meta.first_date);
                status.last_date = Some(meta.last_date);
                status.row_count = Some(meta.row_count);
            }
            meta => {
                status.meta_stale = meta.is_some();
                tracing::debug!(dataset = %descriptor.name, "sidecar missing or stale, reading file");
                if let Ok(series) = codec::read_series(bytes.as_slice(), &status.path.to_string_lossy()) {
                    status.first_date = series.first_date();
                    status.last_date = series.last_date();
                    status.row_count = Some(series.len());
                }
            }
        }
        status
    }
}

/// Persisted state of a single dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStatus {
    pub dataset: String,
    pub path: PathBuf,
    pub persisted: bool,
    pub size_bytes: Option<u64>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub row_count: Option<usize>,
    /// A sidecar exists but describes different content than the file.
    pub meta_stale: bool,
}

// ── File helpers ────────────────────────────────────────────────────

/// `data/x.csv` + `tmp` -> `data/x.csv.tmp`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn persistence(path: &Path, reason: String) -> DataError {
    DataError::Persistence {
        path: path.to_path_buf(),
        reason,
    }
}

/// Write `bytes` to a temp file next to `path`, sync, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    let tmp_path = sibling(path, "tmp");

    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp_path);
        return Err(persistence(path, format!("write temp file: {e}")));
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        // Clean up temp file on rename failure
        let _ = fs::remove_file(&tmp_path);
        persistence(path, format!("atomic rename failed: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Lookback, ObservationRow};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new("global_treasury", "global_treasury.csv", Lookback::Years(5))
    }

    fn sample_series() -> Series {
        Series::from_rows(vec![
            ObservationRow::new(d("2024-01-10")).with("US_10Y", Some(3.0)),
            ObservationRow::new(d("2024-01-11")).with("US_10Y", Some(3.05)),
        ])
        .unwrap()
    }

    #[test]
    fn commit_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());

        let status = store.commit(&descriptor(), Ok(sample_series())).unwrap();
        assert_eq!(status, CommitStatus::Written { rows: 2, columns: 1 });

        let loaded = store.load(&descriptor()).unwrap().unwrap();
        assert_eq!(loaded, sample_series());
        assert!(!sibling(&store.path(&descriptor()), "tmp").exists());
    }

    #[test]
    fn load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        assert!(store.load(&descriptor()).unwrap().is_none());
    }

    #[test]
    fn failure_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();
        let before = fs::read(store.path(&descriptor())).unwrap();

        let status = store
            .commit(&descriptor(), Err(DataError::fetch("investing", "timeout")))
            .unwrap();
        assert!(matches!(status, CommitStatus::SkippedFailure { .. }));
        assert_eq!(fs::read(store.path(&descriptor())).unwrap(), before);
    }

    #[test]
    fn identical_content_is_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();
        let status = store.commit(&descriptor(), Ok(sample_series())).unwrap();
        assert_eq!(status, CommitStatus::SkippedNoChange);
    }

    #[test]
    fn empty_series_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        let status = store.commit(&descriptor(), Ok(Series::default())).unwrap();
        assert!(matches!(status, CommitStatus::SkippedFailure { .. }));
        assert!(!store.path(&descriptor()).exists());
    }

    #[test]
    fn corrupt_file_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        fs::write(store.path(&descriptor()), "Date,US_10Y\nnot-a-date,1\n").unwrap();
        let err = store.load(&descriptor()).unwrap_err();
        assert!(matches!(err, DataError::CorruptFile { .. }));
    }

    #[test]
    fn write_error_is_persistence_failure_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();
        let before = fs::read(store.path(&descriptor())).unwrap();

        // A directory where the temp file should go makes the write fail.
        fs::create_dir(sibling(&store.path(&descriptor()), "tmp")).unwrap();
        let mut grown = sample_series();
        grown.set(d("2024-01-12"), "US_10Y", Some(3.1)).unwrap();

        let err = store.commit(&descriptor(), Ok(grown)).unwrap_err();
        assert!(matches!(err, DataError::Persistence { .. }));
        assert_eq!(fs::read(store.path(&descriptor())).unwrap(), before);
    }

    #[test]
    fn status_ignores_stale_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();
        let old_meta = fs::read(store.meta_path(&descriptor())).unwrap();

        let mut grown = sample_series();
        grown.set(d("2024-01-12"), "US_10Y", Some(3.1)).unwrap();
        store.commit(&descriptor(), Ok(grown)).unwrap();
        // Simulate a sidecar write that did not land.
        fs::write(store.meta_path(&descriptor()), old_meta).unwrap();

        let status = &store.status(&[descriptor()])[0];
        assert!(status.meta_stale);
        assert_eq!(status.last_date, Some(d("2024-01-12")));
        assert_eq!(status.row_count, Some(3));
    }

    #[test]
    fn status_without_sidecar_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();
        fs::remove_file(store.meta_path(&descriptor())).unwrap();

        let status = &store.status(&[descriptor()])[0];
        assert!(status.persisted);
        assert!(!status.meta_stale);
        assert_eq!(status.first_date, Some(d("2024-01-10")));
    }

    #[test]
    fn meta_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        store.commit(&descriptor(), Ok(sample_series())).unwrap();

        let meta = store.get_meta(&descriptor()).unwrap();
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.first_date, d("2024-01-10"));
        assert_eq!(meta.columns, vec!["US_10Y".to_string()]);

        let other = DatasetDescriptor::new("bond_summary", "bond_summary.csv", Lookback::Years(5));
        let statuses = store.status(&[descriptor(), other]);
        assert!(statuses[0].persisted);
        assert_eq!(statuses[0].last_date, Some(d("2024-01-11")));
        assert!(!statuses[0].meta_stale);
        assert!(!statuses[1].persisted);
    }
}

//! Collection cycle: plan, fetch, normalize, merge and commit one dataset.
//!
//! Per dataset and run:
//!
//! ```text
//! Idle → Planned → Fetching → Merged → Committed
//!                          ↘ FetchFailed
//! Idle → UpToDate (planner returned no window, commit not invoked)
//! ```
//!
//! No retries within a run. Independent datasets own distinct files, so
//! [`run_all`] may process them in parallel.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::BTreeSet;
use yieldlab_core::data::{
    merge_with, normalize, plan, Calendar, Collector, CommitStatus, DataError, FillPolicy,
    MergeOptions, SeriesStore,
};
use yieldlab_core::domain::{DatasetDescriptor, FetchWindow, Series};

/// Phase a dataset cycle ended in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Planned,
    Fetching,
    Merged,
    Committed,
    FetchFailed,
    UpToDate,
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Planned => "planned",
            CyclePhase::Fetching => "fetching",
            CyclePhase::Merged => "merged",
            CyclePhase::Committed => "committed",
            CyclePhase::FetchFailed => "fetch-failed",
            CyclePhase::UpToDate => "up-to-date",
        };
        f.write_str(s)
    }
}

/// Outcome of one dataset cycle.
#[derive(Debug)]
pub struct CycleReport {
    pub dataset: String,
    /// Final phase. `Committed`, `FetchFailed` and `UpToDate` are terminal;
    /// any other phase means the cycle stopped on `error`.
    pub phase: CyclePhase,
    pub window: Option<FetchWindow>,
    pub fetched_rows: usize,
    pub status: Option<CommitStatus>,
    pub error: Option<DataError>,
    /// Fetched columns outside the dataset's naming convention. They are
    /// still persisted but reports will not find them.
    pub nonconforming_columns: Vec<String>,
}

impl CycleReport {
    fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            phase: CyclePhase::Idle,
            window: None,
            fetched_rows: 0,
            status: None,
            error: None,
            nonconforming_columns: Vec::new(),
        }
    }

    /// True when the dataset did not reach a successful terminal phase.
    pub fn is_failure(&self) -> bool {
        self.error.is_some() || self.phase == CyclePhase::FetchFailed
    }

    /// One-line description for progress output.
    pub fn describe(&self) -> String {
        match (&self.phase, &self.status, &self.error) {
            (CyclePhase::UpToDate, _, _) => "already up to date".to_string(),
            (_, Some(CommitStatus::Written { rows, columns }), _) => {
                format!("wrote {rows} rows x {columns} columns")
            }
            (_, Some(CommitStatus::SkippedNoChange), _) => "no new data".to_string(),
            (_, Some(CommitStatus::SkippedFailure { reason }), _) => {
                format!("kept previous file ({reason})")
            }
            (phase, None, Some(err)) => format!("failed while {phase}: {err}"),
            (phase, None, None) => phase.to_string(),
        }
    }
}

/// Progress callback for multi-dataset runs.
pub trait CycleProgress: Send + Sync {
    fn on_start(&self, dataset: &str, index: usize, total: usize);

    fn on_complete(&self, report: &CycleReport, index: usize, total: usize);

    fn on_batch_complete(&self, summary: &CollectSummary);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl CycleProgress for StdoutProgress {
    fn on_start(&self, dataset: &str, index: usize, total: usize) {
        println!("[{}/{}] Collecting {dataset}...", index + 1, total);
    }

    fn on_complete(&self, report: &CycleReport, _index: usize, _total: usize) {
        let tag = if report.is_failure() { "FAIL" } else { "OK" };
        println!("  {tag}: {}: {}", report.dataset, report.describe());
        if !report.nonconforming_columns.is_empty() {
            println!(
                "  note: columns outside the naming convention: {}",
                report.nonconforming_columns.join(", ")
            );
        }
    }

    fn on_batch_complete(&self, summary: &CollectSummary) {
        println!(
            "\nCollection complete: {}/{} succeeded, {} failed",
            summary.succeeded(),
            summary.reports.len(),
            summary.failed()
        );
    }
}

/// Progress reporter that discards everything.
pub struct SilentProgress;

impl CycleProgress for SilentProgress {
    fn on_start(&self, _dataset: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _report: &CycleReport, _index: usize, _total: usize) {}
    fn on_batch_complete(&self, _summary: &CollectSummary) {}
}

/// A dataset paired with the collector that feeds it.
pub struct CycleJob {
    pub descriptor: DatasetDescriptor,
    pub collector: Box<dyn Collector>,
}

/// Summary of a multi-dataset run.
#[derive(Debug)]
pub struct CollectSummary {
    pub reference_date: NaiveDate,
    pub reports: Vec<CycleReport>,
}

impl CollectSummary {
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.reports.len() - self.failed()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Run one dataset through the full cycle.
pub fn run_cycle(
    descriptor: &DatasetDescriptor,
    collector: &dyn Collector,
    store: &SeriesStore,
    today: NaiveDate,
) -> CycleReport {
    let mut report = CycleReport::new(&descriptor.name);
    let span = tracing::info_span!("cycle", dataset = %descriptor.name);
    let _guard = span.enter();

    let existing = match store.load(descriptor) {
        Ok(existing) => existing,
        Err(e) => {
            tracing::error!(error = %e, "cannot load persisted series");
            report.error = Some(e);
            return report;
        }
    };

    let Some(window) = plan(existing.as_ref(), today, descriptor) else {
        tracing::debug!(%today, "up to date, nothing to fetch");
        report.phase = CyclePhase::UpToDate;
        return report;
    };
    tracing::debug!(%window, first_run = existing.is_none(), "planned fetch");
    report.window = Some(window);
    report.phase = CyclePhase::Planned;

    report.phase = CyclePhase::Fetching;
    let rows = match collector.collect(&window) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(collector = collector.name(), error = %e, "fetch failed");
            // The gate records the skip and leaves the file alone.
            match store.commit(descriptor, Err(e)) {
                Ok(status) => report.status = Some(status),
                Err(commit_err) => report.error = Some(commit_err),
            }
            report.phase = CyclePhase::FetchFailed;
            return report;
        }
    };
    report.fetched_rows = rows.len();
    tracing::info!(rows = rows.len(), %window, "fetched");

    let incoming = match Series::from_rows(rows) {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::error!(error = %e, "incoming rows cannot be merged");
            report.error = Some(e);
            return report;
        }
    };
    report.nonconforming_columns = descriptor
        .nonconforming_columns(incoming.columns())
        .into_iter()
        .map(String::from)
        .collect();
    if !report.nonconforming_columns.is_empty() {
        tracing::warn!(
            columns = ?report.nonconforming_columns,
            convention = descriptor.columns.pattern(),
            "fetched columns do not follow the dataset naming convention"
        );
    }

    let merged = update_series(existing.as_ref(), &incoming, descriptor);
    report.phase = CyclePhase::Merged;

    match store.commit(descriptor, Ok(merged)) {
        Ok(status) => {
            report.status = Some(status);
            report.phase = CyclePhase::Committed;
        }
        Err(e) => {
            tracing::error!(error = %e, "commit failed, previous file kept");
            report.error = Some(e);
        }
    }
    report
}

/// Normalize the new window, merge it into history, then normalize again so
/// gaps straddling the old/new boundary are bridged.
pub fn update_series(
    existing: Option<&Series>,
    incoming: &Series,
    descriptor: &DatasetDescriptor,
) -> Series {
    let observed: BTreeSet<NaiveDate> = existing
        .into_iter()
        .flat_map(|s| s.dates())
        .chain(incoming.dates())
        .collect();
    let calendar = Calendar::for_kind(descriptor.calendar, observed);
    let policy = FillPolicy::new(descriptor.fill_horizon);
    let opts = MergeOptions {
        revision_window_days: descriptor.revision_window_days,
    };

    let incoming = normalize(incoming, &calendar, policy);
    let merged = merge_with(existing, &incoming, opts);
    normalize(&merged, &calendar, policy)
}

/// Only plan: load each dataset and report the window a run would fetch.
pub fn plan_all(
    descriptors: &[DatasetDescriptor],
    store: &SeriesStore,
    today: NaiveDate,
) -> Vec<(String, Result<Option<FetchWindow>, DataError>)> {
    descriptors
        .iter()
        .map(|descriptor| {
            let window = store
                .load(descriptor)
                .map(|existing| plan(existing.as_ref(), today, descriptor));
            (descriptor.name.clone(), window)
        })
        .collect()
}

/// Run every job, in parallel when `parallel` is set. Reports keep job order.
pub fn run_all(
    jobs: &[CycleJob],
    store: &SeriesStore,
    today: NaiveDate,
    parallel: bool,
    progress: &dyn CycleProgress,
) -> CollectSummary {
    let total = jobs.len();
    let run_one = |(i, job): (usize, &CycleJob)| {
        progress.on_start(&job.descriptor.name, i, total);
        let report = run_cycle(&job.descriptor, job.collector.as_ref(), store, today);
        progress.on_complete(&report, i, total);
        report
    };

    let reports: Vec<CycleReport> = if parallel {
        jobs.par_iter().enumerate().map(run_one).collect()
    } else {
        jobs.iter().enumerate().map(run_one).collect()
    };

    let summary = CollectSummary {
        reference_date: today,
        reports,
    };
    tracing::info!(
        datasets = total,
        failed = summary.failed(),
        %today,
        "collection run finished"
    );
    progress.on_batch_complete(&summary);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use yieldlab_core::domain::{Lookback, ObservationRow};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// Returns canned rows (filtered to the window) and counts calls.
    struct FixedCollector {
        rows: Vec<ObservationRow>,
        calls: AtomicUsize,
    }

    impl FixedCollector {
        fn new(rows: Vec<ObservationRow>) -> Self {
            Self {
                rows,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Collector for FixedCollector {
        fn name(&self) -> &str {
            "fixed"
        }

        fn collect(&self, window: &FetchWindow) -> Result<Vec<ObservationRow>, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .iter()
                .filter(|r| window.contains(r.date))
                .cloned()
                .collect())
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn name(&self) -> &str {
            "failing"
        }

        fn collect(&self, _window: &FetchWindow) -> Result<Vec<ObservationRow>, DataError> {
            Err(DataError::fetch("failing", "bot challenge"))
        }
    }

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor::new("global_treasury", "global_treasury.csv", Lookback::Days(10))
    }

    fn row(date: &str, v: Option<f64>) -> ObservationRow {
        ObservationRow::new(d(date)).with("US_10Y", v)
    }

    #[test]
    fn first_run_writes_then_second_run_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        let collector = FixedCollector::new(vec![row("2024-01-12", Some(3.9)), row("2024-01-15", Some(4.0))]);

        let report = run_cycle(&descriptor(), &collector, &store, d("2024-01-15"));
        assert_eq!(report.phase, CyclePhase::Committed);
        assert_eq!(report.window.unwrap().start(), d("2024-01-05"));
        assert_eq!(report.status, Some(CommitStatus::Written { rows: 4, columns: 1 }));

        let again = run_cycle(&descriptor(), &collector, &store, d("2024-01-15"));
        assert_eq!(again.phase, CyclePhase::UpToDate);
        assert_eq!(collector.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fetch_failure_goes_through_gate() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        let report = run_cycle(&descriptor(), &FailingCollector, &store, d("2024-01-15"));

        assert_eq!(report.phase, CyclePhase::FetchFailed);
        assert!(report.is_failure());
        assert!(matches!(report.status, Some(CommitStatus::SkippedFailure { .. })));
        assert!(!store.path(&descriptor()).exists());
    }

    #[test]
    fn corrupt_history_stops_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        std::fs::write(store.path(&descriptor()), "garbage\n2024-13-01\n").unwrap();
        let collector = FixedCollector::new(vec![row("2024-01-15", Some(4.0))]);

        let report = run_cycle(&descriptor(), &collector, &store, d("2024-01-15"));
        assert_eq!(report.phase, CyclePhase::Idle);
        assert!(matches!(report.error, Some(DataError::CorruptFile { .. })));
        assert_eq!(collector.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn update_bridges_gap_at_boundary() {
        let existing = Series::from_rows(vec![row("2024-01-12", Some(3.9))]).unwrap();
        let incoming = Series::from_rows(vec![row("2024-01-15", Some(4.0))]).unwrap();

        let updated = update_series(Some(&existing), &incoming, &descriptor());
        assert_eq!(updated.len(), 4);
        assert_eq!(updated.get(d("2024-01-13"), "US_10Y"), Some(3.9));
        assert_eq!(updated.get(d("2024-01-14"), "US_10Y"), Some(3.9));
    }

    #[test]
    fn unexpected_columns_are_reported_but_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        let collector = FixedCollector::new(vec![ObservationRow::new(d("2024-01-15"))
            .with("US_10Y", Some(4.0))
            .with("Price", Some(4.0))]);

        let report = run_cycle(&descriptor(), &collector, &store, d("2024-01-15"));
        assert_eq!(report.phase, CyclePhase::Committed);
        assert!(!report.is_failure());
        assert_eq!(report.nonconforming_columns, vec!["Price".to_string()]);
        let persisted = store.load(&descriptor()).unwrap().unwrap();
        assert_eq!(persisted.columns(), &["US_10Y", "Price"]);
    }

    #[test]
    fn persistence_failure_fails_cycle_and_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeriesStore::new(dir.path());
        let history = Series::from_rows(vec![row("2024-01-12", Some(3.9))]).unwrap();
        store.commit(&descriptor(), Ok(history)).unwrap();
        let before = std::fs::read(store.path(&descriptor())).unwrap();

        let mut tmp = store.path(&descriptor()).into_os_string();
        tmp.push(".tmp");
        std::fs::create_dir(&tmp).unwrap();

        let collector = FixedCollector::new(vec![row("2024-01-15", Some(4.0))]);
        let report = run_cycle(&descriptor(), &collector, &store, d("2024-01-15"));
        assert_eq!(report.phase, CyclePhase::Merged);
        assert!(matches!(report.error, Some(DataError::Persistence { .. })));
        assert!(report.status.is_none());
        assert!(report.is_failure());
        assert_eq!(std::fs::read(store.path(&descriptor())).unwrap(), before);
    }

    #[test]
    fn describe_covers_outcomes() {
        let mut report = CycleReport::new("x");
        report.phase = CyclePhase::UpToDate;
        assert_eq!(report.describe(), "already up to date");

        report.phase = CyclePhase::Committed;
        report.status = Some(CommitStatus::SkippedNoChange);
        assert_eq!(report.describe(), "no new data");
    }
}

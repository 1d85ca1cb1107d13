//! Collection configuration, loaded from `yieldlab.toml`.
//!
//! ```toml
//! [store]
//! data_dir = "data"
//!
//! [[dataset]]
//! name = "global_treasury"
//! file = "global_treasury.csv"
//! default_window = { years = 5 }
//!
//! [dataset.collector]
//! kind = "command"
//! program = "python"
//! args = ["scrapers/investing.py", "--start", "{start}", "--end", "{end}"]
//! env = { SSL_CERT_FILE = "/etc/ssl/certs/ca-certificates.crt" }
//! ```
//!
//! Relative paths are resolved against the directory of the config file.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use yieldlab_core::data::{Collector, CommandCollector, CsvFileCollector, RawTableOptions};
use yieldlab_core::domain::{
    CalendarKind, ColumnConvention, DatasetDescriptor, Lookback, DEFAULT_FILL_HORIZON,
};

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldlabConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default, rename = "dataset")]
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Collect through `local today - reference_lag_days`.
    pub reference_lag_days: u32,
    /// Run independent datasets on the rayon pool.
    pub parallel: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            reference_lag_days: 1,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Datasets joined for reports. Empty means all configured datasets.
    pub datasets: Vec<String>,
    /// Row order of the change summary.
    pub countries: Vec<String>,
    pub summary_tenors: Vec<u32>,
    pub curve_tenors: Vec<u32>,
    pub columns: ColumnConvention,
    /// Forward-fill horizon applied after joining datasets.
    pub fill_horizon: u32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            datasets: Vec::new(),
            countries: ["US", "KR", "DE", "GB", "JP", "CN"]
                .into_iter()
                .map(String::from)
                .collect(),
            summary_tenors: vec![2, 10],
            curve_tenors: vec![2, 3, 5, 10, 20, 30],
            columns: ColumnConvention::default(),
            fill_horizon: DEFAULT_FILL_HORIZON,
        }
    }
}

/// One dataset: descriptor fields plus the collector that feeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub file: String,
    pub default_window: Lookback,
    #[serde(default)]
    pub columns: ColumnConvention,
    #[serde(default)]
    pub calendar: CalendarKind,
    #[serde(default = "default_fill_horizon")]
    pub fill_horizon: u32,
    #[serde(default)]
    pub revision_window_days: Option<u32>,
    pub collector: CollectorConfig,
}

fn default_fill_horizon() -> u32 {
    DEFAULT_FILL_HORIZON
}

/// Which collector feeds a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectorConfig {
    /// Import a delimited file already on disk.
    CsvFile {
        path: PathBuf,
        #[serde(default)]
        table: RawTableOptions,
    },
    /// Run an external program and parse CSV from its stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default)]
        current_dir: Option<PathBuf>,
        #[serde(default)]
        table: RawTableOptions,
    },
}

impl DatasetConfig {
    pub fn descriptor(&self) -> DatasetDescriptor {
        DatasetDescriptor {
            name: self.name.clone(),
            file: self.file.clone(),
            default_window: self.default_window,
            columns: self.columns.clone(),
            calendar: self.calendar,
            fill_horizon: self.fill_horizon,
            revision_window_days: self.revision_window_days,
        }
    }

    /// Instantiate the configured collector.
    pub fn build_collector(&self) -> Box<dyn Collector> {
        match &self.collector {
            CollectorConfig::CsvFile { path, table } => {
                Box::new(CsvFileCollector::new(&self.name, path, table.clone()))
            }
            CollectorConfig::Command {
                program,
                args,
                env,
                current_dir,
                table,
            } => {
                let mut collector =
                    CommandCollector::new(&self.name, program, table.clone()).args(args.iter().cloned());
                for (key, value) in env {
                    collector = collector.env(key, value);
                }
                if let Some(dir) = current_dir {
                    collector = collector.current_dir(dir);
                }
                Box::new(collector)
            }
        }
    }
}

impl YieldlabConfig {
    /// Load, resolve relative paths and validate.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate a TOML string. Paths are left as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::Invalid("no [[dataset]] entries".into()));
        }

        let mut names = HashSet::new();
        let mut files = HashSet::new();
        for ds in &self.datasets {
            if ds.name.trim().is_empty() {
                return Err(ConfigError::Invalid("dataset with empty name".into()));
            }
            if ds.file.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("dataset '{}' has no file", ds.name)));
            }
            if !names.insert(ds.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate dataset name '{}'", ds.name)));
            }
            if !files.insert(ds.file.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "file '{}' is used by more than one dataset",
                    ds.file
                )));
            }
            if ds.default_window.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "dataset '{}' has a zero-length default window",
                    ds.name
                )));
            }
            if let CollectorConfig::Command { program, .. } = &ds.collector {
                if program.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "dataset '{}' has an empty collector program",
                        ds.name
                    )));
                }
            }
        }

        for name in &self.report.datasets {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "report references unknown dataset '{name}'"
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.store.data_dir);
        for ds in &mut self.datasets {
            match &mut ds.collector {
                CollectorConfig::CsvFile { path, .. } => resolve(path),
                CollectorConfig::Command { current_dir, .. } => {
                    if let Some(dir) = current_dir {
                        resolve(dir);
                    }
                }
            }
        }
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|ds| ds.name == name)
    }

    pub fn descriptors(&self) -> Vec<DatasetDescriptor> {
        self.datasets.iter().map(DatasetConfig::descriptor).collect()
    }

    /// Datasets feeding the reports, in configuration order.
    pub fn report_descriptors(&self) -> Vec<DatasetDescriptor> {
        self.datasets
            .iter()
            .filter(|ds| self.report.datasets.is_empty() || self.report.datasets.contains(&ds.name))
            .map(DatasetConfig::descriptor)
            .collect()
    }

    /// Reference date for a run started on `local_today`.
    pub fn reference_date(&self, local_today: NaiveDate) -> NaiveDate {
        local_today
            .checked_sub_days(Days::new(u64::from(self.run.reference_lag_days)))
            .unwrap_or(NaiveDate::MIN)
    }
}

//! Yieldlab Runner: collection cycles, configuration, and yield reports.
//!
//! This crate builds on `yieldlab-core` to provide:
//! - TOML configuration of the store and datasets
//! - The per-dataset collection cycle (plan, fetch, normalize, merge, commit)
//! - Parallel multi-dataset runs with progress reporting
//! - Read-only reports: joined datasets, change summary, yield curves

pub mod config;
pub mod cycle;
pub mod reporting;

pub use config::{CollectorConfig, ConfigError, DatasetConfig, YieldlabConfig};
pub use cycle::{
    plan_all, run_all, run_cycle, update_series, CollectSummary, CycleJob, CyclePhase,
    CycleProgress, CycleReport, SilentProgress, StdoutProgress,
};

/// Build one job per configured dataset.
pub fn jobs_from_config(config: &YieldlabConfig) -> Vec<CycleJob> {
    config
        .datasets
        .iter()
        .map(|ds| CycleJob {
            descriptor: ds.descriptor(),
            collector: ds.build_collector(),
        })
        .collect()
}

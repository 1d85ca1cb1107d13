//! Yieldlab Core: series model, calendar normalization, merge, fetch planning, persistence.
//!
//! This crate contains the incremental update logic:
//! - Domain types (series, observation rows, fetch windows, dataset descriptors)
//! - Calendar normalizer with bounded forward fill
//! - Series merger (dedup by date, newest value wins)
//! - Incremental fetch planner
//! - Persistence gate (atomic CSV writes, failure never touches history)
//! - Collector trait with file and external-command adapters

pub mod data;
pub mod domain;

pub use data::{calendar, collector, merge, planner, store};

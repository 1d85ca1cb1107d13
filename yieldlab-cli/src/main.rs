//! Yieldlab CLI: collection and report commands.
//!
//! Commands:
//! - `collect`: run the collection cycle for every configured dataset
//! - `plan`: show the window each dataset would fetch, without fetching
//! - `status`: report persisted files, date ranges and sizes
//! - `summary`: 2Y/10Y level and 1D/1W/MTD/YTD/YoY changes in bp
//! - `curve`: yield curve of a country with 1W and 1M changes

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use yieldlab_core::data::SeriesStore;
use yieldlab_core::domain::Series;
use yieldlab_runner::reporting::{
    available_countries, change_summary, curve_at, load_joined, write_curve_csv,
    write_summary_csv, ChangeSummary, YieldCurve,
};
use yieldlab_runner::{jobs_from_config, plan_all, run_all, StdoutProgress, YieldlabConfig};

#[derive(Parser)]
#[command(
    name = "yieldlab",
    about = "Yieldlab CLI: incremental collection of government bond yields"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true, default_value = "yieldlab.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new data for every dataset and persist it.
    Collect {
        /// Reference date (YYYY-MM-DD). Defaults to today minus the configured lag.
        #[arg(long)]
        as_of: Option<String>,

        /// Only collect these datasets.
        #[arg(long = "dataset")]
        datasets: Vec<String>,

        /// Process datasets one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Show the window each dataset would fetch.
    Plan {
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Report persisted files, date ranges and sizes.
    Status,
    /// Print the rate change summary table.
    Summary {
        /// Summary date (YYYY-MM-DD). Defaults to the last persisted date.
        #[arg(long)]
        as_of: Option<String>,

        /// Also write the table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Print the yield curve of a country.
    Curve {
        /// Country code (e.g. KR). Defaults to every country with data.
        #[arg(long)]
        country: Option<String>,

        #[arg(long)]
        as_of: Option<String>,

        /// Also write the curve as CSV (requires --country).
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Collect {
            as_of,
            datasets,
            sequential,
        } => run_collect(&cli.config, as_of, &datasets, sequential),
        Commands::Plan { as_of } => run_plan(&cli.config, as_of),
        Commands::Status => run_status(&cli.config),
        Commands::Summary { as_of, csv } => run_summary(&cli.config, as_of, csv),
        Commands::Curve {
            country,
            as_of,
            csv,
        } => run_curve(&cli.config, country, as_of, csv),
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(2);
        }
    }
}

/// Logs go to stderr so tables on stdout stay clean. `RUST_LOG` overrides.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<YieldlabConfig> {
    YieldlabConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn reference_date(config: &YieldlabConfig, as_of: Option<String>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => parse_date(&s),
        None => Ok(config.reference_date(chrono::Local::now().date_naive())),
    }
}

/// Returns `Ok(false)` when any dataset failed.
fn run_collect(
    config_path: &Path,
    as_of: Option<String>,
    only: &[String],
    sequential: bool,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let today = reference_date(&config, as_of)?;

    for name in only {
        if config.dataset(name).is_none() {
            bail!("unknown dataset '{name}'");
        }
    }

    let jobs: Vec<_> = jobs_from_config(&config)
        .into_iter()
        .filter(|job| only.is_empty() || only.contains(&job.descriptor.name))
        .collect();

    let store = SeriesStore::new(&config.store.data_dir);
    println!("Reference date: {today}");
    let summary = run_all(
        &jobs,
        &store,
        today,
        config.run.parallel && !sequential,
        &StdoutProgress,
    );

    Ok(summary.all_succeeded())
}

fn run_plan(config_path: &Path, as_of: Option<String>) -> Result<bool> {
    let config = load_config(config_path)?;
    let today = reference_date(&config, as_of)?;
    let store = SeriesStore::new(&config.store.data_dir);

    println!("Reference date: {today}");
    println!();
    println!("{:<20} {:<28} {:>6}", "Dataset", "Window", "Days");
    println!("{}", "-".repeat(56));

    let mut ok = true;
    for (name, plan) in plan_all(&config.descriptors(), &store, today) {
        match plan {
            Ok(Some(window)) => {
                println!("{:<20} {:<28} {:>6}", name, window.to_string(), window.days())
            }
            Ok(None) => println!("{:<20} {:<28} {:>6}", name, "(up to date)", 0),
            Err(e) => {
                ok = false;
                println!("{:<20} ERROR: {e}", name);
            }
        }
    }
    Ok(ok)
}

fn run_status(config_path: &Path) -> Result<bool> {
    let config = load_config(config_path)?;
    let store = SeriesStore::new(&config.store.data_dir);

    println!("Store: {}", store.data_dir().display());
    println!();
    println!(
        "{:<20} {:<27} {:>8} {:>10}",
        "Dataset", "Date Range", "Rows", "Size"
    );
    println!("{}", "-".repeat(68));

    let mut any_stale = false;
    for status in store.status(&config.descriptors()) {
        if !status.persisted {
            println!("{:<20} {:<27} {:>8} {:>10}", status.dataset, "(not collected)", "-", "-");
            continue;
        }
        let range = match (status.first_date, status.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "(unreadable)".to_string(),
        };
        let range = if status.meta_stale {
            format!("{range} *")
        } else {
            range
        };
        let rows = status
            .row_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".into());
        let size = status.size_bytes.map(format_size).unwrap_or_default();
        println!("{:<20} {:<27} {:>8} {:>10}", status.dataset, range, rows, size);
        any_stale |= status.meta_stale;
    }
    if any_stale {
        println!("\n* metadata sidecar is stale; range read from the data file");
    }
    Ok(true)
}

fn load_report_series(config: &YieldlabConfig) -> Result<Series> {
    let store = SeriesStore::new(&config.store.data_dir);
    let series = load_joined(&store, &config.report_descriptors(), config.report.fill_horizon)?;
    if series.is_empty() {
        bail!("no persisted data; run `yieldlab collect` first");
    }
    Ok(series)
}

fn report_date(series: &Series, as_of: Option<String>) -> Result<NaiveDate> {
    match as_of {
        Some(s) => parse_date(&s),
        None => series.last_date().context("no persisted data"),
    }
}

fn run_summary(config_path: &Path, as_of: Option<String>, csv: Option<PathBuf>) -> Result<bool> {
    let config = load_config(config_path)?;
    let series = load_report_series(&config)?;
    let as_of = report_date(&series, as_of)?;

    let summary = change_summary(
        &series,
        as_of,
        &config.report.countries,
        &config.report.summary_tenors,
        &config.report.columns,
    );
    print_summary(&summary);

    if let Some(path) = csv {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        write_summary_csv(file, &summary)?;
        println!("\nSaved to: {}", path.display());
    }
    Ok(true)
}

fn run_curve(
    config_path: &Path,
    country: Option<String>,
    as_of: Option<String>,
    csv: Option<PathBuf>,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let series = load_report_series(&config)?;
    let as_of = report_date(&series, as_of)?;

    let countries = match country {
        Some(c) => vec![c],
        None => {
            if csv.is_some() {
                bail!("--csv requires --country");
            }
            available_countries(&series, &config.report.columns)
        }
    };

    for country in &countries {
        let curve = curve_at(
            &series,
            country,
            as_of,
            &config.report.curve_tenors,
            &config.report.columns,
        );
        print_curve(&curve);
        if let Some(path) = &csv {
            let file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            write_curve_csv(file, &curve)?;
            println!("\nSaved to: {}", path.display());
        }
    }
    Ok(true)
}

// ── Output helpers ───────────────────────────────────────────────────

fn fmt_level(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.3}")).unwrap_or_else(|| "-".into())
}

fn fmt_bp(v: Option<f64>) -> String {
    v.map(|v| format!("{v:+.1}")).unwrap_or_else(|| "-".into())
}

fn print_summary(summary: &ChangeSummary) {
    println!();
    println!("=== Rate Changes as of {} (bp) ===", summary.as_of);

    let Some(first) = summary.rows.first() else {
        return;
    };
    let mut header = format!("{:<8}", "Country");
    for tenor in &first.tenors {
        header.push_str(&format!(" | {:>7}", format!("{}Y %", tenor.tenor)));
        for period in summary.periods() {
            header.push_str(&format!(" {:>7}", period.label()));
        }
    }
    println!("{header}");
    println!("{}", "-".repeat(header.chars().count()));

    for row in &summary.rows {
        let mut line = format!("{:<8}", row.country);
        for tenor in &row.tenors {
            line.push_str(&format!(" | {:>7}", fmt_level(tenor.level)));
            for change in &tenor.changes_bp {
                line.push_str(&format!(" {:>7}", fmt_bp(*change)));
            }
        }
        println!("{line}");
    }
}

fn print_curve(curve: &YieldCurve) {
    println!();
    println!("=== {} Yield Curve as of {} ===", curve.country, curve.as_of);
    if curve.is_empty() {
        println!("(no data)");
        return;
    }
    println!("{:<6} {:>8} {:>9} {:>9}", "Tenor", "Level", "1W (bp)", "1M (bp)");
    println!("{}", "-".repeat(35));
    for point in &curve.points {
        println!(
            "{:<6} {:>8} {:>9} {:>9}",
            format!("{}Y", point.tenor),
            fmt_level(point.level),
            fmt_bp(point.change_1w_bp()),
            fmt_bp(point.change_1m_bp()),
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_collect_flags() {
        let cli = Cli::try_parse_from([
            "yieldlab",
            "collect",
            "--as-of",
            "2024-01-15",
            "--dataset",
            "global_treasury",
            "--sequential",
            "--config",
            "conf/yieldlab.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("conf/yieldlab.toml"));
        match cli.command {
            Commands::Collect {
                as_of,
                datasets,
                sequential,
            } => {
                assert_eq!(as_of.as_deref(), Some("2024-01-15"));
                assert_eq!(datasets, vec!["global_treasury".to_string()]);
                assert!(sequential);
            }
            _ => panic!("expected collect"),
        }
    }

    #[test]
    fn format_helpers() {
        assert_eq!(fmt_bp(Some(2.04)), "+2.0");
        assert_eq!(fmt_bp(None), "-");
        assert_eq!(fmt_level(Some(3.3)), "3.300");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}

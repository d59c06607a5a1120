//! Report presentation
//!
//! - [`text`]: console report
//! - [`csv`]: per-second time series file
//! - [`json`]: machine-readable summary
//!
//! [`spawn_report`] ties these to the result stream: it drains the stream on a
//! dedicated thread and presents the report once the stream closes.

pub mod csv;
pub mod json;
pub mod text;

use crate::config::ReportConfig;
use crate::stats::aggregator::StatisticsAggregator;
use crate::stats::Report;
use crate::worker::OutcomeReceiver;
use crate::Result;
use anyhow::Context;
use std::thread::JoinHandle;
use tracing::info;

/// Aggregate `receiver` on a background thread
///
/// The returned handle completes after the stream has closed, the report has
/// been printed, and the configured files have been written.
pub fn spawn_report(receiver: OutcomeReceiver, config: ReportConfig) -> Result<JoinHandle<Result<Report>>> {
    std::thread::Builder::new()
        .name("report".to_string())
        .spawn(move || -> Result<Report> {
            let report = StatisticsAggregator::aggregate(receiver);
            present(&report, &config)?;
            Ok(report)
        })
        .context("Failed to spawn report thread")
}

/// Print `report` and write its output files
pub fn present(report: &Report, config: &ReportConfig) -> Result<()> {
    text::print_report(report);

    csv::write_time_series(&config.time_series_path, report.time_series())?;
    info!(
        path = %config.time_series_path.display(),
        seconds = report.time_series().points().len(),
        "Time series written"
    );

    if let Some(path) = &config.summary_json {
        json::write_summary(path, report)?;
        info!(path = %path.display(), "Summary written");
    }

    Ok(())
}

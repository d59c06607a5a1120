//! JSON output formatting
//!
//! Machine-readable run summary: headline statistics, percentiles, 10ms
//! distribution, histogram, and error counts. The per-second series goes to
//! CSV instead.

use crate::stats::Report;
use crate::Result;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_secs_f64(secs: f64) -> Self {
        Self::from_duration(Duration::from_nanos((secs.max(0.0) * 1e9).round() as u64))
    }

    pub fn from_duration(d: Duration) -> Self {
        Self {
            micros: d.as_micros() as u64,
            human: crate::util::time::format_duration(d),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub requests: usize,
    pub fastest: JsonDuration,
    pub slowest: JsonDuration,
    pub average: JsonDuration,
    pub stddev: JsonDuration,
    pub requests_per_sec: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonPercentile {
    pub percentile: u32,
    pub latency: JsonDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonBucket {
    pub lower_ms: u64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonHistogramBucket {
    pub mark_secs: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonError {
    pub error: String,
    pub count: u64,
}

/// Top-level document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub tool: String,
    pub version: String,
    pub generated_at: String,
    pub elapsed: JsonDuration,
    pub successes: usize,
    pub failures: u64,
    /// Absent when nothing succeeded
    pub summary: Option<JsonSummary>,
    pub percentiles: Vec<JsonPercentile>,
    pub distribution_10ms: Vec<JsonBucket>,
    pub histogram: Vec<JsonHistogramBucket>,
    pub errors: Vec<JsonError>,
}

impl JsonReport {
    pub fn from_report(report: &Report) -> Self {
        let summary = report.summary().map(|s| JsonSummary {
            requests: s.count,
            fastest: JsonDuration::from_secs_f64(s.fastest),
            slowest: JsonDuration::from_secs_f64(s.slowest),
            average: JsonDuration::from_secs_f64(s.average),
            stddev: JsonDuration::from_secs_f64(s.stddev),
            requests_per_sec: s.requests_per_sec,
        });

        Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            elapsed: JsonDuration::from_duration(report.total()),
            successes: report.success_count(),
            failures: report.error_count(),
            summary,
            percentiles: report
                .percentiles()
                .into_iter()
                .map(|p| JsonPercentile {
                    percentile: p.target,
                    latency: JsonDuration::from_secs_f64(p.latency),
                })
                .collect(),
            distribution_10ms: report
                .distribution()
                .into_iter()
                .map(|b| JsonBucket {
                    lower_ms: b.lower_ms,
                    count: b.count,
                })
                .collect(),
            histogram: report
                .histogram()
                .map(|h| {
                    h.buckets
                        .iter()
                        .map(|b| JsonHistogramBucket {
                            mark_secs: b.mark,
                            count: b.count,
                        })
                        .collect()
                })
                .unwrap_or_default(),
            errors: report
                .errors_by_frequency()
                .into_iter()
                .map(|(error, count)| JsonError {
                    error: error.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

/// Write the JSON summary of `report` to `path`
pub fn write_summary(path: &Path, report: &Report) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create summary file {}", path.display()))?;
    serde_json::to_writer_pretty(file, &JsonReport::from_report(report))
        .with_context(|| format!("Failed to write summary file {}", path.display()))?;
    Ok(())
}

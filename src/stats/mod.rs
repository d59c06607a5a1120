//! Statistics collection
//!
//! Turns the stream of per-request outcomes into a finalized [`Report`].
//!
//! - **Outcome**: one result of a single benchmark request
//! - **Aggregator**: sole consumer of the result stream, see [`aggregator`]
//! - **Time series**: per-second throughput and latency, see [`time_series`]
//! - **Report**: summary, percentiles, 10ms distribution, equal-width
//!   histogram and error frequencies, computed once after the stream closes
//!
//! # Example
//!
//! ```
//! use fleetbench::stats::{aggregator::StatisticsAggregator, Outcome};
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! let mut aggregator = StatisticsAggregator::new();
//! aggregator.record(Outcome::Success { latency: Duration::from_millis(12), observed_at: Utc::now() });
//! aggregator.record(Outcome::Failure { error: "timeout".to_string() });
//!
//! let report = aggregator.finalize();
//! assert_eq!(report.success_count(), 1);
//! assert_eq!(report.error_count(), 1);
//! ```

pub mod aggregator;
pub mod time_series;

use crate::util::time::calculate_rate;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use time_series::TimeSeries;

/// Percentiles reported by the scan-and-advance rule
pub const PERCENTILE_TARGETS: [u32; 7] = [10, 25, 50, 75, 90, 95, 99];

/// Equal-width histogram bucket count (plus one closing boundary)
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Width in characters of the longest histogram bar
pub const BAR_WIDTH: usize = 40;

/// Width of one distribution bucket in milliseconds
pub const DISTRIBUTION_STEP_MS: u64 = 10;

/// Result of one benchmark request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        latency: Duration,
        observed_at: DateTime<Utc>,
    },
    Failure {
        error: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Headline statistics over successful requests
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Wall-clock span of the aggregation
    pub total: Duration,
    pub count: usize,
    /// Seconds
    pub fastest: f64,
    pub slowest: f64,
    pub average: f64,
    /// Population standard deviation
    pub stddev: f64,
    pub requests_per_sec: f64,
}

/// Latency at one target percentile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentile {
    pub target: u32,
    /// Seconds
    pub latency: f64,
}

/// Count of latencies in `[lower_ms, lower_ms + 10)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributionBucket {
    pub lower_ms: u64,
    pub count: usize,
}

/// One equal-width histogram boundary and the latencies assigned to it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBucket {
    /// Seconds
    pub mark: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub buckets: Vec<HistogramBucket>,
    pub max_count: usize,
}

impl Histogram {
    /// Bar length for `count`, scaled so the fullest bucket gets [`BAR_WIDTH`]
    pub fn bar_len(&self, count: usize) -> usize {
        if self.max_count > 0 {
            count * BAR_WIDTH / self.max_count
        } else {
            0
        }
    }
}

/// Finalized statistics of one benchmark run
#[derive(Debug, Clone)]
pub struct Report {
    /// Successful latencies in seconds, ascending
    latencies: Vec<f64>,
    sum: f64,
    total: Duration,
    errors: HashMap<String, u64>,
    time_series: TimeSeries,
    summary: Option<Summary>,
}

impl Report {
    /// Build a report from drained aggregation state
    ///
    /// `sum` is the running total of `latencies`; `total` the wall-clock
    /// aggregation span.
    pub fn new(
        mut latencies: Vec<f64>,
        sum: f64,
        errors: HashMap<String, u64>,
        time_series: TimeSeries,
        total: Duration,
    ) -> Self {
        latencies.sort_by(|a, b| a.total_cmp(b));
        let summary = summarize(&latencies, sum, total);

        Self {
            latencies,
            sum,
            total,
            errors,
            time_series,
            summary,
        }
    }

    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    pub fn success_count(&self) -> usize {
        self.latencies.len()
    }

    pub fn error_count(&self) -> u64 {
        self.errors.values().sum()
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    /// `None` when no request succeeded
    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn errors(&self) -> &HashMap<String, u64> {
        &self.errors
    }

    /// Error texts by descending count, ties alphabetical
    pub fn errors_by_frequency(&self) -> Vec<(&str, u64)> {
        let mut errors: Vec<(&str, u64)> = self.errors.iter().map(|(e, n)| (e.as_str(), *n)).collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        errors
    }

    pub fn time_series(&self) -> &TimeSeries {
        &self.time_series
    }

    pub fn percentiles(&self) -> Vec<Percentile> {
        scan_percentiles(&self.latencies)
    }

    pub fn distribution(&self) -> Vec<DistributionBucket> {
        distribution_10ms(&self.latencies)
    }

    /// `None` when no request succeeded
    pub fn histogram(&self) -> Option<Histogram> {
        equal_width_histogram(&self.latencies)
    }
}

fn summarize(sorted: &[f64], sum: f64, total: Duration) -> Option<Summary> {
    let (&fastest, &slowest) = (sorted.first()?, sorted.last()?);
    let count = sorted.len();
    let average = sum / count as f64;

    // Sorted input: equal ends means every sample is equal
    let stddev = if fastest == slowest {
        0.0
    } else {
        let variance = sorted
            .iter()
            .map(|lat| {
                let dev = lat - average;
                dev * dev
            })
            .sum::<f64>()
            / count as f64;
        variance.sqrt()
    };

    let requests_per_sec = calculate_rate(count as u64, total);

    Some(Summary {
        total,
        count,
        fastest,
        slowest,
        average,
        stddev,
        requests_per_sec,
    })
}

/// Scan-and-advance percentiles over ascending latencies
///
/// At index `i` of `n`, `reached = i * 100 / n`. When `reached` meets the next
/// unmet target, that index's latency is recorded for it and the scan moves to
/// the following target. At most one target is satisfied per index, values
/// are never interpolated, and unreached targets are left out.
pub fn scan_percentiles(sorted: &[f64]) -> Vec<Percentile> {
    let n = sorted.len();
    let mut found = Vec::with_capacity(PERCENTILE_TARGETS.len());
    let mut next = 0;

    for (i, &latency) in sorted.iter().enumerate() {
        if next >= PERCENTILE_TARGETS.len() {
            break;
        }
        let reached = i * 100 / n;
        if reached >= PERCENTILE_TARGETS[next] as usize {
            found.push(Percentile {
                target: PERCENTILE_TARGETS[next],
                latency,
            });
            next += 1;
        }
    }

    found
}

/// Dense 10ms distribution from the lowest to the highest occupied bucket
pub fn distribution_10ms(latencies: &[f64]) -> Vec<DistributionBucket> {
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for &lat in latencies {
        // 125.11ms lands in the 120ms bucket
        let ms = lat * 1000.0;
        let lower = (ms / DISTRIBUTION_STEP_MS as f64).floor() as u64 * DISTRIBUTION_STEP_MS;
        *counts.entry(lower).or_insert(0) += 1;
    }

    let (Some(&min), Some(&max)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };

    (min..=max)
        .step_by(DISTRIBUTION_STEP_MS as usize)
        .map(|lower_ms| DistributionBucket {
            lower_ms,
            count: counts.get(&lower_ms).copied().unwrap_or(0),
        })
        .collect()
}

/// Equal-width histogram over `[fastest, slowest]`
///
/// Boundaries are `fastest + i * width` for `i` in `0..10` followed by
/// `slowest`. One merge-style pass assigns each latency to the first boundary
/// it does not exceed; the boundary cursor only moves forward.
pub fn equal_width_histogram(sorted: &[f64]) -> Option<Histogram> {
    let (&fastest, &slowest) = (sorted.first()?, sorted.last()?);
    let width = (slowest - fastest) / HISTOGRAM_BUCKETS as f64;

    let mut buckets: Vec<HistogramBucket> = (0..HISTOGRAM_BUCKETS)
        .map(|i| HistogramBucket {
            mark: fastest + width * i as f64,
            count: 0,
        })
        .collect();
    buckets.push(HistogramBucket {
        mark: slowest,
        count: 0,
    });

    let last = buckets.len() - 1;
    let mut bi = 0;
    let mut i = 0;
    while i < sorted.len() {
        if sorted[i] <= buckets[bi].mark || bi == last {
            buckets[bi].count += 1;
            i += 1;
        } else {
            bi += 1;
        }
    }

    let max_count = buckets.iter().map(|b| b.count).max().unwrap_or(0);
    Some(Histogram { buckets, max_count })
}

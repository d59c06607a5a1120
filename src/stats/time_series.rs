//! Per-second time series
//!
//! Successful outcomes are bucketed by the whole unix second they were
//! observed in. Each second keeps a request count and min/sum/max latency.
//! [`TimeSeriesSampler::finish`] emits one point per second from the first to
//! the last occupied second; empty seconds in between are filled with zeros.
//! Spans longer than [`MAX_DENSE_SPAN_SECS`] are emitted sparse, occupied
//! seconds only.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Longest span (in seconds) that is zero-filled; one week
pub const MAX_DENSE_SPAN_SECS: i64 = 7 * 24 * 3600;

/// CSV header of the time series
pub const CSV_HEADER: &str = "unix_second,min_latency_ms,avg_latency_ms,max_latency_ms,throughput";

#[derive(Debug, Clone, Copy)]
struct SecondBucket {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl SecondBucket {
    fn new(latency: Duration) -> Self {
        Self {
            count: 1,
            total: latency,
            min: latency,
            max: latency,
        }
    }

    fn add(&mut self, latency: Duration) {
        self.count += 1;
        self.total += latency;
        self.min = self.min.min(latency);
        self.max = self.max.max(latency);
    }
}

/// Accumulates successful outcomes into per-second buckets
#[derive(Debug, Default)]
pub struct TimeSeriesSampler {
    seconds: BTreeMap<i64, SecondBucket>,
}

impl TimeSeriesSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observed_at: DateTime<Utc>, latency: Duration) {
        self.seconds
            .entry(observed_at.timestamp())
            .and_modify(|bucket| bucket.add(latency))
            .or_insert_with(|| SecondBucket::new(latency));
    }

    pub fn is_empty(&self) -> bool {
        self.seconds.is_empty()
    }

    /// Series from the first to the last observed second, zero-filled unless
    /// the span exceeds [`MAX_DENSE_SPAN_SECS`]
    pub fn finish(self) -> TimeSeries {
        let (Some(&first), Some(&last)) = (self.seconds.keys().next(), self.seconds.keys().next_back()) else {
            return TimeSeries::default();
        };

        let point = |second: i64| match self.seconds.get(&second) {
            Some(bucket) => SecondPoint {
                unix_second: second,
                min_latency: bucket.min,
                avg_latency: bucket.total / bucket.count as u32,
                max_latency: bucket.max,
                throughput: bucket.count,
            },
            None => SecondPoint::empty(second),
        };

        let span = last.saturating_sub(first);
        let points = if span > MAX_DENSE_SPAN_SECS {
            warn!(
                first,
                last,
                max_span = MAX_DENSE_SPAN_SECS,
                "Time series span too long to zero-fill, emitting occupied seconds only"
            );
            self.seconds.keys().map(|&second| point(second)).collect()
        } else {
            (first..=last).map(point).collect()
        };

        TimeSeries { points }
    }
}

/// One second of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondPoint {
    pub unix_second: i64,
    pub min_latency: Duration,
    pub avg_latency: Duration,
    pub max_latency: Duration,
    /// Successful requests completed in this second
    pub throughput: u64,
}

impl SecondPoint {
    fn empty(unix_second: i64) -> Self {
        Self {
            unix_second,
            min_latency: Duration::ZERO,
            avg_latency: Duration::ZERO,
            max_latency: Duration::ZERO,
            throughput: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeries {
    points: Vec<SecondPoint>,
}

impl TimeSeries {
    pub fn points(&self) -> &[SecondPoint] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn total_throughput(&self) -> u64 {
        self.points.iter().map(|p| p.throughput).sum()
    }
}

/// CSV rendering, header included
impl fmt::Display for TimeSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", CSV_HEADER)?;
        for p in &self.points {
            writeln!(
                f,
                "{},{:.3},{:.3},{:.3},{}",
                p.unix_second,
                p.min_latency.as_secs_f64() * 1000.0,
                p.avg_latency.as_secs_f64() * 1000.0,
                p.max_latency.as_secs_f64() * 1000.0,
                p.throughput
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(second: i64, millis: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(second, millis * 1_000_000).unwrap()
    }

    #[test]
    fn test_buckets_by_second() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(1_700_000_000, 100), Duration::from_millis(10));
        sampler.add(at(1_700_000_000, 900), Duration::from_millis(30));
        sampler.add(at(1_700_000_001, 5), Duration::from_millis(4));

        let series = sampler.finish();
        let points = series.points();
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].unix_second, 1_700_000_000);
        assert_eq!(points[0].throughput, 2);
        assert_eq!(points[0].min_latency, Duration::from_millis(10));
        assert_eq!(points[0].avg_latency, Duration::from_millis(20));
        assert_eq!(points[0].max_latency, Duration::from_millis(30));

        assert_eq!(points[1].throughput, 1);
        assert_eq!(series.total_throughput(), 3);
    }

    #[test]
    fn test_gaps_are_zero_filled() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(100, 0), Duration::from_millis(1));
        sampler.add(at(103, 0), Duration::from_millis(2));

        let series = sampler.finish();
        let seconds: Vec<i64> = series.points().iter().map(|p| p.unix_second).collect();
        assert_eq!(seconds, vec![100, 101, 102, 103]);
        assert_eq!(series.points()[1], SecondPoint::empty(101));
        assert_eq!(series.points()[2].throughput, 0);
    }

    #[test]
    fn test_out_of_order_arrival() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(103, 500), Duration::from_millis(8));
        sampler.add(at(100, 0), Duration::from_millis(2));
        sampler.add(at(103, 10), Duration::from_millis(4));
        sampler.add(at(101, 999), Duration::from_millis(6));

        let series = sampler.finish();
        let seconds: Vec<i64> = series.points().iter().map(|p| p.unix_second).collect();
        assert_eq!(seconds, vec![100, 101, 102, 103]);

        let counts: Vec<u64> = series.points().iter().map(|p| p.throughput).collect();
        assert_eq!(counts, vec![1, 1, 0, 2]);

        let last = series.points()[3];
        assert_eq!(last.min_latency, Duration::from_millis(4));
        assert_eq!(last.avg_latency, Duration::from_millis(6));
        assert_eq!(last.max_latency, Duration::from_millis(8));
    }

    #[test]
    fn test_long_span_is_sparse() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(1_790_000_000, 0), Duration::from_millis(3));
        sampler.add(at(0, 0), Duration::from_millis(1));
        sampler.add(at(1_790_000_000, 200), Duration::from_millis(5));

        let series = sampler.finish();
        let seconds: Vec<i64> = series.points().iter().map(|p| p.unix_second).collect();
        assert_eq!(seconds, vec![0, 1_790_000_000]);
        assert_eq!(series.total_throughput(), 3);
    }

    #[test]
    fn test_span_at_limit_stays_dense() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(1_000, 0), Duration::from_millis(1));
        sampler.add(at(1_000 + MAX_DENSE_SPAN_SECS, 0), Duration::from_millis(1));

        let series = sampler.finish();
        assert_eq!(series.points().len() as i64, MAX_DENSE_SPAN_SECS + 1);
    }

    #[test]
    fn test_empty_sampler() {
        let sampler = TimeSeriesSampler::new();
        assert!(sampler.is_empty());
        let series = sampler.finish();
        assert!(series.is_empty());
        assert_eq!(series.to_string(), format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_csv_rendering() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(at(42, 0), Duration::from_micros(1500));
        sampler.add(at(42, 10), Duration::from_micros(2500));

        let csv = sampler.finish().to_string();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "42,1.500,2.000,2.500,2");
    }
}

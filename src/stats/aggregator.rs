//! Statistics aggregation
//!
//! The aggregator is the sole consumer of the result stream. It folds every
//! outcome into running state and, once the stream closes, produces an
//! immutable [`Report`].
//!
//! - **Successes**: latency recorded, running sum updated, time series sampled
//! - **Failures**: error text counted by exact string
//! - **Wall clock**: measured from construction to [`StatisticsAggregator::finalize`]
//!
//! # Example
//!
//! ```
//! use fleetbench::stats::aggregator::StatisticsAggregator;
//! use fleetbench::worker::result_stream;
//! use chrono::Utc;
//! use std::time::Duration;
//!
//! let (sender, receiver) = result_stream(None);
//! sender.success(Duration::from_millis(5), Utc::now());
//! sender.failure("leader changed");
//! drop(sender);
//!
//! let report = StatisticsAggregator::aggregate(receiver);
//! assert_eq!(report.success_count(), 1);
//! assert_eq!(report.error_count(), 1);
//! ```

use crate::stats::time_series::TimeSeriesSampler;
use crate::stats::{Outcome, Report};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Running aggregation state
#[derive(Debug)]
pub struct StatisticsAggregator {
    started: Instant,

    /// Successful latencies in seconds, arrival order
    latencies: Vec<f64>,
    sum: f64,

    /// Error text → occurrences
    errors: HashMap<String, u64>,

    sampler: TimeSeriesSampler,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            latencies: Vec::new(),
            sum: 0.0,
            errors: HashMap::new(),
            sampler: TimeSeriesSampler::new(),
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success { latency, observed_at } => {
                let secs = latency.as_secs_f64();
                self.latencies.push(secs);
                self.sum += secs;
                self.sampler.add(observed_at, latency);
            }
            Outcome::Failure { error } => {
                *self.errors.entry(error).or_insert(0) += 1;
            }
        }
    }

    /// Close the aggregation window and compute the report
    pub fn finalize(self) -> Report {
        let total = self.started.elapsed();
        debug!(
            successes = self.latencies.len(),
            failures = self.errors.values().sum::<u64>(),
            elapsed_ms = total.as_millis() as u64,
            "Aggregation finished"
        );

        Report::new(self.latencies, self.sum, self.errors, self.sampler.finish(), total)
    }

    /// Drain `outcomes` to exhaustion and finalize
    pub fn aggregate<I: IntoIterator<Item = Outcome>>(outcomes: I) -> Report {
        let mut aggregator = Self::new();
        for outcome in outcomes {
            aggregator.record(outcome);
        }
        aggregator.finalize()
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

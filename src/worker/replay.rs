//! Recorded outcome replay
//!
//! Feeds a JSON-lines outcome log back into a result stream so a run can be
//! re-analyzed offline. Each non-blank line is one record:
//!
//! ```text
//! {"latency_us": 12400, "observed_at": "2017-04-28T17:31:05.120Z"}
//! {"error": "etcdserver: request timed out"}
//! ```

use crate::stats::Outcome;
use crate::worker::OutcomeSender;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Duration;
use tracing::debug;

/// One line of an outcome log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutcomeRecord {
    Success {
        latency_us: u64,
        observed_at: DateTime<Utc>,
    },
    Failure {
        error: String,
    },
}

impl From<OutcomeRecord> for Outcome {
    fn from(record: OutcomeRecord) -> Self {
        match record {
            OutcomeRecord::Success {
                latency_us,
                observed_at,
            } => Outcome::Success {
                latency: Duration::from_micros(latency_us),
                observed_at,
            },
            OutcomeRecord::Failure { error } => Outcome::Failure { error },
        }
    }
}

/// Send every record in `reader` to `sender`
///
/// Consumes the sender, so the stream closes when the log is exhausted or a
/// malformed line aborts the replay. Returns the number of records sent.
pub fn replay_outcomes<R: BufRead>(reader: R, sender: OutcomeSender) -> Result<u64> {
    let mut sent = 0u64;

    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", i + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record: OutcomeRecord = serde_json::from_str(line)
            .with_context(|| format!("Invalid outcome record on line {}", i + 1))?;
        if !sender.send(record.into()) {
            debug!(sent, "Result stream closed before replay finished");
            break;
        }
        sent += 1;
    }

    Ok(sent)
}

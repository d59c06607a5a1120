//! Benchmark clients and the result stream
//!
//! Every simulated client runs on its own thread, performs request/response
//! cycles through a [`RequestDriver`], and emits exactly one [`Outcome`] per
//! attempt onto a shared multi-producer channel. The statistics aggregator is
//! the only consumer. The stream closes when the last [`OutcomeSender`] is
//! dropped, which happens exactly once after every producer has finished.

pub mod connect;
pub mod replay;

use crate::stats::Outcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Create a result stream
///
/// `capacity` bounds the queue; `None` makes it unbounded.
pub fn result_stream(capacity: Option<usize>) -> (OutcomeSender, OutcomeReceiver) {
    let (tx, rx) = match capacity {
        Some(cap) => channel::bounded(cap),
        None => channel::unbounded(),
    };
    (OutcomeSender { tx }, OutcomeReceiver { rx })
}

/// Producer handle; clone one per worker
#[derive(Debug, Clone)]
pub struct OutcomeSender {
    tx: Sender<Outcome>,
}

impl OutcomeSender {
    /// Emit an outcome; returns false once the consumer is gone
    pub fn send(&self, outcome: Outcome) -> bool {
        self.tx.send(outcome).is_ok()
    }

    pub fn success(&self, latency: Duration, observed_at: DateTime<Utc>) -> bool {
        self.send(Outcome::Success { latency, observed_at })
    }

    pub fn failure(&self, error: impl Into<String>) -> bool {
        self.send(Outcome::Failure { error: error.into() })
    }
}

/// Consumer handle; iterating drains until every sender is dropped
#[derive(Debug)]
pub struct OutcomeReceiver {
    rx: Receiver<Outcome>,
}

impl OutcomeReceiver {
    pub fn iter(&self) -> channel::Iter<'_, Outcome> {
        self.rx.iter()
    }
}

impl IntoIterator for OutcomeReceiver {
    type Item = Outcome;
    type IntoIter = channel::IntoIter<Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

/// Database client operation performed by each simulated client
///
/// [`connect::ConnectDriver`] dials the database peers; richer backends plug
/// in their own client library here.
pub trait RequestDriver: Send + Sync + 'static {
    /// Perform one request for `client_id`
    fn execute(&self, client_id: usize) -> Result<()>;
}

/// Client pool sizing
#[derive(Debug, Clone, Copy)]
pub struct ClientPool {
    /// Concurrent clients (one thread each)
    pub clients: usize,
    /// Requests per client; `None` runs until the stop flag is set
    pub requests_per_client: Option<u64>,
}

impl ClientPool {
    /// Size the pool for a fleet-wide client count
    ///
    /// A positive `total_requests` is split evenly, rounding up so the total
    /// is always reached; zero leaves the clients running until stopped.
    pub fn for_fleet(client_count: i64, total_requests: i64) -> Self {
        let clients = client_count.max(1) as usize;
        let requests_per_client =
            (total_requests > 0).then(|| (total_requests as u64).div_ceil(clients as u64));
        Self {
            clients,
            requests_per_client,
        }
    }
}

/// Run the client pool to completion
///
/// Blocks until every client thread has finished. `sender` is consumed so the
/// stream closes as soon as the last client exits; setting `stop` ends the run
/// early and the stream still closes normally.
pub fn run_clients<D: RequestDriver>(
    pool: ClientPool,
    driver: Arc<D>,
    stop: Arc<AtomicBool>,
    sender: OutcomeSender,
) -> Result<()> {
    info!(clients = pool.clients, "Starting benchmark clients");

    let mut handles = Vec::with_capacity(pool.clients);
    for client_id in 0..pool.clients {
        let driver = Arc::clone(&driver);
        let stop = Arc::clone(&stop);
        let sender = sender.clone();

        let handle = std::thread::Builder::new()
            .name(format!("client-{}", client_id))
            .spawn(move || run_client(client_id, pool.requests_per_client, driver.as_ref(), &stop, &sender))
            .with_context(|| format!("Failed to spawn client thread {}", client_id))?;
        handles.push(handle);
    }
    drop(sender);

    let mut total = 0u64;
    for handle in handles {
        total += handle
            .join()
            .map_err(|_| anyhow::anyhow!("Client thread panicked"))?;
    }

    info!(requests = total, "All benchmark clients finished");
    Ok(())
}

/// One client loop; returns the number of attempts made
fn run_client<D: RequestDriver + ?Sized>(
    client_id: usize,
    quota: Option<u64>,
    driver: &D,
    stop: &AtomicBool,
    sender: &OutcomeSender,
) -> u64 {
    let mut attempts = 0u64;

    while !stop.load(Ordering::Relaxed) && quota.map_or(true, |q| attempts < q) {
        let started = Instant::now();
        let result = driver.execute(client_id);
        let latency = started.elapsed();
        attempts += 1;

        let delivered = match result {
            Ok(()) => sender.success(latency, Utc::now()),
            Err(e) => sender.failure(format!("{:#}", e)),
        };
        if !delivered {
            debug!(client_id, "Result stream closed, client exiting");
            break;
        }
    }

    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    struct CountingDriver {
        calls: AtomicU64,
        fail_every: u64,
    }

    impl RequestDriver for CountingDriver {
        fn execute(&self, _client_id: usize) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every > 0 && n % self.fail_every == 0 {
                anyhow::bail!("request timed out");
            }
            Ok(())
        }
    }

    #[test]
    fn test_one_outcome_per_attempt_and_stream_closes() {
        let (sender, receiver) = result_stream(Some(16));
        let driver = Arc::new(CountingDriver {
            calls: AtomicU64::new(0),
            fail_every: 5,
        });
        let pool = ClientPool {
            clients: 4,
            requests_per_client: Some(25),
        };

        let producer = {
            let driver = Arc::clone(&driver);
            std::thread::spawn(move || run_clients(pool, driver, Arc::new(AtomicBool::new(false)), sender))
        };

        // Iteration only ends once every client dropped its sender
        let outcomes: Vec<Outcome> = receiver.into_iter().collect();
        producer.join().unwrap().unwrap();

        assert_eq!(outcomes.len(), 100);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 100);
        let failures = outcomes.iter().filter(|o| !o.is_success()).count();
        assert_eq!(failures, 20);
        assert!(outcomes.iter().all(|o| match o {
            Outcome::Failure { error } => error == "request timed out",
            Outcome::Success { .. } => true,
        }));
    }

    #[test]
    fn test_stop_flag_closes_stream_early() {
        let (sender, receiver) = result_stream(None);
        let driver = Arc::new(CountingDriver {
            calls: AtomicU64::new(0),
            fail_every: 0,
        });
        let stop = Arc::new(AtomicBool::new(false));
        let pool = ClientPool {
            clients: 2,
            requests_per_client: None,
        };

        let producer = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || run_clients(pool, driver, stop, sender))
        };

        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Relaxed);

        let count = receiver.iter().count();
        producer.join().unwrap().unwrap();
        assert!(count > 0);
    }

    #[test]
    fn test_pool_for_fleet() {
        let pool = ClientPool::for_fleet(3, 1000);
        assert_eq!(pool.clients, 3);
        assert_eq!(pool.requests_per_client, Some(334));

        let open_ended = ClientPool::for_fleet(8, 0);
        assert_eq!(open_ended.clients, 8);
        assert_eq!(open_ended.requests_per_client, None);
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (sender, receiver) = result_stream(None);
        drop(receiver);
        assert!(!sender.failure("connection reset"));
    }
}

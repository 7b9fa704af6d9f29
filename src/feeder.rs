//! # Feed and Tick Drivers
//!
//! Two background threads keep an [`Aggregator`] busy:
//! - [`Feeder`] polls a [`PointSource`] and records every in-range
//!   observation
//! - [`Ticker`] calls [`Aggregator::tick`] on a fixed cadence
//!
//! Both share a stop flag checked once per iteration and wake early from
//! their sleep when stopped. Transports (CSV files, simulators, network
//! feeds) live outside this crate behind [`PointSource`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::aggregator::{Aggregator, TickOutcome};
use crate::error::{MapCreatorError, Result};
use crate::{Coordinate, Point, Timestamp};

/// One raw position report from a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub vehicle_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Timestamp,
}

impl Observation {
    pub fn new(
        vehicle_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    pub fn into_point(self) -> Point {
        let position = self.position();
        Point::at(self.vehicle_id, position, self.timestamp)
    }
}

/// Result of polling a [`PointSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePoll {
    /// Zero or more new observations
    Ready(Vec<Observation>),
    /// The source is exhausted and will not be polled again
    Finished,
}

/// Producer of vehicle observations.
pub trait PointSource: Send {
    fn poll(&mut self) -> SourcePoll;
}

/// Counters reported by a stopped [`Feeder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub received: usize,
    pub recorded: usize,
    pub out_of_range: usize,
    /// Rejected by the aggregator (lock busy or id mismatch)
    pub dropped: usize,
}

struct Worker<T> {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<T>,
}

impl<T> Worker<T> {
    fn spawn<F>(name: &str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(flag))?;
        Ok(Self { stop, handle })
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    fn stop(self, name: &str) -> Result<T> {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.thread().unpark();
        self.handle.join().map_err(|_| MapCreatorError::Internal {
            message: format!("{} thread panicked", name),
        })
    }
}

/// Sleep for `interval` unless woken by a stop request.
fn pause(stop: &AtomicBool, interval: Duration) {
    if !stop.load(Ordering::Relaxed) {
        thread::park_timeout(interval);
    }
}

/// Producer thread moving observations from a source into an aggregator.
pub struct Feeder {
    aggregator: Arc<Aggregator>,
    poll_interval: Duration,
    worker: Option<Worker<FeedStats>>,
}

impl Feeder {
    pub fn new(aggregator: Arc<Aggregator>, poll_interval: Duration) -> Self {
        Self {
            aggregator,
            poll_interval,
            worker: None,
        }
    }

    /// Start polling `source` on a background thread.
    ///
    /// Fails if the feeder is already open.
    pub fn open(&mut self, mut source: Box<dyn PointSource>) -> Result<()> {
        if self.worker.is_some() {
            return Err(MapCreatorError::Internal {
                message: "feeder is already open".to_string(),
            });
        }

        let aggregator = Arc::clone(&self.aggregator);
        let interval = self.poll_interval;

        let worker = Worker::spawn("map-creator-feeder", move |stop| {
            let mut stats = FeedStats::default();
            while !stop.load(Ordering::Relaxed) {
                match source.poll() {
                    SourcePoll::Ready(observations) => {
                        for observation in observations {
                            feed_one(&aggregator, observation, &mut stats);
                        }
                    }
                    SourcePoll::Finished => {
                        log::info!("[Feeder] Source finished");
                        break;
                    }
                }
                pause(&stop, interval);
            }
            stats
        })?;

        self.worker = Some(worker);
        log::info!("[Feeder] Started");
        Ok(())
    }

    /// Whether the producer thread is still running.
    pub fn is_open(&self) -> bool {
        self.worker.as_ref().map_or(false, Worker::is_running)
    }

    /// Stop the producer thread and wait for it to exit.
    ///
    /// Returns the counters of the finished run; a feeder that was never
    /// opened reports all zeros.
    pub fn close(&mut self) -> Result<FeedStats> {
        let Some(worker) = self.worker.take() else {
            return Ok(FeedStats::default());
        };
        let stats = worker.stop("feeder")?;
        log::info!(
            "[Feeder] Stopped: {} received, {} recorded, {} out of range, {} dropped",
            stats.received,
            stats.recorded,
            stats.out_of_range,
            stats.dropped
        );
        Ok(stats)
    }
}

impl Drop for Feeder {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop("feeder");
        }
    }
}

fn feed_one(aggregator: &Aggregator, observation: Observation, stats: &mut FeedStats) {
    stats.received += 1;

    let position = observation.position();
    if !aggregator.processor().preprocessor().in_range(&position) {
        log::trace!(
            "[Feeder] Out of range: {:.3} km > {} km",
            aggregator.reference_point().distance(&position),
            aggregator.range()
        );
        stats.out_of_range += 1;
        return;
    }

    if aggregator.record(observation.into_point()) {
        stats.recorded += 1;
    } else {
        stats.dropped += 1;
    }
}

/// Driver thread calling [`Aggregator::tick`] on a fixed cadence.
pub struct Ticker {
    worker: Option<Worker<usize>>,
}

impl Ticker {
    /// Start ticking every `interval`.
    pub fn start(aggregator: Arc<Aggregator>, interval: Duration) -> Result<Self> {
        let worker = Worker::spawn("map-creator-ticker", move |stop| {
            let mut updates = 0;
            while !stop.load(Ordering::Relaxed) {
                if let TickOutcome::Updated { .. } = aggregator.tick() {
                    updates += 1;
                }
                pause(&stop, interval);
            }
            updates
        })?;

        log::info!("[Ticker] Started with {:?} interval", interval);
        Ok(Self {
            worker: Some(worker),
        })
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, Worker::is_running)
    }

    /// Stop ticking and wait for the thread. Returns the number of updates run.
    pub fn stop(mut self) -> Result<usize> {
        let updates = match self.worker.take() {
            Some(worker) => worker.stop("ticker")?,
            None => 0,
        };
        log::info!("[Ticker] Stopped after {} updates", updates);
        Ok(updates)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop("ticker");
        }
    }
}

//! # Aggregator
//!
//! Stateful collector of in-flight vehicle paths for one intersection.
//!
//! Points arrive continuously from a producer thread while a driver thread
//! calls [`Aggregator::tick`] on a cadence. Each due tick ages out stale
//! points, clusters what remains, folds the result into the running
//! aggregate map and publishes it.
//!
//! ## Locking
//!
//! All mutable state sits behind one mutex that every mutator acquires with
//! `try_lock`. A mutator that finds the lock held (typically by a tick in
//! progress) gives up immediately and reports `false`: point delivery is
//! at-most-once and lossy under contention. A tick that finds the lock held
//! returns [`TickOutcome::Contended`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::processor::Processor;
use crate::snapshot::MapSnapshot;
use crate::{now_millis, Coordinate, Map, Path, Point, Timestamp};

/// Receiver of every freshly updated aggregate map.
///
/// `publish` runs on the ticking thread while the aggregator's lock is held,
/// so every mutator call made during it is dropped.
pub trait MapSink: Send + Sync {
    fn open(&self) {}

    fn publish(&self, snapshot: MapSnapshot);

    fn close(&self) {}
}

/// Aggregator cadence settings, both in seconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatorConfig {
    /// Points older than this are evicted at each update. `None` keeps
    /// every point forever.
    pub time_window: Option<f64>,
    /// Minimum time between updates. `None` updates on every tick.
    pub update_interval: Option<f64>,
}

/// Result of one [`Aggregator::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Lock held elsewhere, nothing done
    Contended,
    /// Update interval not yet elapsed
    NotDue,
    /// Aggregate rebuilt; ingress count of the new aggregate
    Updated { ingresses: usize },
}

struct AggregatorState {
    paths: Vec<Path>,
    last_update: Timestamp,
    aggregate: Option<Map>,
}

/// Time-windowed path collector driving a [`Processor`].
pub struct Aggregator {
    processor: Processor,
    config: AggregatorConfig,
    sink: Option<Arc<dyn MapSink>>,
    state: Mutex<AggregatorState>,
}

impl Aggregator {
    pub fn new(processor: Processor, config: AggregatorConfig) -> Self {
        Self {
            processor,
            config,
            sink: None,
            state: Mutex::new(AggregatorState {
                paths: Vec::new(),
                last_update: now_millis(),
                aggregate: None,
            }),
        }
    }

    /// Attach a sink that receives every updated aggregate.
    pub fn with_sink(mut self, sink: Arc<dyn MapSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn reference_point(&self) -> Coordinate {
        self.processor.preprocessor().reference_point()
    }

    /// Preprocessing range in kilometers.
    pub fn range(&self) -> f64 {
        self.processor.preprocessor().range()
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn open(&self) {
        if let Some(sink) = &self.sink {
            sink.open();
        }
        log::info!(
            "[Aggregator] Opened at ({:.5}, {:.5}), range {} km",
            self.reference_point().latitude,
            self.reference_point().longitude,
            self.range()
        );
    }

    pub fn close(&self) {
        if let Some(sink) = &self.sink {
            sink.close();
        }
        log::info!("[Aggregator] Closed");
    }

    /// Non-blocking acquisition. A poisoned lock is recovered, not propagated.
    fn try_state(&self) -> Option<MutexGuard<'_, AggregatorState>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::WouldBlock) => None,
            Err(TryLockError::Poisoned(poisoned)) => {
                log::warn!("[Aggregator] Recovering poisoned state lock");
                Some(poisoned.into_inner())
            }
        }
    }

    /// Blocking acquisition for read-only observers.
    fn state(&self) -> MutexGuard<'_, AggregatorState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("[Aggregator] Recovering poisoned state lock");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Start tracking a new path. Returns `false` if the lock was busy.
    pub fn add_path(&self, path: Path) -> bool {
        match self.try_state() {
            Some(mut state) => {
                state.paths.push(path);
                true
            }
            None => {
                log::trace!("[Aggregator] Lock busy, dropped new path");
                false
            }
        }
    }

    /// Append a point to the path at `index`.
    ///
    /// Returns `false` if the lock was busy, the index is out of range, or
    /// the point's id does not match the path's.
    pub fn add_point(&self, index: usize, point: Point) -> bool {
        let Some(mut state) = self.try_state() else {
            log::trace!("[Aggregator] Lock busy, dropped point of '{}'", point.id);
            return false;
        };

        match state.paths.get_mut(index) {
            Some(path) => path.push(point),
            None => false,
        }
    }

    /// Route a point to the active path with the same id, starting a new
    /// path if there is none. One lock acquisition covers the lookup and
    /// the append.
    pub fn record(&self, point: Point) -> bool {
        let Some(mut state) = self.try_state() else {
            log::trace!("[Aggregator] Lock busy, dropped point of '{}'", point.id);
            return false;
        };

        let existing = state
            .paths
            .iter()
            .position(|p| p.id() == Some(point.id.as_str()));

        match existing {
            Some(index) => state.paths[index].push(point),
            None => {
                let mut path = Path::new();
                path.push(point);
                state.paths.push(path);
                true
            }
        }
    }

    /// Run an update if one is due, using the current time.
    pub fn tick(&self) -> TickOutcome {
        self.tick_at(now_millis())
    }

    /// Run an update if one is due at `now`.
    pub fn tick_at(&self, now: Timestamp) -> TickOutcome {
        let Some(mut state) = self.try_state() else {
            log::trace!("[Aggregator] Lock busy, skipped tick");
            return TickOutcome::Contended;
        };

        if let Some(interval) = self.config.update_interval {
            let elapsed = (now - state.last_update) as f64 / 1000.0;
            if elapsed < interval {
                return TickOutcome::NotDue;
            }
        }
        state.last_update = now;

        if let Some(window) = self.config.time_window {
            let removed = evict_expired(&mut state.paths, now, window);
            if removed > 0 {
                log::debug!("[Aggregator] Evicted {} expired paths", removed);
            }
        }

        let map = self.processor.process(&state.paths);
        let aggregate = self.processor.postprocess(state.aggregate.take(), map);
        let ingresses = aggregate.ingresses.len();

        log::debug!(
            "[Aggregator] Updated from {} active paths: {} ingresses, {} egresses",
            state.paths.len(),
            ingresses,
            aggregate.egress_count()
        );

        if let Some(sink) = &self.sink {
            sink.publish(MapSnapshot::from_map(&aggregate, self.range()));
        }
        state.aggregate = Some(aggregate);

        TickOutcome::Updated { ingresses }
    }

    /// Number of paths currently tracked.
    pub fn path_count(&self) -> usize {
        self.state().paths.len()
    }

    /// Copy of every path currently tracked.
    pub fn paths(&self) -> Vec<Path> {
        self.state().paths.clone()
    }

    /// Copy of the aggregate map, if any update has run.
    pub fn aggregate_map(&self) -> Option<Map> {
        self.state().aggregate.clone()
    }

    /// The aggregate in publish form, if any update has run.
    pub fn snapshot(&self) -> Option<MapSnapshot> {
        self.state()
            .aggregate
            .as_ref()
            .map(|map| MapSnapshot::from_map(map, self.range()))
    }
}

/// Drop points older than `window` seconds at `now`, then empty paths.
/// Returns the number of paths removed.
fn evict_expired(paths: &mut Vec<Path>, now: Timestamp, window: f64) -> usize {
    for path in paths.iter_mut() {
        path.retain_points(|p| (now - p.timestamp) as f64 / 1000.0 <= window);
    }
    let before = paths.len();
    paths.retain(|p| !p.is_empty());
    before - paths.len()
}

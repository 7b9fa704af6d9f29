//! # Map Creator
//!
//! Infers a simplified road-junction model from streams of noisy GPS traces.
//!
//! Every trace passing through the vicinity of a known reference point (the
//! intersection center) is split at its closest approach into an *ingress*
//! (approach) and an *egress* (departure). Similar ingresses are clustered
//! together, and within each ingress cluster the departures are clustered
//! again, producing a compact tree:
//!
//! ```text
//! reference point
//!  ├─ ingress A ── egress A1, egress A2
//!  └─ ingress B ── egress B1
//! ```
//!
//! This library provides:
//! - Spherical geometry on a 6373 km sphere ([`geo_utils`])
//! - Path distance measures: Euclidean-over-aligned-points and DTW ([`distance`])
//! - Path operations: split, key-point reduction, interpolation, combination ([`paths`])
//! - Three interchangeable clustering strategies ([`clustering`])
//! - Preprocessing and map merging ([`processor`])
//! - A time-windowed, lossy-under-contention aggregator ([`aggregator`])
//!
//! ## Features
//!
//! - **`parallel`** - Compute pairwise path distances with rayon
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use map_creator::{
//!     create_algorithm, AlgorithmConfig, Coordinate, DistanceMeasure, Path, Point,
//!     Preprocessor, Processor,
//! };
//!
//! let reference = Coordinate::new(47.05889, 15.44551);
//!
//! let mut path = Path::new();
//! for (lat, lng) in [(47.05865, 15.44394), (47.05878, 15.44517), (47.05913, 15.44636)] {
//!     path.push(Point::at("car-1", Coordinate::new(lat, lng), 0));
//! }
//!
//! let algorithm = create_algorithm(
//!     &AlgorithmConfig::Dbscan { eps: 0.05, min_pts: 1, representative: Default::default() },
//!     reference,
//!     DistanceMeasure::Dtw,
//! )
//! .unwrap();
//! let processor = Processor::new(algorithm, Preprocessor::new(reference, 1.0), DistanceMeasure::Dtw);
//!
//! let map = processor.process(&[path]);
//! assert_eq!(map.ingresses.len(), 1);
//! assert_eq!(map.ingresses[0].egresses.len(), 1);
//! ```

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{MapCreatorError, Result};

// Spherical geometry (distance, heading, projection, bounds)
pub mod geo_utils;
pub use geo_utils::Bounds;

// Path-to-path distance measures
pub mod distance;
pub use distance::{DistanceMeasure, INFINITE_DISTANCE};

// Split, reduce, interpolate and combine paths
pub mod paths;

// Clustering strategies and their factory
pub mod clustering;
pub use clustering::{
    create_algorithm, AlgorithmConfig, ClusteringAlgorithm, Dbscan, GreedyMerge, Hierarchical,
    Linkage, Representative, DEFAULT_MAX_LINKAGE,
};

// Preprocessing and map merging
pub mod processor;
pub use processor::{Preprocessor, Processor, MATCH_THRESHOLD};

// Stateful time-windowed collector
pub mod aggregator;
pub use aggregator::{Aggregator, AggregatorConfig, MapSink, TickOutcome};

// Point-source contract and driver threads
pub mod feeder;
pub use feeder::{FeedStats, Feeder, Observation, PointSource, SourcePoll, Ticker};

// JSON presentation of a map
pub mod snapshot;
pub use snapshot::{IngressSnapshot, MapSnapshot};

// Process configuration
pub mod config;
pub use config::{MapCreatorConfig, PreprocessorConfig, RsuConfig, Toggle};

// Algorithm toolbox - flat access to every algorithm
pub mod algorithms;

// ============================================================================
// Core Types
// ============================================================================

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or(0)
}

/// A geographic coordinate in degrees.
///
/// Ranges are not enforced; garbage in, garbage out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance(&self, other: &Coordinate) -> f64 {
        geo_utils::haversine_distance(self, other)
    }

    /// Initial compass bearing to `other` in degrees `[0, 360)`.
    pub fn heading(&self, other: &Coordinate) -> f64 {
        geo_utils::heading(self, other)
    }

    /// Coordinate reached by travelling `distance_km` along `heading_deg`.
    pub fn destination(&self, distance_km: f64, heading_deg: f64) -> Coordinate {
        geo_utils::destination(self, distance_km, heading_deg)
    }
}

/// A single observation of a vehicle.
///
/// `heading` is never supplied by the caller: it is written onto a point when
/// its successor is appended to the same [`Path`], so the newest point of a
/// path always has heading 0.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// External (vehicle) id
    pub id: String,
    pub timestamp: Timestamp,
    pub position: Coordinate,
    /// Degrees, 0-360
    pub heading: f64,
}

impl Point {
    /// Create a point stamped with the current time.
    pub fn new(id: impl Into<String>, position: Coordinate) -> Self {
        Self::at(id, position, now_millis())
    }

    /// Create a point with an explicit timestamp.
    pub fn at(id: impl Into<String>, position: Coordinate, timestamp: Timestamp) -> Self {
        Self {
            id: id.into(),
            timestamp,
            position,
            heading: 0.0,
        }
    }
}

/// An ordered sequence of points sharing one id.
///
/// The first appended point fixes the id. Points carrying any other id are
/// silently rejected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    id: Option<String>,
    points: Vec<Point>,
}

impl Path {
    /// Create an empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a path by appending every point in order.
    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Self {
        let mut path = Self::new();
        for point in points {
            path.push(point);
        }
        path
    }

    /// Take over an already-consistent point sequence as is.
    pub(crate) fn from_parts(id: Option<String>, points: Vec<Point>) -> Self {
        Self { id, points }
    }

    /// Append a point, deriving the heading of the previous point.
    ///
    /// Returns `false` (and leaves the path untouched) when the point's id
    /// differs from the path's id.
    pub fn push(&mut self, mut point: Point) -> bool {
        match &self.id {
            None => self.id = Some(point.id.clone()),
            Some(id) if *id != point.id => {
                log::trace!("[Path] Rejected point of '{}' for path '{}'", point.id, id);
                return false;
            }
            Some(_) => {}
        }

        point.heading = 0.0;
        if let Some(last) = self.points.last_mut() {
            last.heading = last.position.heading(&point.position);
        }
        self.points.push(point);
        true
    }

    /// Id fixed by the first appended point.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of consecutive great-circle distances in kilometers.
    pub fn length(&self) -> f64 {
        geo_utils::polyline_length(&self.points)
    }

    /// Positions of all points, in order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Drop every point for which `keep` returns false. Headings of the
    /// surviving points are left as they were.
    pub(crate) fn retain_points<F: FnMut(&Point) -> bool>(&mut self, keep: F) {
        self.points.retain(keep);
    }
}

/// Departure portion of a trace, after its closest approach to the reference point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Egress {
    pub path: Path,
}

impl Egress {
    pub fn from_path(path: Path) -> Self {
        Self { path }
    }
}

/// Approach portion of a trace, owning the departures observed after it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ingress {
    pub path: Path,
    pub egresses: Vec<Egress>,
}

impl Ingress {
    pub fn from_path(path: Path) -> Self {
        Self {
            path,
            egresses: Vec::new(),
        }
    }

    pub fn add_egress(&mut self, egress: Egress) {
        self.egresses.push(egress);
    }
}

/// Shared behavior of [`Ingress`] and [`Egress`] during clustering.
///
/// Clustering strategies are generic over this trait so the same code
/// clusters approaches and departures.
pub trait Segment: Clone + Send + Sync {
    fn path(&self) -> &Path;

    fn from_path(path: Path) -> Self;

    /// Fold `other` into `self` after `other` was judged to be the same
    /// structure. Ingresses take over the other's egresses.
    fn absorb(&mut self, other: Self);

    /// Empty placeholder used when a cluster has no usable representative.
    fn placeholder() -> Self {
        Self::from_path(Path::new())
    }
}

impl Segment for Egress {
    fn path(&self) -> &Path {
        &self.path
    }

    fn from_path(path: Path) -> Self {
        Egress::from_path(path)
    }

    fn absorb(&mut self, _other: Self) {}
}

impl Segment for Ingress {
    fn path(&self) -> &Path {
        &self.path
    }

    fn from_path(path: Path) -> Self {
        Ingress::from_path(path)
    }

    fn absorb(&mut self, other: Self) {
        self.egresses.extend(other.egresses);
    }
}

/// The inferred junction model: a reference point and its clustered ingresses.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub reference_point: Coordinate,
    pub ingresses: Vec<Ingress>,
}

impl Map {
    pub fn new(reference_point: Coordinate, ingresses: Vec<Ingress>) -> Self {
        Self {
            reference_point,
            ingresses,
        }
    }

    /// Total number of egresses across all ingresses.
    pub fn egress_count(&self) -> usize {
        self.ingresses.iter().map(|i| i.egresses.len()).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================

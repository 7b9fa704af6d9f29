//! Path-to-path distance measures.
//!
//! Two interchangeable measures, selected by configuration:
//! - **Euclidean**: pairs points by index, padding the shorter path with a
//!   degenerate point at (0, 0), and returns the root of the summed squared
//!   great-circle distances. Paths of very different length are heavily
//!   penalized.
//! - **DTW**: classic dynamic time warping over great-circle point distances.
//!
//! Both return [`INFINITE_DISTANCE`] when either path is empty, marking the
//! pair as incomparable instead of failing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MapCreatorError, Result};
use crate::{Coordinate, Path};

/// Sentinel returned for incomparable (empty) paths.
pub const INFINITE_DISTANCE: f64 = 1000.0;

/// Selectable path distance measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMeasure {
    Euclidean,
    #[default]
    Dtw,
}

impl DistanceMeasure {
    /// Distance between two paths under this measure.
    pub fn distance(&self, a: &Path, b: &Path) -> f64 {
        match self {
            DistanceMeasure::Euclidean => euclidean(a, b),
            DistanceMeasure::Dtw => dtw(a, b),
        }
    }
}

impl FromStr for DistanceMeasure {
    type Err = MapCreatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(DistanceMeasure::Euclidean),
            "dtw" => Ok(DistanceMeasure::Dtw),
            other => Err(MapCreatorError::config(format!(
                "invalid distance function: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DistanceMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMeasure::Euclidean => write!(f, "euclidean"),
            DistanceMeasure::Dtw => write!(f, "dtw"),
        }
    }
}

/// Euclidean distance over index-aligned points.
pub fn euclidean(a: &Path, b: &Path) -> f64 {
    if a.is_empty() || b.is_empty() {
        return INFINITE_DISTANCE;
    }

    let origin = Coordinate::new(0.0, 0.0);
    let longest = a.len().max(b.len());

    let sum_sq: f64 = (0..longest)
        .map(|i| {
            let p = a.points().get(i).map_or(origin, |p| p.position);
            let q = b.points().get(i).map_or(origin, |p| p.position);
            p.distance(&q).powi(2)
        })
        .sum();

    sum_sq.sqrt()
}

/// Dynamic time warping distance.
///
/// Cell `(i, j)` holds the distance between point `i` and point `j` plus the
/// cheapest of its three predecessors; the border is infinite except the
/// origin. Only two rows are kept in memory.
pub fn dtw(a: &Path, b: &Path) -> f64 {
    if a.is_empty() || b.is_empty() {
        return INFINITE_DISTANCE;
    }

    let m = b.len();
    let mut prev = vec![f64::INFINITY; m + 1];
    let mut curr = vec![f64::INFINITY; m + 1];
    prev[0] = 0.0;

    for p in a.points() {
        curr[0] = f64::INFINITY;
        for (j, q) in b.points().iter().enumerate() {
            let cost = p.position.distance(&q.position);
            curr[j + 1] = cost + prev[j].min(curr[j]).min(prev[j + 1]);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[m]
}

//! # Algorithm Toolbox
//!
//! Flat access to every algorithm in the crate, for callers that want a
//! single building block without the processor or aggregator.
//!
//! ## Geometry
//!
//! - **Haversine Distance**: Great-circle distance on a 6373 km sphere
//! - **Heading / Destination**: Initial bearing and forward projection
//! - **Bounds Computation**: Bounding box of a coordinate set
//!
//! ## Path Distances
//!
//! - **Euclidean**: Index-aligned, length-mismatch penalizing
//! - **DTW**: Dynamic time warping
//!
//! ## Path Operations
//!
//! - **Split**: Ingress/egress separation at the closest approach
//! - **Key Points**: Corner-only reduction
//! - **Interpolate**: Even arc-length resampling
//! - **Combine**: Grid-averaged synthetic path
//!
//! # Example
//!
//! ```rust
//! use map_creator::algorithms::{dtw, haversine_distance, split_path, Coordinate, Path, Point};
//!
//! let a = Coordinate::new(47.47085, 19.05291);
//! let b = Coordinate::new(47.47312, 19.06369);
//! assert!((haversine_distance(&a, &b) - 0.84866).abs() < 0.001);
//!
//! let path = Path::from_points(vec![Point::at("car", a, 0), Point::at("car", b, 1)]);
//! assert_eq!(dtw(&path, &path), 0.0);
//!
//! let (ingress, egress) = split_path(&a, path);
//! assert_eq!(ingress.path.len(), 1);
//! assert_eq!(egress.path.len(), 1);
//! ```

// =============================================================================
// Core Types (re-exported from lib)
// =============================================================================

pub use crate::{Bounds, Coordinate, Egress, Ingress, Map, Path, Point, Segment};

// =============================================================================
// Geographic Utilities
// =============================================================================

pub use crate::geo_utils::{
    compute_bounds, destination, haversine_distance, heading, polyline_length, EARTH_RADIUS_KM,
};

// =============================================================================
// Path Distances
// =============================================================================

pub use crate::distance::{dtw, euclidean, DistanceMeasure, INFINITE_DISTANCE};

// =============================================================================
// Path Operations
// =============================================================================

pub use crate::paths::{
    closest_index, closest_point, combine_paths, interpolate, reduce_to_key_points, split_path,
    DEFAULT_INTERPOLATION_POINTS, KEY_POINT_HEADING_CHANGE,
};

// =============================================================================
// Clustering
// =============================================================================

pub use crate::clustering::{
    average_distance, average_heading, create_algorithm, AlgorithmConfig, ClusteringAlgorithm,
    Dbscan, GreedyMerge, Hierarchical, Linkage, Representative,
    DEFAULT_MAX_LINKAGE,
};

/// Cluster raw paths into a map with one call.
///
/// Equivalent to building the strategy with [`create_algorithm`] and calling
/// [`ClusteringAlgorithm::process`]; no range filtering or key-point
/// reduction is applied.
pub fn cluster_paths(
    paths: Vec<Path>,
    config: &AlgorithmConfig,
    reference_point: Coordinate,
    measure: DistanceMeasure,
) -> crate::Result<Map> {
    Ok(create_algorithm(config, reference_point, measure)?.process(paths))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_paths_merges_identical_traces() {
        let reference = Coordinate::new(47.001, 19.0);
        let trace = |id: &str| {
            Path::from_points(
                (0..4).map(|i| Point::at(id, Coordinate::new(47.0 + i as f64 * 0.001, 19.0), i)),
            )
        };

        let map = cluster_paths(
            vec![trace("a"), trace("b")],
            &AlgorithmConfig::Greedy {
                diff_dist: 0.1,
                diff_head: 2.0,
                num_points: None,
            },
            reference,
            DistanceMeasure::Dtw,
        )
        .unwrap();

        assert_eq!(map.ingresses.len(), 1);
        assert_eq!(map.ingresses[0].path.id(), Some("a"));
        assert_eq!(map.egress_count(), 1);
    }
}

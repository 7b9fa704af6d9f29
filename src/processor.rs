//! # Preprocessing and Map Merging
//!
//! [`Preprocessor`] trims raw paths to the neighborhood of the reference
//! point and reduces them to their corners. [`Processor`] runs the
//! preprocessor, hands the result to a clustering strategy, and folds each
//! freshly clustered map into a running aggregate.
//!
//! ## Aggregate merging
//!
//! The aggregate only ever grows. A new ingress either matches an existing
//! one (distance below [`MATCH_THRESHOLD`] under the configured measure) or
//! is appended whole. The egresses of a matched ingress are merged the same
//! way into the matched ingress's egress list. Existing entries are never
//! replaced or re-clustered.

use crate::clustering::ClusteringAlgorithm;
use crate::distance::DistanceMeasure;
use crate::paths::reduce_to_key_points;
use crate::{Coordinate, Map, Path, Point};

/// Distance below which a new ingress or egress is considered already present.
pub const MATCH_THRESHOLD: f64 = 0.2;

/// Range filter plus key-point reduction.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    reference_point: Coordinate,
    range: f64,
}

impl Preprocessor {
    /// `range` is the maximum distance from `reference_point` in kilometers.
    pub fn new(reference_point: Coordinate, range: f64) -> Self {
        Self {
            reference_point,
            range,
        }
    }

    pub fn reference_point(&self) -> Coordinate {
        self.reference_point
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Whether a position lies within range of the reference point.
    pub fn in_range(&self, position: &Coordinate) -> bool {
        self.reference_point.distance(position) <= self.range
    }

    /// Keep only the points within range, in order.
    pub fn filter_points(&self, points: &[Point]) -> Vec<Point> {
        points
            .iter()
            .filter(|p| self.in_range(&p.position))
            .cloned()
            .collect()
    }

    /// Range-filter every path and reduce it to key points.
    ///
    /// Paths with no point in range are dropped. Headings of the surviving
    /// points are recomputed from their new neighbors.
    pub fn preprocess(&self, paths: &[Path]) -> Vec<Path> {
        paths
            .iter()
            .filter_map(|path| {
                let filtered = self.filter_points(path.points());
                if filtered.is_empty() {
                    return None;
                }
                Some(reduce_to_key_points(&Path::from_points(filtered)))
            })
            .collect()
    }
}

/// Preprocessing, clustering and aggregate merging.
pub struct Processor {
    algorithm: Box<dyn ClusteringAlgorithm>,
    preprocessor: Preprocessor,
    measure: DistanceMeasure,
}

impl Processor {
    /// `measure` is the distance used to match new entries against the aggregate.
    pub fn new(
        algorithm: Box<dyn ClusteringAlgorithm>,
        preprocessor: Preprocessor,
        measure: DistanceMeasure,
    ) -> Self {
        Self {
            algorithm,
            preprocessor,
            measure,
        }
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn algorithm(&self) -> &dyn ClusteringAlgorithm {
        self.algorithm.as_ref()
    }

    pub fn measure(&self) -> DistanceMeasure {
        self.measure
    }

    /// Build a map from raw paths. The input is left untouched.
    pub fn process(&self, paths: &[Path]) -> Map {
        let preprocessed = self.preprocessor.preprocess(paths);
        log::debug!(
            "[Processor] {} paths, {} after preprocessing",
            paths.len(),
            preprocessed.len()
        );
        self.algorithm.process(preprocessed)
    }

    /// Fold `map` into `aggregate`.
    ///
    /// With no aggregate yet, `map` is returned as is. A path matches when it
    /// lies within [`MATCH_THRESHOLD`] under the configured measure, or when
    /// both paths are empty, so vehicles that have not yet left the junction
    /// add at most one empty egress per ingress. Matching considers
    /// every entry already in the aggregate, including ones appended earlier
    /// in the same call; the first match wins.
    pub fn postprocess(&self, aggregate: Option<Map>, map: Map) -> Map {
        let mut aggregate = match aggregate {
            Some(aggregate) => aggregate,
            None => return map,
        };

        let mut added_ingresses = 0;
        let mut added_egresses = 0;

        for ingress in map.ingresses {
            let matched = aggregate
                .ingresses
                .iter()
                .position(|existing| self.matches(&existing.path, &ingress.path));

            let Some(index) = matched else {
                aggregate.ingresses.push(ingress);
                added_ingresses += 1;
                continue;
            };

            let target = &mut aggregate.ingresses[index];
            for egress in ingress.egresses {
                let known = target
                    .egresses
                    .iter()
                    .any(|existing| self.matches(&existing.path, &egress.path));
                if !known {
                    target.add_egress(egress);
                    added_egresses += 1;
                }
            }
        }

        log::debug!(
            "[Processor] Aggregate gained {} ingresses, {} egresses",
            added_ingresses,
            added_egresses
        );
        aggregate
    }

    /// Two empty paths match each other; an empty path matches nothing else.
    fn matches(&self, a: &Path, b: &Path) -> bool {
        if a.is_empty() || b.is_empty() {
            return a.is_empty() && b.is_empty();
        }
        self.measure.distance(a, b) < MATCH_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{create_algorithm, AlgorithmConfig, Representative};
    use crate::{Egress, Ingress};

    fn reference() -> Coordinate {
        Coordinate::new(47.05889, 15.44551)
    }

    fn path(id: &str, coords: &[(f64, f64)]) -> Path {
        Path::from_points(
            coords
                .iter()
                .map(|&(lat, lng)| Point::at(id, Coordinate::new(lat, lng), 0)),
        )
    }

    fn processor() -> Processor {
        let algorithm = create_algorithm(
            &AlgorithmConfig::Dbscan {
                eps: 0.05,
                min_pts: 1,
                representative: Representative::Longest,
            },
            reference(),
            DistanceMeasure::Dtw,
        )
        .unwrap();
        Processor::new(
            algorithm,
            Preprocessor::new(reference(), 0.1),
            DistanceMeasure::Dtw,
        )
    }

    fn ingress(lng: f64, egress_lngs: &[f64]) -> Ingress {
        let mut ingress = Ingress::from_path(path("i", &[(47.0, lng), (47.001, lng)]));
        for &e in egress_lngs {
            ingress.add_egress(Egress::from_path(path("e", &[(47.002, e), (47.003, e)])));
        }
        ingress
    }

    #[test]
    fn test_filter_points_by_range() {
        let pre = Preprocessor::new(reference(), 0.1);
        let points = path(
            "1",
            &[
                (47.05865, 15.44394), // ~0.12 km
                (47.05878, 15.44517), // ~0.03 km
                (47.05913, 15.44636), // ~0.07 km
            ],
        )
        .into_points();

        let kept = pre.filter_points(&points);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].position, Coordinate::new(47.05878, 15.44517));
    }

    #[test]
    fn test_preprocess_drops_out_of_range_paths() {
        let pre = Preprocessor::new(reference(), 0.1);
        let near = path("near", &[(47.05878, 15.44517), (47.05913, 15.44636)]);
        let far = path("far", &[(47.1, 15.5), (47.2, 15.6)]);

        let out = pre.preprocess(&[near, far]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id(), Some("near"));
        // The last surviving point has no successor
        assert_eq!(out[0].points().last().unwrap().heading, 0.0);
    }

    #[test]
    fn test_process_leaves_input_untouched() {
        let input = vec![path(
            "1",
            &[(47.05865, 15.44394), (47.05878, 15.44517), (47.05913, 15.44636)],
        )];
        let before = input.clone();

        let map = processor().process(&input);

        assert_eq!(input, before);
        assert_eq!(map.reference_point, reference());
        assert_eq!(map.ingresses.len(), 1);
    }

    #[test]
    fn test_postprocess_without_aggregate_is_identity() {
        let map = Map::new(reference(), vec![ingress(19.0, &[19.0])]);
        assert_eq!(processor().postprocess(None, map.clone()), map);
    }

    #[test]
    fn test_postprocess_appends_unmatched_ingress() {
        let aggregate = Map::new(reference(), vec![ingress(19.0, &[19.0])]);
        // About 7.6 km east
        let new = Map::new(reference(), vec![ingress(19.1, &[19.1])]);

        let merged = processor().postprocess(Some(aggregate), new);
        assert_eq!(merged.ingresses.len(), 2);
        assert_eq!(merged.egress_count(), 2);
    }

    #[test]
    fn test_postprocess_merges_egresses_of_matched_ingress() {
        let aggregate = Map::new(reference(), vec![ingress(19.0, &[19.0])]);
        // Same ingress; one known egress, one new egress to the east
        let new = Map::new(reference(), vec![ingress(19.00001, &[19.00001, 19.1])]);

        let merged = processor().postprocess(Some(aggregate.clone()), new);

        assert_eq!(merged.ingresses.len(), 1);
        assert_eq!(merged.ingresses[0].path, aggregate.ingresses[0].path);
        assert_eq!(merged.ingresses[0].egresses.len(), 2);
        assert_eq!(
            merged.ingresses[0].egresses[0],
            aggregate.ingresses[0].egresses[0]
        );
    }

    #[test]
    fn test_postprocess_never_shrinks() {
        let aggregate = Map::new(
            reference(),
            vec![ingress(19.0, &[19.0]), ingress(19.1, &[19.1, 19.2])],
        );
        let empty = Map::new(reference(), Vec::new());

        let merged = processor().postprocess(Some(aggregate.clone()), empty);
        assert_eq!(merged, aggregate);
    }

    #[test]
    fn test_postprocess_keeps_one_empty_egress() {
        let mut approach = ingress(19.0, &[]);
        approach.add_egress(Egress::from_path(Path::new()));
        let aggregate = Map::new(reference(), vec![approach.clone()]);

        let mut merged = aggregate;
        for _ in 0..5 {
            let new = Map::new(reference(), vec![approach.clone()]);
            merged = processor().postprocess(Some(merged), new);
        }

        assert_eq!(merged.ingresses.len(), 1);
        assert_eq!(merged.egress_count(), 1);
        assert!(merged.ingresses[0].egresses[0].path.is_empty());
    }

    #[test]
    fn test_empty_egress_is_added_once_and_never_matches_a_route() {
        let aggregate = Map::new(reference(), vec![ingress(19.0, &[19.0])]);
        let mut approach = ingress(19.0, &[]);
        approach.add_egress(Egress::from_path(Path::new()));

        let new = Map::new(reference(), vec![approach]);
        let merged = processor().postprocess(Some(aggregate), new);

        assert_eq!(merged.ingresses.len(), 1);
        assert_eq!(merged.egress_count(), 2);
        assert!(merged.ingresses[0].egresses[1].path.is_empty());
    }
}

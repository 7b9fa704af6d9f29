//! Agglomerative clustering with a configurable linkage.
//!
//! Starting from singletons, the two clusters with the smallest linkage
//! distance are merged until one cluster remains, recording every
//! intermediate clustering together with the linkage it was reached at.
//! Clusterings reached only through merges within `max_linkage` are
//! candidates, the final single-cluster state included. The candidate whose
//! inter-cluster distances sum lowest is returned. Ties go to the later
//! (coarser) clustering.
//!
//! Linkage is always computed over DTW distances, whatever measure the
//! rest of the pipeline is configured with.

use super::{take_groups, ClusteringAlgorithm, DistanceMatrix, Linkage};
use crate::distance::DistanceMeasure;
use crate::{Coordinate, Egress, Ingress, Segment};

type Clustering = Vec<Vec<usize>>;

/// Largest linkage distance (DTW, km) at which two clusters still merge.
pub const DEFAULT_MAX_LINKAGE: f64 = 0.1;

/// One entry of the merge history.
#[derive(Debug, Clone, PartialEq)]
struct Step {
    clustering: Clustering,
    /// Linkage distance of the merge producing this clustering, 0 for the start
    linkage: f64,
}

pub struct Hierarchical {
    reference_point: Coordinate,
    linkage: Linkage,
    max_linkage: f64,
}

impl Hierarchical {
    pub fn new(reference_point: Coordinate, linkage: Linkage, max_linkage: f64) -> Self {
        Self {
            reference_point,
            linkage,
            max_linkage,
        }
    }

    pub fn linkage(&self) -> Linkage {
        self.linkage
    }

    pub fn max_linkage(&self) -> f64 {
        self.max_linkage
    }

    /// Linkage distance between two clusters of item indices.
    fn cluster_distance(&self, matrix: &DistanceMatrix, a: &[usize], b: &[usize]) -> f64 {
        let pairs = a.iter().flat_map(|&i| b.iter().map(move |&j| (i, j)));
        match self.linkage {
            Linkage::Single => pairs
                .map(|(i, j)| matrix.get(i, j))
                .fold(f64::INFINITY, f64::min),
            Linkage::Complete => pairs.map(|(i, j)| matrix.get(i, j)).fold(0.0, f64::max),
            Linkage::Average => {
                let count = a.len() * b.len();
                if count == 0 {
                    return 0.0;
                }
                pairs.map(|(i, j)| matrix.get(i, j)).sum::<f64>() / count as f64
            }
        }
    }

    /// Every clustering from all singletons down to one cluster.
    fn merge_history(&self, matrix: &DistanceMatrix) -> Vec<Step> {
        let mut clusters: Clustering = (0..matrix.len()).map(|i| vec![i]).collect();
        let mut history = vec![Step {
            clustering: clusters.clone(),
            linkage: 0.0,
        }];

        while clusters.len() > 1 {
            let mut closest = (0, 1);
            let mut min = f64::INFINITY;
            for i in 0..clusters.len() {
                for j in (i + 1)..clusters.len() {
                    let d = self.cluster_distance(matrix, &clusters[i], &clusters[j]);
                    if d < min {
                        min = d;
                        closest = (i, j);
                    }
                }
            }

            let (i, j) = closest;
            let second = clusters.remove(j);
            let mut merged = clusters.remove(i);
            merged.extend(second);
            clusters.push(merged);
            history.push(Step {
                clustering: clusters.clone(),
                linkage: min,
            });
        }

        history
    }

    /// Sum of linkage distances over every pair of clusters.
    fn score(&self, matrix: &DistanceMatrix, clustering: &Clustering) -> f64 {
        let mut total = 0.0;
        for i in 0..clustering.len() {
            for j in (i + 1)..clustering.len() {
                total += self.cluster_distance(matrix, &clustering[i], &clustering[j]);
            }
        }
        total
    }

    /// Lowest scoring clustering reachable within `max_linkage`, with its score.
    fn best_clustering(&self, matrix: &DistanceMatrix) -> (f64, Clustering) {
        let mut best: Option<(f64, Clustering)> = None;
        for step in self.merge_history(matrix) {
            // Every later entry builds on this merge
            if step.linkage > self.max_linkage {
                break;
            }
            let score = self.score(matrix, &step.clustering);
            if best.as_ref().map_or(true, |(s, _)| score <= *s) {
                best = Some((score, step.clustering));
            }
        }

        best.unwrap_or_default()
    }

    fn cluster<T: Segment>(&self, items: Vec<T>) -> Vec<T> {
        if items.len() <= 1 {
            return items;
        }

        let matrix = DistanceMatrix::compute(&items, DistanceMeasure::Dtw);
        let (score, groups) = self.best_clustering(&matrix);

        log::debug!(
            "[Hierarchical] {} items -> {} clusters ({} linkage, score {:.4})",
            items.len(),
            groups.len(),
            self.linkage,
            score
        );

        take_groups(items, &groups)
            .into_iter()
            .filter_map(|members| {
                let mut members = members.into_iter();
                let mut representative = members.next()?;
                for member in members {
                    representative.absorb(member);
                }
                Some(representative)
            })
            .collect()
    }
}

impl ClusteringAlgorithm for Hierarchical {
    fn name(&self) -> &'static str {
        "Hierarchical"
    }

    fn reference_point(&self) -> Coordinate {
        self.reference_point
    }

    fn process_ingresses(&self, ingresses: Vec<Ingress>) -> Vec<Ingress> {
        self.cluster(ingresses)
    }

    fn process_egresses(&self, egresses: Vec<Egress>) -> Vec<Egress> {
        self.cluster(egresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Path, Point};

    fn segment<T: Segment>(id: &str, lng: f64) -> T {
        T::from_path(Path::from_points((0..3).map(|i| {
            Point::at(id, Coordinate::new(47.0 + i as f64 * 0.001, lng), 0)
        })))
    }

    fn hierarchical(linkage: Linkage) -> Hierarchical {
        Hierarchical::new(Coordinate::new(47.0, 19.0), linkage, DEFAULT_MAX_LINKAGE)
    }

    const LINKAGES: [Linkage; 3] = [Linkage::Single, Linkage::Complete, Linkage::Average];

    #[test]
    fn test_two_groups_are_separated() {
        for linkage in LINKAGES {
            let items: Vec<Egress> = vec![
                segment("w1", 19.0),
                segment("e1", 19.1),
                segment("w2", 19.00001),
                segment("e2", 19.10001),
            ];
            let out = hierarchical(linkage).process_egresses(items);

            let mut ids: Vec<_> = out.iter().map(|e| e.path.id().unwrap()).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec!["e1", "w1"], "linkage {}", linkage);
        }
    }

    #[test]
    fn test_representative_is_first_member_and_absorbs() {
        let mut items: Vec<Ingress> = vec![
            segment("w1", 19.0),
            segment("e1", 19.1),
            segment("w2", 19.00001),
            segment("e2", 19.10001),
        ];
        for item in &mut items {
            let id = item.path.id().unwrap().to_string();
            item.add_egress(segment(&id, 19.2));
        }

        let out = hierarchical(Linkage::Average).process_ingresses(items);

        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().map(|i| i.egresses.len()).sum::<usize>(), 4);
        for ingress in &out {
            assert_eq!(ingress.egresses.len(), 2);
            assert_eq!(ingress.egresses[0].path.id(), ingress.path.id());
        }
    }

    #[test]
    fn test_single_item_passes_through() {
        let items: Vec<Egress> = vec![segment("only", 19.0)];
        let out = hierarchical(Linkage::Single).process_egresses(items.clone());
        assert_eq!(out, items);

        let none: Vec<Egress> = Vec::new();
        assert!(hierarchical(Linkage::Single).process_egresses(none).is_empty());
    }

    #[test]
    fn test_merge_history_ends_in_one_cluster() {
        let items: Vec<Egress> = vec![
            segment("a", 19.0),
            segment("b", 19.001),
            segment("c", 19.01),
        ];
        let matrix = DistanceMatrix::compute(&items, DistanceMeasure::Dtw);
        let history = hierarchical(Linkage::Single).merge_history(&matrix);

        let sizes: Vec<usize> = history.iter().map(|s| s.clustering.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);
        // a and b are closest and merge first
        assert_eq!(history[1].clustering, vec![vec![2], vec![0, 1]]);
        assert_eq!(history[1].linkage, matrix.get(0, 1));
        assert!(history[2].linkage > history[1].linkage);
    }

    #[test]
    fn test_near_identical_pair_merges() {
        for linkage in LINKAGES {
            let items: Vec<Egress> = vec![segment("a", 19.0), segment("b", 19.00001)];
            let out = hierarchical(linkage).process_egresses(items);

            assert_eq!(out.len(), 1, "linkage {}", linkage);
            assert_eq!(out[0].path.id(), Some("a"));
        }
    }

    #[test]
    fn test_identical_pair_merges() {
        let items: Vec<Egress> = vec![segment("a", 19.0), segment("b", 19.0)];
        assert_eq!(hierarchical(Linkage::Single).process_egresses(items).len(), 1);
    }

    #[test]
    fn test_four_groups_stay_apart() {
        for linkage in LINKAGES {
            let items: Vec<Egress> = vec![
                segment("a1", 19.0),
                segment("b1", 19.1),
                segment("c1", 19.2),
                segment("d1", 19.3),
                segment("a2", 19.00001),
                segment("b2", 19.10001),
                segment("c2", 19.20001),
                segment("d2", 19.30001),
            ];
            let out = hierarchical(linkage).process_egresses(items);

            let mut ids: Vec<_> = out.iter().map(|e| e.path.id().unwrap()).collect();
            ids.sort_unstable();
            assert_eq!(ids, vec!["a1", "b1", "c1", "d1"], "linkage {}", linkage);
        }
    }

    #[test]
    fn test_chosen_entry_score() {
        let items: Vec<Egress> = vec![
            segment("a", 19.0),
            segment("b", 19.1),
            segment("c", 19.00001),
        ];
        let matrix = DistanceMatrix::compute(&items, DistanceMeasure::Dtw);
        let algorithm = hierarchical(Linkage::Complete);

        let (score, clustering) = algorithm.best_clustering(&matrix);

        assert_eq!(clustering, vec![vec![1], vec![0, 2]]);
        let expected = matrix.get(1, 0).max(matrix.get(1, 2));
        assert!((score - expected).abs() < 1e-12);
        // The finer start state scores higher
        let start = vec![vec![0], vec![1], vec![2]];
        assert!(algorithm.score(&matrix, &start) > score);
    }

    #[test]
    fn test_max_linkage_controls_the_cut() {
        let items: Vec<Egress> = vec![segment("a", 19.0), segment("b", 19.1)];
        let matrix = DistanceMatrix::compute(&items, DistanceMeasure::Dtw);
        let reference = Coordinate::new(47.0, 19.0);

        let strict = Hierarchical::new(reference, Linkage::Single, DEFAULT_MAX_LINKAGE);
        assert_eq!(strict.best_clustering(&matrix).1.len(), 2);

        let loose = Hierarchical::new(reference, Linkage::Single, 100.0);
        let (score, clustering) = loose.best_clustering(&matrix);
        assert_eq!(clustering, vec![vec![0, 1]]);
        assert_eq!(score, 0.0);
    }
}

//! Density-based clustering (DBSCAN) over path distances.
//!
//! Items are visited in input order. An unclustered item whose neighborhood
//! (every item within `eps`, itself included) holds at least `min_pts`
//! members seeds a cluster, which then grows through every neighbor whose
//! own neighborhood is dense enough. Items that never join a cluster are
//! noise and are dropped.
//!
//! Membership is tracked by index, so two identical paths are still two
//! members.

use super::{take_groups, ClusteringAlgorithm, DistanceMatrix, Representative};
use crate::distance::DistanceMeasure;
use crate::paths::combine_paths;
use crate::{Coordinate, Egress, Ingress, Path, Segment};

pub struct Dbscan {
    reference_point: Coordinate,
    measure: DistanceMeasure,
    eps: f64,
    min_pts: usize,
    representative: Representative,
}

impl Dbscan {
    pub fn new(
        reference_point: Coordinate,
        measure: DistanceMeasure,
        eps: f64,
        min_pts: usize,
        representative: Representative,
    ) -> Self {
        Self {
            reference_point,
            measure,
            eps,
            min_pts,
            representative,
        }
    }

    /// Indices of every item within `eps` of item `i`, in input order.
    fn neighbors(&self, matrix: &DistanceMatrix, i: usize) -> Vec<usize> {
        (0..matrix.len())
            .filter(|&j| matrix.get(i, j) <= self.eps)
            .collect()
    }

    /// Cluster membership as index groups, in discovery order.
    fn find_clusters(&self, matrix: &DistanceMatrix) -> Vec<Vec<usize>> {
        let n = matrix.len();
        let mut clustered = vec![false; n];
        let mut clusters = Vec::new();

        for seed in 0..n {
            if clustered[seed] {
                continue;
            }

            let mut frontier = self.neighbors(matrix, seed);
            if frontier.len() < self.min_pts {
                continue;
            }

            let mut cluster = vec![seed];
            clustered[seed] = true;

            let mut k = 0;
            while k < frontier.len() {
                let candidate = frontier[k];
                k += 1;
                if clustered[candidate] {
                    continue;
                }

                let reach = self.neighbors(matrix, candidate);
                if reach.len() >= self.min_pts {
                    frontier.extend(reach);
                }

                cluster.push(candidate);
                clustered[candidate] = true;
            }

            clusters.push(cluster);
        }

        clusters
    }

    /// Reduce a cluster to one segment that has absorbed every member.
    fn collapse<T: Segment>(&self, members: Vec<T>) -> T {
        let mut representative = match self.representative {
            Representative::Longest => longest(&members)
                .map(|i| T::from_path(members[i].path().clone()))
                .unwrap_or_else(T::placeholder),
            Representative::Combined => {
                let paths: Vec<Path> = members.iter().map(|m| m.path().clone()).collect();
                T::from_path(combine_paths(&paths))
            }
        };

        for member in members {
            representative.absorb(member);
        }
        representative
    }

    fn cluster<T: Segment>(&self, items: Vec<T>) -> Vec<T> {
        let matrix = DistanceMatrix::compute(&items, self.measure);
        let groups = self.find_clusters(&matrix);

        let clustered: usize = groups.iter().map(Vec::len).sum();
        log::debug!(
            "[DBSCAN] {} items -> {} clusters ({} noise)",
            items.len(),
            groups.len(),
            items.len() - clustered
        );

        take_groups(items, &groups)
            .into_iter()
            .map(|members| self.collapse(members))
            .collect()
    }
}

/// Index of the first member with the greatest positive arc length.
fn longest<T: Segment>(members: &[T]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, member) in members.iter().enumerate() {
        let length = member.path().length();
        let current = best.map_or(0.0, |(_, l)| l);
        if length > current {
            best = Some((i, length));
        }
    }
    best.map(|(i, _)| i)
}

impl ClusteringAlgorithm for Dbscan {
    fn name(&self) -> &'static str {
        "DBSCAN"
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

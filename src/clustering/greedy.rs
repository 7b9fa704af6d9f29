//! Greedy pairwise merging on average distance and average heading.
//!
//! Two paths are mergeable when, after both are interpolated to the same
//! point count, their average point-to-point distance is within
//! `diff_distance` km and their average headings differ by at most
//! `diff_heading` degrees. Pairs are examined in a fixed order: for each
//! survivor `i`, every other survivor from the back of the list towards the
//! front. A mergeable `j` is absorbed into `i` and removed immediately, so
//! the result depends on input order.

use super::ClusteringAlgorithm;
use crate::distance::INFINITE_DISTANCE;
use crate::paths::interpolate;
use crate::{Coordinate, Egress, Ingress, Path, Segment};

pub struct GreedyMerge {
    reference_point: Coordinate,
    diff_distance: f64,
    diff_heading: f64,
    num_points: usize,
}

/// Comparison view of one path, computed once per pass.
struct Profile {
    condensed: Path,
    heading: f64,
}

impl Profile {
    fn new(path: &Path, num_points: usize) -> Self {
        let condensed = interpolate(path, num_points);
        let heading = average_heading(&condensed);
        Self { condensed, heading }
    }
}

/// Mean, over the points of `a`, of each point's mean distance to every point of `b`.
///
/// Returns [`INFINITE_DISTANCE`] when either path is empty.
pub fn average_distance(a: &Path, b: &Path) -> f64 {
    if a.is_empty() || b.is_empty() {
        return INFINITE_DISTANCE;
    }

    let total: f64 = a
        .points()
        .iter()
        .map(|p| {
            b.points()
                .iter()
                .map(|q| p.position.distance(&q.position))
                .sum::<f64>()
                / b.len() as f64
        })
        .sum();

    total / a.len() as f64
}

/// Arithmetic mean of the point headings; 0 for an empty path.
pub fn average_heading(path: &Path) -> f64 {
    if path.is_empty() {
        return 0.0;
    }
    path.points().iter().map(|p| p.heading).sum::<f64>() / path.len() as f64
}

impl GreedyMerge {
    pub fn new(
        reference_point: Coordinate,
        diff_distance: f64,
        diff_heading: f64,
        num_points: usize,
    ) -> Self {
        Self {
            reference_point,
            diff_distance,
            diff_heading,
            num_points,
        }
    }

    /// Whether two paths describe the same structure.
    pub fn is_mergeable(&self, a: &Path, b: &Path) -> bool {
        let a = Profile::new(a, self.num_points);
        let b = Profile::new(b, self.num_points);
        self.profiles_match(&a, &b)
    }

    fn profiles_match(&self, a: &Profile, b: &Profile) -> bool {
        average_distance(&a.condensed, &b.condensed) <= self.diff_distance
            && (a.heading - b.heading).abs() <= self.diff_heading
    }

    fn merge_all<T: Segment>(&self, mut items: Vec<T>) -> Vec<T> {
        let initial = items.len();
        let mut profiles: Vec<Profile> = items
            .iter()
            .map(|item| Profile::new(item.path(), self.num_points))
            .collect();

        for i in 0..initial {
            if i >= items.len() {
                break;
            }

            let mut j = items.len();
            while j > 0 {
                j -= 1;
                if i >= items.len() {
                    break;
                }
                if i == j {
                    continue;
                }

                if self.profiles_match(&profiles[i], &profiles[j]) {
                    // Absorb into the item at i, then close the gap left by j
                    let absorbed = items.remove(j);
                    profiles.remove(j);
                    let target = if j < i { i - 1 } else { i };
                    items[target].absorb(absorbed);
                }
            }
        }

        log::debug!(
            "[GreedyMerge] {} items -> {} after merging",
            initial,
            items.len()
        );
        items
    }
}

impl ClusteringAlgorithm for GreedyMerge {
    fn name(&self) -> &'static str {
        "GreedyMerge"
    }

    fn reference_point(&self) -> Coordinate {
        self.reference_point
    }

    fn process_ingresses(&self, ingresses: Vec<Ingress>) -> Vec<Ingress> {
        self.merge_all(ingresses)
    }

    fn process_egresses(&self, egresses: Vec<Egress>) -> Vec<Egress> {
        self.merge_all(egresses)
    }
}

//! # Clustering Strategies
//!
//! Groups structurally similar paths and collapses every group to a single
//! representative.
//!
//! ## Pipeline
//! 1. Split every input path at its point closest to the reference point,
//!    giving one [`Ingress`] carrying one [`Egress`] per path
//! 2. Cluster the ingresses ([`ClusteringAlgorithm::process_ingresses`])
//! 3. Cluster the accumulated egresses of every surviving ingress
//!    ([`ClusteringAlgorithm::process_egresses`])
//!
//! ## Strategies
//! - [`Dbscan`] - density-based, representative is the longest member
//! - [`Hierarchical`] - agglomerative with single/complete/average linkage
//! - [`GreedyMerge`] - order-dependent pairwise merging on heading and distance
//!
//! Strategies are built by [`create_algorithm`], which validates all
//! parameters up front. Nothing fails once a strategy exists: empty paths
//! are carried as incomparable outliers.

mod dbscan;
mod greedy;
mod hierarchical;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::distance::DistanceMeasure;
use crate::error::{MapCreatorError, Result};
use crate::paths::{split_path, DEFAULT_INTERPOLATION_POINTS};
use crate::{Coordinate, Egress, Ingress, Map, Path, Segment};

pub use dbscan::Dbscan;
pub use greedy::{average_distance, average_heading, GreedyMerge};
pub use hierarchical::{Hierarchical, DEFAULT_MAX_LINKAGE};

/// A clustering strategy.
///
/// Implementors supply the two clustering hooks; splitting and map assembly
/// are shared.
pub trait ClusteringAlgorithm: Send + Sync {
    /// Short strategy name used in logs.
    fn name(&self) -> &'static str;

    /// Point every path is split and ranged against.
    fn reference_point(&self) -> Coordinate;

    fn process_ingresses(&self, ingresses: Vec<Ingress>) -> Vec<Ingress>;

    fn process_egresses(&self, egresses: Vec<Egress>) -> Vec<Egress>;

    /// Split, cluster ingresses, then cluster each survivor's egresses.
    fn process(&self, paths: Vec<Path>) -> Map {
        let reference = self.reference_point();

        let ingresses: Vec<Ingress> = paths
            .into_iter()
            .map(|path| {
                let (mut ingress, egress) = split_path(&reference, path);
                ingress.add_egress(egress);
                ingress
            })
            .collect();

        let input_count = ingresses.len();
        let mut ingresses = self.process_ingresses(ingresses);

        for ingress in &mut ingresses {
            let egresses = std::mem::take(&mut ingress.egresses);
            ingress.egresses = self.process_egresses(egresses);
        }

        log::debug!(
            "[{}] {} paths -> {} ingresses, {} egresses",
            self.name(),
            input_count,
            ingresses.len(),
            ingresses.iter().map(|i| i.egresses.len()).sum::<usize>()
        );

        Map::new(reference, ingresses)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// How a density cluster is reduced to one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representative {
    /// Longest member by arc length
    #[default]
    Longest,
    /// Synthetic average built by [`crate::paths::combine_paths`]
    Combined,
}

/// Inter-cluster distance for agglomerative clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum pairwise DTW
    Single,
    /// Maximum pairwise DTW
    Complete,
    /// Mean pairwise DTW
    Average,
}

impl FromStr for Linkage {
    type Err = MapCreatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            other => Err(MapCreatorError::config(format!("invalid linkage: {}", other))),
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::Single => write!(f, "single"),
            Linkage::Complete => write!(f, "complete"),
            Linkage::Average => write!(f, "average"),
        }
    }
}

/// Strategy name plus its strategy-specific parameters.
///
/// Deserializes from `{"type": "dbscan", "eps": .., "min_pts": ..}`,
/// `{"type": "hierarchical", "linkage": .., "max_linkage": ..}` or
/// `{"type": "greedy", "diff_dist": .., "diff_head": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AlgorithmConfig {
    Dbscan {
        /// Neighborhood radius under the configured distance measure
        eps: f64,
        /// Minimum neighborhood size for a cluster seed
        min_pts: usize,
        #[serde(default)]
        representative: Representative,
    },
    Hierarchical {
        linkage: Linkage,
        /// Largest linkage distance at which clusters still merge,
        /// [`DEFAULT_MAX_LINKAGE`] when absent
        #[serde(default = "default_max_linkage")]
        max_linkage: f64,
    },
    #[serde(alias = "myalgorithm")]
    Greedy {
        /// Maximum average point distance between mergeable paths (km)
        diff_dist: f64,
        /// Maximum average heading difference between mergeable paths (degrees)
        diff_head: f64,
        /// Point count paths are interpolated to before comparison,
        /// [`DEFAULT_INTERPOLATION_POINTS`] when unset
        #[serde(default, skip_serializing_if = "Option::is_none")]
        num_points: Option<usize>,
    },
}

fn default_max_linkage() -> f64 {
    DEFAULT_MAX_LINKAGE
}

impl AlgorithmConfig {
    /// Parse a strategy configuration from a JSON value.
    ///
    /// Unknown strategy names and missing parameters are configuration errors.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| MapCreatorError::config(format!("invalid algorithm: {}", e)))
    }
}

fn require_threshold(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(MapCreatorError::config(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )))
    }
}

/// Build a clustering strategy, validating its parameters.
pub fn create_algorithm(
    config: &AlgorithmConfig,
    reference_point: Coordinate,
    measure: DistanceMeasure,
) -> Result<Box<dyn ClusteringAlgorithm>> {
    let algorithm: Box<dyn ClusteringAlgorithm> = match *config {
        AlgorithmConfig::Dbscan {
            eps,
            min_pts,
            representative,
        } => {
            require_threshold("eps", eps)?;
            Box::new(Dbscan::new(
                reference_point,
                measure,
                eps,
                min_pts,
                representative,
            ))
        }
        AlgorithmConfig::Hierarchical {
            linkage,
            max_linkage,
        } => {
            require_threshold("max_linkage", max_linkage)?;
            Box::new(Hierarchical::new(reference_point, linkage, max_linkage))
        }
        AlgorithmConfig::Greedy {
            diff_dist,
            diff_head,
            num_points,
        } => {
            require_threshold("diff_dist", diff_dist)?;
            require_threshold("diff_head", diff_head)?;
            let num_points = num_points.unwrap_or(DEFAULT_INTERPOLATION_POINTS);
            if num_points < 2 {
                return Err(MapCreatorError::config(format!(
                    "num_points must be at least 2, got {}",
                    num_points
                )));
            }
            Box::new(GreedyMerge::new(
                reference_point,
                diff_dist,
                diff_head,
                num_points,
            ))
        }
    };

    log::info!(
        "[Clustering] Created {} strategy (measure: {})",
        algorithm.name(),
        measure
    );
    Ok(algorithm)
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Dense pairwise distance matrix over a slice of segments.
pub(crate) struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub(crate) fn compute<T: Segment>(items: &[T], measure: DistanceMeasure) -> Self {
        let n = items.len();
        let row = |i: usize| -> Vec<f64> {
            (0..n)
                .map(|j| measure.distance(items[i].path(), items[j].path()))
                .collect()
        };

        #[cfg(feature = "parallel")]
        let rows: Vec<Vec<f64>> = (0..n).into_par_iter().map(row).collect();

        #[cfg(not(feature = "parallel"))]
        let rows: Vec<Vec<f64>> = (0..n).map(row).collect();

        Self {
            n,
            values: rows.into_iter().flatten().collect(),
        }
    }

    #[inline]
    pub(crate) fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }

    pub(crate) fn len(&self) -> usize {
        self.n
    }
}

/// Move the members of each index group out of `items`, in group order.
///
/// Every index must appear in at most one group. Items not referenced by
/// any group are dropped.
pub(crate) fn take_groups<T>(items: Vec<T>, groups: &[Vec<usize>]) -> Vec<Vec<T>> {
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    groups
        .iter()
        .map(|group| group.iter().filter_map(|&i| slots[i].take()).collect())
        .collect()
}

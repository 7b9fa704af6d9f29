//! # Process Configuration
//!
//! JSON configuration for one intersection, and builders that turn it into
//! a ready [`Processor`] or [`Aggregator`].
//!
//! ```json
//! {
//!   "reference_point": {"latitude": 47.48024, "longitude": 19.03635},
//!   "dist_func": "dtw",
//!   "algorithm": {"type": "dbscan", "eps": 0.05, "min_pts": 2},
//!   "preprocessor": {"range": 0.1, "num_points": 10},
//!   "rsu": {
//!     "update_time": {"enabled": true, "value": 5.0},
//!     "time_window": {"enabled": true, "value": 60.0}
//!   }
//! }
//! ```
//!
//! Keys belonging to transports and servers (`feeder`, `debug_server`,
//! `log_level`, ...) are ignored.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::aggregator::{Aggregator, AggregatorConfig};
use crate::clustering::{create_algorithm, AlgorithmConfig, ClusteringAlgorithm};
use crate::distance::DistanceMeasure;
use crate::error::{MapCreatorError, Result};
use crate::processor::{Preprocessor, Processor};
use crate::Coordinate;

/// Range filter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Maximum distance from the reference point in kilometers
    pub range: f64,
    /// Interpolation target for greedy merging when the algorithm section
    /// does not set its own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_points: Option<usize>,
}

/// A value that only applies when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Toggle {
    pub enabled: bool,
    pub value: f64,
}

impl Toggle {
    pub fn get(&self) -> Option<f64> {
        self.enabled.then_some(self.value)
    }
}

/// Aggregator cadence, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RsuConfig {
    #[serde(default)]
    pub update_time: Option<Toggle>,
    #[serde(default)]
    pub time_window: Option<Toggle>,
}

/// Complete configuration for one intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapCreatorConfig {
    pub reference_point: Coordinate,
    #[serde(default)]
    pub dist_func: DistanceMeasure,
    pub algorithm: AlgorithmConfig,
    pub preprocessor: PreprocessorConfig,
    #[serde(default)]
    pub rsu: RsuConfig,
}

impl MapCreatorConfig {
    /// Parse and validate a configuration document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MapCreatorError::config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        log::info!("[Config] Loaded {}", path.as_ref().display());
        Self::from_json_str(&json)
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<()> {
        let range = self.preprocessor.range;
        if !range.is_finite() || range < 0.0 {
            return Err(MapCreatorError::config(format!(
                "preprocessor range must be a non-negative number, got {}",
                range
            )));
        }

        for (name, toggle) in [
            ("update_time", self.rsu.update_time),
            ("time_window", self.rsu.time_window),
        ] {
            if let Some(value) = toggle.and_then(|t| t.get()) {
                if !value.is_finite() || value < 0.0 {
                    return Err(MapCreatorError::config(format!(
                        "rsu {} must be a non-negative number of seconds, got {}",
                        name, value
                    )));
                }
            }
        }
        Ok(())
    }

    /// The algorithm section, with the preprocessor's point count filled in
    /// for greedy merging when the algorithm does not set one.
    pub fn algorithm_config(&self) -> AlgorithmConfig {
        match self.algorithm.clone() {
            AlgorithmConfig::Greedy {
                diff_dist,
                diff_head,
                num_points,
            } => AlgorithmConfig::Greedy {
                diff_dist,
                diff_head,
                num_points: num_points.or(self.preprocessor.num_points),
            },
            other => other,
        }
    }

    pub fn build_algorithm(&self) -> Result<Box<dyn ClusteringAlgorithm>> {
        create_algorithm(&self.algorithm_config(), self.reference_point, self.dist_func)
    }

    pub fn build_preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.reference_point, self.preprocessor.range)
    }

    pub fn build_processor(&self) -> Result<Processor> {
        Ok(Processor::new(
            self.build_algorithm()?,
            self.build_preprocessor(),
            self.dist_func,
        ))
    }

    pub fn aggregator_config(&self) -> AggregatorConfig {
        AggregatorConfig {
            time_window: self.rsu.time_window.and_then(|t| t.get()),
            update_interval: self.rsu.update_time.and_then(|t| t.get()),
        }
    }

    pub fn build_aggregator(&self) -> Result<Aggregator> {
        Ok(Aggregator::new(
            self.build_processor()?,
            self.aggregator_config(),
        ))
    }
}

//! Presentation form of a [`Map`] for publish sinks and shutdown dumps.
//!
//! Ids, timestamps and headings are stripped; every path becomes a bare
//! list of `{latitude, longitude}` pairs:
//!
//! ```json
//! {
//!   "ref_point": {"latitude": 47.05889, "longitude": 15.44551},
//!   "range": 0.1,
//!   "ingresses": [
//!     {"points": [{"latitude": .., "longitude": ..}], "egresses": [[{..}, {..}]]}
//!   ]
//! }
//! ```

use std::fs;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{Coordinate, Ingress, Map};

/// One ingress with its egresses, as coordinate lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressSnapshot {
    pub points: Vec<Coordinate>,
    pub egresses: Vec<Vec<Coordinate>>,
}

impl IngressSnapshot {
    fn from_ingress(ingress: &Ingress) -> Self {
        Self {
            points: ingress.path.coordinates(),
            egresses: ingress
                .egresses
                .iter()
                .map(|e| e.path.coordinates())
                .collect(),
        }
    }
}

/// Serializable view of a map plus the range it was built with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub ref_point: Coordinate,
    /// Preprocessing range in kilometers
    pub range: f64,
    pub ingresses: Vec<IngressSnapshot>,
}

impl MapSnapshot {
    pub fn from_map(map: &Map, range: f64) -> Self {
        Self {
            ref_point: map.reference_point,
            range,
            ingresses: map
                .ingresses
                .iter()
                .map(IngressSnapshot::from_ingress)
                .collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Write the snapshot as pretty-printed JSON, replacing any existing file.
    pub fn write_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        log::info!("[Snapshot] Wrote map to {}", path.as_ref().display());
        Ok(())
    }

    pub fn read_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

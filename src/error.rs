//! Unified error handling for the map-creator library.
//!
//! Only configuration and I/O problems are surfaced as errors. Data-shape
//! problems (a point with a foreign id, an empty path, a contended lock) are
//! recovered locally and never reach the caller as an `Err`.

use std::fmt;

/// Unified error type for map-creator operations.
#[derive(Debug, Clone)]
pub enum MapCreatorError {
    /// Missing or invalid clustering, preprocessing or aggregator parameter
    ConfigError { message: String },
    /// Reading configuration or writing a snapshot failed
    IoError { message: String },
    /// JSON encoding or decoding failed
    SerializationError { message: String },
    /// Generic internal error
    Internal { message: String },
}

impl MapCreatorError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        MapCreatorError::ConfigError {
            message: message.into(),
        }
    }
}

impl fmt::Display for MapCreatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapCreatorError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            MapCreatorError::IoError { message } => {
                write!(f, "I/O error: {}", message)
            }
            MapCreatorError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
            MapCreatorError::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for MapCreatorError {}

impl From<std::io::Error> for MapCreatorError {
    fn from(err: std::io::Error) -> Self {
        MapCreatorError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MapCreatorError {
    fn from(err: serde_json::Error) -> Self {
        MapCreatorError::SerializationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for map-creator operations.
pub type Result<T> = std::result::Result<T, MapCreatorError>;

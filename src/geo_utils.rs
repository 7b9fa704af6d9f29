//! # Geographic Utilities
//!
//! Spherical geometry used throughout the map inference pipeline.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two coordinates (km) |
//! | [`heading`] | Initial compass bearing from one coordinate to another |
//! | [`destination`] | Forward projection by distance and bearing |
//! | [`polyline_length`] | Total length of a point sequence (km) |
//! | [`compute_bounds`] | Bounding box of a set of coordinates |
//!
//! ## Algorithm Notes
//!
//! All formulas assume a spherical Earth of radius [`EARTH_RADIUS_KM`]
//! (6373 km), not the mean radius `geo::Haversine` uses. Clustering `eps`,
//! merge thresholds and the preprocessing range are all expressed against it.
//!
//! Inputs are not validated. NaN propagates.
//!
//! ```rust
//! use map_creator::{Coordinate, geo_utils};
//!
//! let a = Coordinate::new(47.47085, 19.05291);
//! let b = Coordinate::new(47.47312, 19.06369);
//!
//! let km = geo_utils::haversine_distance(&a, &b);
//! assert!((km - 0.84866).abs() < 0.001);
//! ```

use geo::{BoundingRect, MultiPoint, Point as GeoPoint};

use crate::{Coordinate, Point};

/// Sphere radius used by every distance computation, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6373.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two coordinates in kilometers (haversine).
#[inline]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lon1 = a.longitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let lon2 = b.longitude.to_radians();

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial compass bearing from `a` to `b` in degrees, normalized to `[0, 360)`.
pub fn heading(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Project `origin` forward by `distance_km` along the initial bearing `heading_deg`.
///
/// Longitude of the result is normalized to `[-180, 180)`.
pub fn destination(origin: &Coordinate, distance_km: f64, heading_deg: f64) -> Coordinate {
    let lat1 = origin.latitude.to_radians();
    let lon1 = origin.longitude.to_radians();
    let angular = distance_km / EARTH_RADIUS_KM;
    let bearing = heading_deg.to_radians();

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * angular.sin() * lat1.cos())
            .atan2(angular.cos() - lat1.sin() * lat2.sin());
    let lon2 = (lon2 + 3.0 * std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI)
        - std::f64::consts::PI;

    Coordinate::new(lat2.to_degrees(), lon2.to_degrees())
}

/// Total length of a point sequence in kilometers.
///
/// Empty or single-point sequences return 0.0.
pub fn polyline_length(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0].position, &w[1].position))
        .sum()
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

/// Compute the union bounding box of a set of coordinates.
///
/// Returns `None` for empty input.
pub fn compute_bounds<'a, I>(coordinates: I) -> Option<Bounds>
where
    I: IntoIterator<Item = &'a Coordinate>,
{
    let multi: MultiPoint<f64> = coordinates
        .into_iter()
        .map(|c| GeoPoint::new(c.longitude, c.latitude))
        .collect::<Vec<_>>()
        .into();

    multi.bounding_rect().map(|rect| Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

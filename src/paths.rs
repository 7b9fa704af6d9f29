//! Path operations: splitting, key-point reduction, interpolation and combination.
//!
//! These are the building blocks shared by the preprocessor and every
//! clustering strategy.

use crate::geo_utils::compute_bounds;
use crate::{Coordinate, Egress, Ingress, Path, Point};

/// Minimum heading change (degrees) for an interior point to count as a corner.
pub const KEY_POINT_HEADING_CHANGE: f64 = 4.0;

/// Point count paths are interpolated to before greedy comparison.
pub const DEFAULT_INTERPOLATION_POINTS: usize = 50;

/// Index of the point closest to `target`. The first of equally close points wins.
pub fn closest_index(target: &Coordinate, points: &[Point]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, point) in points.iter().enumerate() {
        let d = target.distance(&point.position);
        match best {
            Some((_, min)) if d >= min => {}
            _ => best = Some((i, d)),
        }
    }

    best.map(|(i, _)| i)
}

/// The point closest to `target`, or `None` for an empty slice.
pub fn closest_point<'a>(target: &Coordinate, points: &'a [Point]) -> Option<&'a Point> {
    closest_index(target, points).map(|i| &points[i])
}

/// Split `path` at its point closest to `splitter`.
///
/// Every point up to and including the closest one goes to the ingress, the
/// remainder to the egress. Points move over unchanged, so concatenating the
/// two halves yields the original sequence. Attaching the egress to the
/// ingress is left to the caller.
pub fn split_path(splitter: &Coordinate, path: Path) -> (Ingress, Egress) {
    let id = path.id().map(str::to_string);
    let mut points = path.into_points();

    let split_at = closest_index(splitter, &points).map_or(0, |i| i + 1);
    let tail = points.split_off(split_at);

    (
        Ingress::from_path(Path::from_parts(id.clone(), points)),
        Egress::from_path(Path::from_parts(id, tail)),
    )
}

/// Reduce a path to its corners.
///
/// The first and last points are always kept. An interior point survives
/// only if its heading differs from its predecessor's by more than
/// [`KEY_POINT_HEADING_CHANGE`]. Paths of two points or fewer are returned
/// as they are.
pub fn reduce_to_key_points(path: &Path) -> Path {
    let points = path.points();
    if points.len() <= 2 {
        return path.clone();
    }

    let mut reduced = Path::new();
    reduced.push(points[0].clone());

    for pair in points[..points.len() - 1].windows(2) {
        if (pair[1].heading - pair[0].heading).abs() > KEY_POINT_HEADING_CHANGE {
            reduced.push(pair[1].clone());
        }
    }

    if let Some(last) = points.last() {
        reduced.push(last.clone());
    }
    reduced
}

/// Resample a path to exactly `target_count` points at even arc-length steps.
///
/// The original first and last points are kept; interior points are
/// synthesized by projecting along each segment's bearing. Paths with fewer
/// than 2 points, zero length, or already at least `target_count` points are
/// returned unchanged.
pub fn interpolate(path: &Path, target_count: usize) -> Path {
    let points = path.points();
    if points.len() < 2 || points.len() >= target_count {
        return path.clone();
    }

    let total = path.length();
    if total <= 0.0 || !total.is_finite() {
        return path.clone();
    }

    let mut cumulative = Vec::with_capacity(points.len());
    let mut acc = 0.0;
    cumulative.push(acc);
    for w in points.windows(2) {
        acc += w[0].position.distance(&w[1].position);
        cumulative.push(acc);
    }

    let id = path.id().unwrap_or_default().to_string();
    let step = total / (target_count - 1) as f64;
    let last_segment = points.len() - 2;

    let mut out = Vec::with_capacity(target_count);
    out.push(points[0].clone());

    let mut seg = 0;
    for k in 1..target_count - 1 {
        let target = step * k as f64;
        while seg < last_segment && cumulative[seg + 1] < target {
            seg += 1;
        }

        let start = &points[seg];
        let end = &points[seg + 1];
        let bearing = start.position.heading(&end.position);
        let position = start
            .position
            .destination(target - cumulative[seg], bearing);

        out.push(Point::at(id.clone(), position, start.timestamp));
    }

    if let Some(last) = points.last() {
        out.push(last.clone());
    }

    Path::from_points(out)
}

/// Build a rough average trajectory from several paths.
///
/// Walks a diagonal grid across the union bounding box of all paths (in
/// micro-degrees, resolution twice the longest path's point count). At each
/// grid node the closest point of every path is taken and their positions
/// averaged; the average is appended when it differs from the previously
/// appended one.
///
/// Latitude and longitude advance together and the walk ends as soon as
/// either axis is exhausted. A box with no latitude extent (all inputs on
/// one parallel) therefore yields an empty path, and a box less than
/// `resolution` micro-degrees tall only visits the start of its longitude
/// range.
pub fn combine_paths(paths: &[Path]) -> Path {
    match paths {
        [] => return Path::new(),
        [single] => return single.clone(),
        _ => {}
    }

    let id = paths
        .iter()
        .find_map(|p| p.id())
        .unwrap_or_default()
        .to_string();

    let resolution = 2 * paths.iter().map(Path::len).max().unwrap_or(0) as i64;
    let coords: Vec<Coordinate> = paths.iter().flat_map(Path::coordinates).collect();
    let bounds = match compute_bounds(&coords) {
        Some(b) if resolution > 0 => b,
        _ => return Path::new(),
    };

    let min_lat = (bounds.min_lat * 1e6) as i64;
    let max_lat = (bounds.max_lat * 1e6) as i64;
    let min_lng = (bounds.min_lng * 1e6) as i64;
    let max_lng = (bounds.max_lng * 1e6) as i64;

    let step_lat = ((max_lat - min_lat) / resolution).max(1) as usize;
    let step_lng = ((max_lng - min_lng) / resolution).max(1) as usize;

    let candidates: Vec<&Path> = paths.iter().filter(|p| !p.is_empty()).collect();
    let mut combined = Path::new();

    let grid = (min_lat..max_lat)
        .step_by(step_lat)
        .zip((min_lng..max_lng).step_by(step_lng));

    for (lat, lng) in grid {
        let target = Coordinate::new(lat as f64 / 1e6, lng as f64 / 1e6);

        let closest: Vec<Coordinate> = candidates
            .iter()
            .filter_map(|p| closest_point(&target, p.points()))
            .map(|p| p.position)
            .collect();

        let n = closest.len() as f64;
        let average = Coordinate::new(
            closest.iter().map(|c| c.latitude).sum::<f64>() / n,
            closest.iter().map(|c| c.longitude).sum::<f64>() / n,
        );

        let is_new = combined
            .points()
            .last()
            .map_or(true, |p| p.position != average);
        if is_new {
            combined.push(Point::at(id.clone(), average, 0));
        }
    }

    combined
}

//! # Geographic Utilities
//!
//! Core geographic computation utilities for map-matching GPS fixes against a route.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`initial_bearing`] | Compass bearing from one point towards another |
//! | [`bearing_difference`] | Smallest absolute angle between two bearings |
//! | [`longitude_delta`] | Longitude change the short way round the antimeridian |
//! | [`interpolate`] | Point at a fraction along a segment |
//! | [`project_to_segment`] | Perpendicular projection of a point onto a segment |
//!
//! ## Example
//!
//! ```rust
//! use nav_session::{GpsPoint, geo_utils};
//!
//! let a = GpsPoint::new(51.5000, -0.1300);
//! let b = GpsPoint::new(51.5010, -0.1300);
//! let fix = GpsPoint::new(51.5005, -0.1299);
//!
//! let proj = geo_utils::project_to_segment(&fix, &a, &b);
//! assert!((proj.fraction - 0.5).abs() < 0.01);
//! assert!(proj.distance_m < 10.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances between arbitrary points use the haversine formula. Projection onto a
//! segment uses a local equirectangular frame centred on the projected point, which is
//! accurate to well under a meter for segments of a few kilometers, the scale at which
//! route polylines are cut.
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).

use geo::{Distance, Haversine, Point};
use crate::GpsPoint;

/// Mean earth radius used by the local projection, in meters.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use nav_session::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

// =============================================================================
// Direction Functions
// =============================================================================

/// Initial compass bearing from `from` towards `to`, in degrees in `[0, 360)`.
///
/// 0 is north, 90 is east. Returns 0.0 for coincident points.
pub fn initial_bearing(from: &GpsPoint, to: &GpsPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lng = (to.longitude - from.longitude).to_radians();

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();
    if x == 0.0 && y == 0.0 {
        return 0.0;
    }

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Smallest absolute difference between two bearings, in degrees in `[0, 180]`.
///
/// ```rust
/// use nav_session::geo_utils::bearing_difference;
///
/// assert_eq!(bearing_difference(350.0, 10.0), 20.0);
/// assert_eq!(bearing_difference(90.0, 270.0), 180.0);
/// ```
#[inline]
pub fn bearing_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

// =============================================================================
// Segment Functions
// =============================================================================

/// Point at `fraction` of the way from `a` to `b`.
///
/// Linear in latitude/longitude, which is indistinguishable from the geodesic at
/// route-segment scale.
#[inline]
pub fn interpolate(a: &GpsPoint, b: &GpsPoint, fraction: f64) -> GpsPoint {
    let t = fraction.clamp(0.0, 1.0);
    GpsPoint::new(
        a.latitude + (b.latitude - a.latitude) * t,
        wrap_longitude(a.longitude + longitude_delta(a.longitude, b.longitude) * t),
    )
}

/// Signed longitude change from `from` to `to` the short way round, in `[-180, 180)`.
#[inline]
pub fn longitude_delta(from: f64, to: f64) -> f64 {
    wrap_longitude(to - from)
}

#[inline]
fn wrap_longitude(longitude: f64) -> f64 {
    if (-180.0..180.0).contains(&longitude) {
        longitude
    } else {
        (longitude + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// Result of projecting a point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Position of the foot of the perpendicular along the segment, in `[0, 1]`
    pub fraction: f64,
    /// Distance from the point to its projection, in meters
    pub distance_m: f64,
}

/// Project `p` onto the segment `a`-`b`.
///
/// The foot of the perpendicular is clamped to the segment ends. Degenerate
/// (zero-length) segments project to `a` with fraction 0.
pub fn project_to_segment(p: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> SegmentProjection {
    let (ax, ay) = local_offset_m(p, a);
    let (bx, by) = local_offset_m(p, b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    let fraction = if len_sq <= f64::EPSILON {
        0.0
    } else {
        // p sits at the origin of the local frame
        ((-ax * dx - ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let fx = ax + dx * fraction;
    let fy = ay + dy * fraction;
    SegmentProjection {
        fraction,
        distance_m: (fx * fx + fy * fy).sqrt(),
    }
}

/// Offset of `p` from `origin` in meters (east, north), equirectangular approximation.
#[inline]
pub fn local_offset_m(origin: &GpsPoint, p: &GpsPoint) -> (f64, f64) {
    let lat_scale = origin.latitude.to_radians().cos();
    let x = longitude_delta(origin.longitude, p.longitude).to_radians() * EARTH_RADIUS_M * lat_scale;
    let y = (p.latitude - origin.latitude).to_radians() * EARTH_RADIUS_M;
    (x, y)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        // London to Paris is approximately 344 km
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_initial_bearing_cardinal() {
        let origin = GpsPoint::new(0.0, 0.0);
        assert!(approx_eq(initial_bearing(&origin, &GpsPoint::new(1.0, 0.0)), 0.0, 1e-6));
        assert!(approx_eq(initial_bearing(&origin, &GpsPoint::new(0.0, 1.0)), 90.0, 1e-6));
        assert!(approx_eq(initial_bearing(&origin, &GpsPoint::new(-1.0, 0.0)), 180.0, 1e-6));
        assert!(approx_eq(initial_bearing(&origin, &GpsPoint::new(0.0, -1.0)), 270.0, 1e-6));
        assert_eq!(initial_bearing(&origin, &origin), 0.0);
    }

    #[test]
    fn test_bearing_difference_wraps() {
        assert_eq!(bearing_difference(10.0, 350.0), 20.0);
        assert_eq!(bearing_difference(0.0, 180.0), 180.0);
        assert_eq!(bearing_difference(45.0, 45.0), 0.0);
        assert_eq!(bearing_difference(-90.0, 90.0), 180.0);
    }

    #[test]
    fn test_interpolate_clamps() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(2.0, 4.0);
        assert_eq!(interpolate(&a, &b, 0.5), GpsPoint::new(1.0, 2.0));
        assert_eq!(interpolate(&a, &b, 2.0), b);
        assert_eq!(interpolate(&a, &b, -1.0), a);
    }

    #[test]
    fn test_project_to_segment_perpendicular() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 0.01);
        // ~111 m north of the segment midpoint
        let p = GpsPoint::new(0.001, 0.005);
        let proj = project_to_segment(&p, &a, &b);
        assert!(approx_eq(proj.fraction, 0.5, 1e-3));
        assert!(approx_eq(proj.distance_m, 111.2, 0.5));
    }

    #[test]
    fn test_project_to_segment_clamps_to_ends() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 0.01);
        let before = project_to_segment(&GpsPoint::new(0.0, -0.01), &a, &b);
        assert_eq!(before.fraction, 0.0);
        let after = project_to_segment(&GpsPoint::new(0.0, 0.02), &a, &b);
        assert_eq!(after.fraction, 1.0);
        assert!(approx_eq(after.distance_m, haversine_distance(&b, &GpsPoint::new(0.0, 0.02)), 1.0));
    }

    #[test]
    fn test_project_to_degenerate_segment() {
        let a = GpsPoint::new(10.0, 10.0);
        let p = GpsPoint::new(10.001, 10.0);
        let proj = project_to_segment(&p, &a, &a);
        assert_eq!(proj.fraction, 0.0);
        assert!(approx_eq(proj.distance_m, 111.2, 0.5));
    }

    #[test]
    fn test_longitude_delta_takes_short_way() {
        assert!(approx_eq(longitude_delta(179.999, -179.999), 0.002, 1e-9));
        assert!(approx_eq(longitude_delta(-179.999, 179.999), -0.002, 1e-9));
        assert_eq!(longitude_delta(10.0, 20.0), 10.0);
    }

    #[test]
    fn test_segment_across_antimeridian() {
        let a = GpsPoint::new(65.0, 179.999);
        let b = GpsPoint::new(65.0, -179.999);
        // ~23 m east of `a`, short of the date line
        let p = GpsPoint::new(65.0, 179.9995);
        let proj = project_to_segment(&p, &a, &b);
        assert!(approx_eq(proj.fraction, 0.25, 0.01));
        assert!(proj.distance_m < 1.0);

        let mid = interpolate(&a, &b, 0.75);
        assert!(approx_eq(mid.longitude, -179.9995, 1e-9));
    }
}

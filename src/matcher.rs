//! # Position Matching
//!
//! Projects a GPS fix onto the route ahead of the progress cursor.
//!
//! ## Algorithm
//! 1. Take the segments from the cursor's segment up to the lookahead window
//! 2. Project the fix onto each; on the cursor's own segment the projection may
//!    not fall behind the cursor
//! 3. Keep the closest candidate (earliest on ties)
//! 4. Accept it if it lies within the matching threshold and, for a moving
//!    device with a bearing, the fix heading agrees with the segment direction
//!
//! The search never looks backwards, so an accepted match can only move the
//! cursor forward.

use crate::geo_utils::{bearing_difference, haversine_distance, initial_bearing, project_to_segment};
use crate::route::{Route, RouteCursor};
use crate::{GpsFix, GpsPoint, RoutingSettings};

/// Result of matching one fix against a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchOutcome {
    /// The fix lies on the route; the cursor may move to `cursor`.
    Advanced {
        cursor: RouteCursor,
        /// Point on the route the fix projects to
        projection: GpsPoint,
        /// Perpendicular distance from the fix to the route, meters
        distance_m: f64,
    },
    /// The fix could not be placed on the route ahead.
    Unmatched {
        /// Distance from the fix to the last matched projection, meters
        distance_from_last_good_m: f64,
    },
}

impl MatchOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, MatchOutcome::Advanced { .. })
    }
}

/// Distance within which a fix counts as on the route.
///
/// Poor fixes widen the corridor, up to `max_matching_threshold_m`.
pub fn matching_threshold(fix: &GpsFix, settings: &RoutingSettings) -> f64 {
    let from_accuracy = fix
        .accuracy_m
        .filter(|a| a.is_finite() && *a > 0.0)
        .map_or(0.0, |a| a.min(settings.max_matching_threshold_m));
    settings.matching_threshold_m.max(from_accuracy)
}

/// Match `fix` against `route` starting at the route's cursor.
pub fn match_fix(route: &Route, fix: &GpsFix, settings: &RoutingSettings) -> MatchOutcome {
    let unmatched = || MatchOutcome::Unmatched {
        distance_from_last_good_m: haversine_distance(&route.current_point(), &fix.point),
    };

    if !fix.point.is_valid() {
        return unmatched();
    }

    let geometry = route.geometry();
    let points = geometry.points();
    let current = route.cursor();
    let window = (settings.lookahead_segments as usize).max(1);
    let end = (current.index + window).min(geometry.segment_count());

    let mut best: Option<(RouteCursor, f64)> = None;
    for index in current.index..end {
        let proj = project_to_segment(&fix.point, &points[index], &points[index + 1]);
        let (fraction, distance_m) = if index == current.index && proj.fraction < current.fraction {
            // Never behind the cursor: measure against the cursor position itself
            let at_cursor = geometry.point_at(current);
            (current.fraction, haversine_distance(&at_cursor, &fix.point))
        } else {
            (proj.fraction, proj.distance_m)
        };

        if best.map_or(true, |(_, d)| distance_m < d) {
            best = Some((RouteCursor::new(index, fraction), distance_m));
        }
    }

    let Some((cursor, distance_m)) = best else {
        return unmatched();
    };

    if distance_m > matching_threshold(fix, settings) {
        return unmatched();
    }

    if !bearing_consistent(route, cursor.index, fix, settings) {
        return unmatched();
    }

    MatchOutcome::Advanced {
        cursor,
        projection: geometry.point_at(cursor),
        distance_m,
    }
}

fn bearing_consistent(route: &Route, segment: usize, fix: &GpsFix, settings: &RoutingSettings) -> bool {
    let (Some(bearing), Some(speed)) = (fix.bearing_deg, fix.speed_mps) else {
        return true;
    };
    if speed < settings.min_speed_for_bearing_check_mps || !bearing.is_finite() {
        return true;
    }

    let geometry = route.geometry();
    if geometry.segment_length(segment) < 1.0 {
        return true;
    }

    let points = geometry.points();
    let segment_bearing = initial_bearing(&points[segment], &points[segment + 1]);
    bearing_difference(bearing, segment_bearing) <= settings.max_bearing_deviation_deg
}

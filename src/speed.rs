//! Speed limits and speed cameras along the route.

use std::collections::HashSet;

use log::debug;

use crate::route::{Route, RouteCursor, RouteSegment, SpeedLimit};

/// A speed camera ahead of the current position.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraWarning {
    pub segment_index: usize,
    /// Position along the segment, `[0, 1]`
    pub fraction: f64,
    /// Distance along the route from the cursor, meters
    pub distance_m: f64,
    /// Enforced speed, km/h
    pub max_speed_kmh: Option<f64>,
}

/// Speed-related lookups on the route.
pub trait SpeedAdvisor {
    /// Limit in force on `segment`, km/h. `None` when unknown or unrestricted.
    fn check_speed_limit(&self, segment: &RouteSegment) -> Option<f64>;

    /// Closest camera ahead of the route cursor within `lookahead_m`.
    fn nearest_camera(&self, route: &Route, lookahead_m: f64) -> Option<CameraWarning>;

    /// Text to announce for `camera` at the current speed; each camera is announced once.
    fn camera_notification(&mut self, camera: &CameraWarning, speed_mps: Option<f64>) -> Option<String>;

    fn reset(&mut self);
}

/// [`SpeedAdvisor`] that reads limits and cameras straight from route metadata.
#[derive(Debug, Clone, Default)]
pub struct RouteSpeedAdvisor {
    announced: HashSet<(usize, u64)>,
}

impl RouteSpeedAdvisor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeedAdvisor for RouteSpeedAdvisor {
    fn check_speed_limit(&self, segment: &RouteSegment) -> Option<f64> {
        match segment.speed_limit {
            SpeedLimit::Kmph(kmh) if kmh.is_finite() && kmh > 0.0 => Some(kmh),
            _ => None,
        }
    }

    fn nearest_camera(&self, route: &Route, lookahead_m: f64) -> Option<CameraWarning> {
        let geometry = route.geometry();
        let cursor = route.cursor();
        let here = route.distance_from_begin_m();

        for index in cursor.index..geometry.segment_count() {
            let start = geometry.distance_at(RouteCursor::new(index, 0.0));
            if start - here > lookahead_m {
                break;
            }

            let mut cameras: Vec<_> = geometry.segments()[index]
                .cameras
                .iter()
                .filter(|c| index > cursor.index || c.fraction >= cursor.fraction)
                .collect();
            cameras.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));

            if let Some(camera) = cameras.first() {
                let distance_m = (start + geometry.segment_length(index) * camera.fraction - here).max(0.0);
                if distance_m > lookahead_m {
                    return None;
                }
                return Some(CameraWarning {
                    segment_index: index,
                    fraction: camera.fraction,
                    distance_m,
                    max_speed_kmh: camera.max_speed_kmh,
                });
            }
        }
        None
    }

    fn camera_notification(&mut self, camera: &CameraWarning, speed_mps: Option<f64>) -> Option<String> {
        let key = (camera.segment_index, camera.fraction.to_bits());
        if !self.announced.insert(key) {
            return None;
        }

        let speeding = match (camera.max_speed_kmh, speed_mps) {
            (Some(limit), Some(speed)) => speed * 3.6 > limit,
            _ => false,
        };
        debug!(
            "[SpeedAdvisor] Camera on segment {} in {:.0}m, speeding: {}",
            camera.segment_index, camera.distance_m, speeding
        );

        Some(match (camera.max_speed_kmh, speeding) {
            (Some(limit), true) => format!("Speed camera ahead, slow down to {:.0}", limit),
            (Some(limit), false) => format!("Speed camera ahead, limit {:.0}", limit),
            (None, _) => "Speed camera ahead".to_string(),
        })
    }

    fn reset(&mut self) {
        self.announced.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::{RouteGeometry, SpeedCamera};
    use crate::GpsPoint;

    /// Three ~111 m segments northwards; a 50 km/h camera halfway along segment 1.
    fn camera_route() -> Route {
        let points = (0..=3).map(|i| GpsPoint::new(i as f64 * 0.001, 0.0)).collect();
        let mut segments = vec![RouteSegment::default(); 3];
        segments[0].speed_limit = SpeedLimit::Kmph(50.0);
        segments[1].speed_limit = SpeedLimit::NoLimit;
        segments[1].cameras.push(SpeedCamera { fraction: 0.5, max_speed_kmh: Some(50.0) });
        Route::new(RouteGeometry::new("test", 1, points, segments, Vec::new()).unwrap())
    }

    #[test]
    fn test_speed_limit_lookup() {
        let advisor = RouteSpeedAdvisor::new();
        let route = camera_route();
        let segments = route.geometry().segments();
        assert_eq!(advisor.check_speed_limit(&segments[0]), Some(50.0));
        assert_eq!(advisor.check_speed_limit(&segments[1]), None);
        assert_eq!(advisor.check_speed_limit(&segments[2]), None);
    }

    #[test]
    fn test_nearest_camera_within_lookahead() {
        let advisor = RouteSpeedAdvisor::new();
        let route = camera_route();

        let camera = advisor.nearest_camera(&route, 1000.0).unwrap();
        assert_eq!(camera.segment_index, 1);
        assert!((camera.distance_m - 166.8).abs() < 1.0);
        assert_eq!(camera.max_speed_kmh, Some(50.0));

        assert!(advisor.nearest_camera(&route, 100.0).is_none());
    }

    #[test]
    fn test_passed_camera_is_not_reported() {
        let advisor = RouteSpeedAdvisor::new();
        let mut route = camera_route();
        assert!(route.advance_to(RouteCursor::new(1, 0.4)));
        assert!(advisor.nearest_camera(&route, 1000.0).is_some());
        assert!(route.advance_to(RouteCursor::new(1, 0.6)));
        assert!(advisor.nearest_camera(&route, 1000.0).is_none());
    }

    #[test]
    fn test_camera_announced_once() {
        let mut advisor = RouteSpeedAdvisor::new();
        let camera = advisor.nearest_camera(&camera_route(), 1000.0).unwrap();

        let text = advisor.camera_notification(&camera, Some(20.0)).unwrap(); // 72 km/h
        assert_eq!(text, "Speed camera ahead, slow down to 50");
        assert!(advisor.camera_notification(&camera, Some(20.0)).is_none());

        advisor.reset();
        let text = advisor.camera_notification(&camera, Some(10.0)).unwrap(); // 36 km/h
        assert_eq!(text, "Speed camera ahead, limit 50");
    }
}

//! Recent movement history, used to hint the router with the direction of travel.

use std::collections::VecDeque;

use crate::geo_utils::{haversine_distance, initial_bearing};
use crate::GpsPoint;

/// Steps shorter than this are GPS noise and skipped, meters.
const MIN_STEP_M: f64 = 3.0;
/// Steps longer than this mean a jump (tunnel exit, cold fix); history restarts, meters.
const MAX_STEP_M: f64 = 80.0;
/// Length of track kept for the direction estimate, meters.
const TRACK_LENGTH_M: f64 = 70.0;

/// Keeps a short tail of recent positions.
#[derive(Debug, Clone, Default)]
pub struct PositionAccumulator {
    points: VecDeque<GpsPoint>,
    steps: VecDeque<f64>,
    length_m: f64,
}

impl PositionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: GpsPoint) {
        if !point.is_valid() {
            return;
        }

        let Some(last) = self.points.back() else {
            self.points.push_back(point);
            return;
        };

        let step = haversine_distance(last, &point);
        if step < MIN_STEP_M {
            return;
        }
        if step > MAX_STEP_M {
            self.clear();
            self.points.push_back(point);
            return;
        }

        self.points.push_back(point);
        self.steps.push_back(step);
        self.length_m += step;

        // Drop the oldest points while the rest is still long enough
        while let Some(&oldest) = self.steps.front() {
            if self.length_m - oldest < TRACK_LENGTH_M {
                break;
            }
            self.length_m -= oldest;
            self.steps.pop_front();
            self.points.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.steps.clear();
        self.length_m = 0.0;
    }

    pub fn track_length_m(&self) -> f64 {
        self.length_m
    }

    /// Bearing of travel over the kept track, `None` without enough movement.
    pub fn direction(&self) -> Option<f64> {
        if self.steps.is_empty() {
            return None;
        }
        let first = self.points.front()?;
        let last = self.points.back()?;
        Some(initial_bearing(first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_direction_without_movement() {
        let mut acc = PositionAccumulator::new();
        assert_eq!(acc.direction(), None);
        acc.push(GpsPoint::new(0.0, 0.0));
        acc.push(GpsPoint::new(0.00001, 0.0)); // ~1 m, noise
        assert_eq!(acc.direction(), None);
    }

    #[test]
    fn test_direction_follows_movement() {
        let mut acc = PositionAccumulator::new();
        for i in 0..5 {
            acc.push(GpsPoint::new(0.0, i as f64 * 0.0001)); // ~11 m steps east
        }
        let dir = acc.direction().unwrap();
        assert!((dir - 90.0).abs() < 0.1);
    }

    #[test]
    fn test_track_is_bounded() {
        let mut acc = PositionAccumulator::new();
        for i in 0..50 {
            acc.push(GpsPoint::new(i as f64 * 0.0001, 0.0));
        }
        assert!(acc.track_length_m() < TRACK_LENGTH_M + 12.0);
        assert!(acc.track_length_m() >= TRACK_LENGTH_M - 12.0);
    }

    #[test]
    fn test_jump_restarts_history() {
        let mut acc = PositionAccumulator::new();
        acc.push(GpsPoint::new(0.0, 0.0));
        acc.push(GpsPoint::new(0.0001, 0.0));
        assert!(acc.direction().is_some());
        acc.push(GpsPoint::new(0.01, 0.0)); // ~1 km jump
        assert_eq!(acc.direction(), None);
        assert_eq!(acc.track_length_m(), 0.0);
    }
}

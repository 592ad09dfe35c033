//! Ordered waypoints of a navigation: start, intermediate stops and finish.

use std::fmt;

use crate::GpsPoint;

/// Ordered sequence of waypoints with a "passed" cursor.
///
/// The start point is passed by definition, so `passed_index` begins at 0 and
/// the next point to reach is `passed_index + 1`. Reaching the last point
/// finishes the sequence.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Checkpoints {
    points: Vec<GpsPoint>,
    passed_index: usize,
}

impl Checkpoints {
    /// Create checkpoints from `points`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two points are given: a navigation always has a
    /// start and a finish.
    pub fn new(points: Vec<GpsPoint>) -> Self {
        assert!(
            points.len() >= 2,
            "checkpoints need a start and a finish, got {} point(s)",
            points.len()
        );
        Self { points, passed_index: 0 }
    }

    /// Convenience constructor for a plain start/finish pair.
    pub fn from_start_finish(start: GpsPoint, finish: GpsPoint) -> Self {
        Self::new(vec![start, finish])
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> GpsPoint {
        self.points[0]
    }

    pub fn finish(&self) -> GpsPoint {
        self.points[self.points.len() - 1]
    }

    /// Point the next route is computed from. Same as `start` until replaced.
    pub fn point_from(&self) -> GpsPoint {
        self.points[0]
    }

    /// Replace the start point, e.g. with the snapped beginning of a fresh route.
    pub fn set_point_from(&mut self, point: GpsPoint) {
        self.points[0] = point;
    }

    pub fn passed_index(&self) -> usize {
        self.passed_index
    }

    /// Index and position of the next point to reach, `None` once finished.
    pub fn next_unpassed(&self) -> Option<(usize, GpsPoint)> {
        let idx = self.passed_index + 1;
        self.points.get(idx).map(|p| (idx, *p))
    }

    pub fn is_finished(&self) -> bool {
        self.passed_index + 1 >= self.points.len()
    }

    /// Mark the next point as passed.
    ///
    /// # Panics
    ///
    /// Panics if the finish was already passed.
    pub fn pass_next_point(&mut self) {
        assert!(!self.is_finished(), "all checkpoints already passed: {}", self);
        self.passed_index += 1;
    }

    /// Checkpoints for a route request starting at `start` that keeps every
    /// point not yet passed.
    pub fn remaining_from(&self, start: GpsPoint) -> Checkpoints {
        let mut points = Vec::with_capacity(self.points.len() - self.passed_index);
        points.push(start);
        points.extend_from_slice(&self.points[self.passed_index + 1..]);
        if points.len() < 2 {
            // Finished: the request is a zero-length hop to the finish.
            points.push(self.finish());
        }
        Checkpoints::new(points)
    }
}

impl fmt::Display for Checkpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoints(passed {} of {}: ", self.passed_index, self.points.len())?;
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({:.5}, {:.5})", p.latitude, p.longitude)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_points() -> Checkpoints {
        Checkpoints::new(vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 1.0),
            GpsPoint::new(0.0, 2.0),
        ])
    }

    #[test]
    #[should_panic(expected = "start and a finish")]
    fn test_single_point_is_rejected() {
        Checkpoints::new(vec![GpsPoint::new(0.0, 0.0)]);
    }

    #[test]
    fn test_passing_is_sequential_and_bounded() {
        let mut cp = three_points();
        assert_eq!(cp.passed_index(), 0);
        assert_eq!(cp.next_unpassed(), Some((1, GpsPoint::new(0.0, 1.0))));
        assert!(!cp.is_finished());

        cp.pass_next_point();
        assert_eq!(cp.passed_index(), 1);
        assert!(!cp.is_finished());

        cp.pass_next_point();
        assert_eq!(cp.passed_index(), 2);
        assert!(cp.is_finished());
        assert_eq!(cp.next_unpassed(), None);
    }

    #[test]
    #[should_panic(expected = "already passed")]
    fn test_passing_beyond_finish_panics() {
        let mut cp = Checkpoints::from_start_finish(GpsPoint::new(0.0, 0.0), GpsPoint::new(1.0, 1.0));
        cp.pass_next_point();
        cp.pass_next_point();
    }

    #[test]
    fn test_remaining_from_keeps_unpassed_points() {
        let mut cp = three_points();
        cp.pass_next_point();
        let here = GpsPoint::new(0.1, 1.2);
        let remaining = cp.remaining_from(here);
        assert_eq!(remaining.points(), &[here, GpsPoint::new(0.0, 2.0)]);
        assert_eq!(remaining.passed_index(), 0);
        // The source checkpoints are untouched
        assert_eq!(cp.passed_index(), 1);
        assert_eq!(cp.len(), 3);
    }

    #[test]
    fn test_set_point_from() {
        let mut cp = three_points();
        cp.set_point_from(GpsPoint::new(0.01, 0.0));
        assert_eq!(cp.start(), GpsPoint::new(0.01, 0.0));
        assert_eq!(cp.point_from(), cp.start());
        assert_eq!(cp.finish(), GpsPoint::new(0.0, 2.0));
    }
}

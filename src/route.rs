//! # Route
//!
//! A computed path: an immutable, shared [`RouteGeometry`] (polyline plus per-segment
//! turn, lane, speed-limit, street-name and traffic metadata) and a [`Route`] handle
//! that adds the only mutable piece, the progress [`RouteCursor`].
//!
//! Segment `i` runs from `points[i]` to `points[i + 1]`. A turn attached to segment
//! `i` happens at its end point. Routes are cut into legs ("subroutes"), one per
//! pair of consecutive checkpoints; each leg ends at a known segment index, which
//! anchors checkpoint passing.

use std::sync::Arc;

use thiserror::Error;

use crate::geo_utils::{haversine_distance, interpolate};
use crate::GpsPoint;

/// Errors raised while assembling a route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("route needs at least 2 points, got {0}")]
    TooFewPoints(usize),

    #[error("route has {points} points but {segments} segments (expected points - 1)")]
    SegmentCountMismatch { points: usize, segments: usize },

    #[error("route point {0} has invalid coordinates")]
    InvalidPoint(usize),

    #[error("invalid subroute layout: {0}")]
    InvalidSubroutes(String),
}

pub type RouteResult<T> = Result<T, RouteError>;

// ============================================================================
// Segment metadata
// ============================================================================

/// Manoeuvre for vehicles at the end of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CarDirection {
    #[default]
    None,
    GoStraight,
    TurnRight,
    TurnSharpRight,
    TurnSlightRight,
    TurnLeft,
    TurnSharpLeft,
    TurnSlightLeft,
    UTurnLeft,
    UTurnRight,
    EnterRoundAbout,
    LeaveRoundAbout,
    StayOnRoundAbout,
    ExitHighwayToLeft,
    ExitHighwayToRight,
    ReachedYourDestination,
}

impl CarDirection {
    /// Whether this is an actual manoeuvre the driver must perform.
    pub fn is_normal_turn(self) -> bool {
        !matches!(self, CarDirection::None | CarDirection::ReachedYourDestination)
    }
}

/// Manoeuvre for pedestrians at the end of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PedestrianDirection {
    #[default]
    None,
    GoStraight,
    TurnRight,
    TurnLeft,
    ReachedYourDestination,
}

/// Direction a single lane allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneWay {
    Reverse,
    SharpLeft,
    Left,
    SlightLeft,
    Through,
    SlightRight,
    Right,
    SharpRight,
}

/// One lane at a turn and whether following it is recommended.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SingleLane {
    pub ways: Vec<LaneWay>,
    pub recommended: bool,
}

/// A turn instruction attached to the end of a segment.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnItem {
    pub direction: CarDirection,
    pub pedestrian: PedestrianDirection,
    /// Roundabout exit number, 0 if not applicable
    pub exit_num: u32,
    pub lanes: Vec<SingleLane>,
}

impl TurnItem {
    pub fn new(direction: CarDirection) -> Self {
        Self { direction, ..Default::default() }
    }

    pub fn pedestrian(direction: PedestrianDirection) -> Self {
        Self { pedestrian: direction, ..Default::default() }
    }

    pub fn is_destination(&self) -> bool {
        self.direction == CarDirection::ReachedYourDestination
            || self.pedestrian == PedestrianDirection::ReachedYourDestination
    }
}

/// A turn together with its distance from the current position.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnItemDist {
    pub turn: TurnItem,
    /// Segment the turn is attached to
    pub segment_index: usize,
    /// Distance along the route from the cursor to the turn, meters
    pub distance_m: f64,
}

/// Street naming data of a segment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RoadNameInfo {
    pub name: String,
    /// Road number, e.g. "A1"
    pub road_ref: String,
    /// Exit number on a motorway link
    pub junction_ref: String,
    /// Road number of the link destination
    pub destination_ref: String,
    /// Signposted destination of a link
    pub destination: String,
}

impl RoadNameInfo {
    pub fn named(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    pub fn has_exit_info(&self) -> bool {
        !self.junction_ref.is_empty() || !self.destination_ref.is_empty() || !self.destination.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.road_ref.is_empty() && !self.has_exit_info()
    }

    /// Display name of the road.
    ///
    /// Streets read `"[ref] name"`. Motorway links with exit data read
    /// `"[junction_ref]: [destination_ref] > destination"`; a missing destination is
    /// replaced by the road name.
    pub fn full_name(&self) -> String {
        let mut out = String::new();
        if self.has_exit_info() {
            if !self.junction_ref.is_empty() {
                out = format!("[{}]", self.junction_ref);
            }
            if !self.destination_ref.is_empty() {
                if !out.is_empty() {
                    out.push_str(": ");
                }
                out.push_str(&format!("[{}]", self.destination_ref));
            }
            if !self.destination.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str("> ");
                out.push_str(&self.destination);
            } else if !self.name.is_empty() {
                if !self.destination_ref.is_empty() {
                    out.push_str(": ");
                } else if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&self.name);
            }
        } else {
            if !self.road_ref.is_empty() {
                out = format!("[{}]", self.road_ref);
            }
            if !self.name.is_empty() {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&self.name);
            }
        }
        out
    }
}

/// Legal speed limit of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedLimit {
    #[default]
    Unknown,
    /// Signed as unrestricted
    NoLimit,
    Kmph(f64),
}

/// Traffic coloring of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedGroup {
    Free,
    Slow,
    Congested,
    Blocked,
    #[default]
    Unknown,
}

/// Fixed speed camera located on a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedCamera {
    /// Position along the segment, `[0, 1]`
    pub fraction: f64,
    /// Enforced speed, km/h; `None` when the camera does not publish one
    pub max_speed_kmh: Option<f64>,
}

/// Metadata of one route segment.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteSegment {
    /// Expected travel time along the segment, seconds
    pub time_s: f64,
    /// Turn at the end of the segment
    pub turn: Option<TurnItem>,
    pub road: RoadNameInfo,
    pub speed_limit: SpeedLimit,
    pub traffic: SpeedGroup,
    pub cameras: Vec<SpeedCamera>,
}

// ============================================================================
// Geometry
// ============================================================================

/// Immutable part of a route, shared by reference between the session and readers.
#[derive(Debug, Clone)]
pub struct RouteGeometry {
    router_name: String,
    id: u64,
    points: Vec<GpsPoint>,
    segments: Vec<RouteSegment>,
    lengths: Vec<f64>,
    /// Distance from the route start to the start of segment `i`; `n + 1` entries
    cum_distance: Vec<f64>,
    /// Time from the route start to the start of segment `i`; `n + 1` entries
    cum_time: Vec<f64>,
    /// Last segment of every leg
    subroute_ends: Vec<usize>,
}

impl RouteGeometry {
    /// Assemble a route from its polyline, per-segment metadata and leg layout.
    ///
    /// `subroute_ends` lists the last segment index of each leg, strictly increasing
    /// and ending at the final segment. An empty list means a single leg.
    pub fn new(
        router_name: &str,
        id: u64,
        points: Vec<GpsPoint>,
        segments: Vec<RouteSegment>,
        subroute_ends: Vec<usize>,
    ) -> RouteResult<Self> {
        if points.len() < 2 {
            return Err(RouteError::TooFewPoints(points.len()));
        }
        if segments.len() + 1 != points.len() {
            return Err(RouteError::SegmentCountMismatch {
                points: points.len(),
                segments: segments.len(),
            });
        }
        if let Some(idx) = points.iter().position(|p| !p.is_valid()) {
            return Err(RouteError::InvalidPoint(idx));
        }

        let last = segments.len() - 1;
        let subroute_ends = if subroute_ends.is_empty() { vec![last] } else { subroute_ends };
        if subroute_ends.windows(2).any(|w| w[0] >= w[1]) {
            return Err(RouteError::InvalidSubroutes(format!(
                "leg ends must be strictly increasing: {:?}",
                subroute_ends
            )));
        }
        if subroute_ends.last() != Some(&last) {
            return Err(RouteError::InvalidSubroutes(format!(
                "last leg must end at segment {}, got {:?}",
                last, subroute_ends
            )));
        }

        let lengths: Vec<f64> = points
            .windows(2)
            .map(|w| haversine_distance(&w[0], &w[1]))
            .collect();

        let mut cum_distance = Vec::with_capacity(points.len());
        let mut cum_time = Vec::with_capacity(points.len());
        let (mut dist, mut time) = (0.0, 0.0);
        cum_distance.push(0.0);
        cum_time.push(0.0);
        for (len, seg) in lengths.iter().zip(&segments) {
            dist += len;
            time += seg.time_s.max(0.0);
            cum_distance.push(dist);
            cum_time.push(time);
        }

        Ok(Self {
            router_name: router_name.to_string(),
            id,
            points,
            segments,
            lengths,
            cum_distance,
            cum_time,
            subroute_ends,
        })
    }

    /// Single-leg route with default metadata, the last segment reaching the destination.
    pub fn from_points(router_name: &str, id: u64, points: Vec<GpsPoint>) -> RouteResult<Self> {
        let count = points.len().saturating_sub(1);
        let mut segments = vec![RouteSegment::default(); count];
        if let Some(last) = segments.last_mut() {
            last.turn = Some(TurnItem::new(CarDirection::ReachedYourDestination));
        }
        Self::new(router_name, id, points, segments, Vec::new())
    }

    pub fn router_name(&self) -> &str {
        &self.router_name
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment_length(&self, index: usize) -> f64 {
        self.lengths[index]
    }

    pub fn total_distance_m(&self) -> f64 {
        self.cum_distance[self.segments.len()]
    }

    pub fn total_time_s(&self) -> f64 {
        self.cum_time[self.segments.len()]
    }

    pub fn subroute_ends(&self) -> &[usize] {
        &self.subroute_ends
    }

    /// Distance from the route start to `cursor`.
    pub fn distance_at(&self, cursor: RouteCursor) -> f64 {
        self.cum_distance[cursor.index] + self.lengths[cursor.index] * cursor.fraction
    }

    /// Time from the route start to `cursor`.
    pub fn time_at(&self, cursor: RouteCursor) -> f64 {
        self.cum_time[cursor.index] + self.segments[cursor.index].time_s.max(0.0) * cursor.fraction
    }

    /// Position on the polyline at `cursor`.
    pub fn point_at(&self, cursor: RouteCursor) -> GpsPoint {
        interpolate(&self.points[cursor.index], &self.points[cursor.index + 1], cursor.fraction)
    }
}

// ============================================================================
// Cursor and route handle
// ============================================================================

/// Progress position on a route: segment index plus fraction of that segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteCursor {
    pub index: usize,
    pub fraction: f64,
}

impl RouteCursor {
    pub fn new(index: usize, fraction: f64) -> Self {
        Self { index, fraction: fraction.clamp(0.0, 1.0) }
    }

    /// Whether `self` lies strictly before `other` along the route.
    pub fn is_behind(&self, other: &RouteCursor) -> bool {
        self.index < other.index || (self.index == other.index && self.fraction < other.fraction)
    }
}

/// A computed route and the progress made along it.
///
/// Cloning is cheap: the geometry is shared.
#[derive(Debug, Clone)]
pub struct Route {
    geometry: Arc<RouteGeometry>,
    cursor: RouteCursor,
    passed_subroutes: usize,
}

impl Route {
    pub fn new(geometry: RouteGeometry) -> Self {
        Self::from_shared(Arc::new(geometry))
    }

    pub fn from_shared(geometry: Arc<RouteGeometry>) -> Self {
        Self {
            geometry,
            cursor: RouteCursor::default(),
            passed_subroutes: 0,
        }
    }

    pub fn geometry(&self) -> &Arc<RouteGeometry> {
        &self.geometry
    }

    pub fn id(&self) -> u64 {
        self.geometry.id
    }

    pub fn router_name(&self) -> &str {
        &self.geometry.router_name
    }

    pub fn cursor(&self) -> RouteCursor {
        self.cursor
    }

    pub fn segment_count(&self) -> usize {
        self.geometry.segment_count()
    }

    /// Move the cursor forward. Backward or out-of-range positions are rejected.
    pub fn advance_to(&mut self, cursor: RouteCursor) -> bool {
        if cursor.index >= self.geometry.segment_count() || cursor.is_behind(&self.cursor) {
            return false;
        }
        self.cursor = cursor;
        true
    }

    pub fn current_segment(&self) -> &RouteSegment {
        &self.geometry.segments[self.cursor.index]
    }

    /// Projection of the last matched position.
    pub fn current_point(&self) -> GpsPoint {
        self.geometry.point_at(self.cursor)
    }

    pub fn total_distance_m(&self) -> f64 {
        self.geometry.total_distance_m()
    }

    pub fn distance_from_begin_m(&self) -> f64 {
        self.geometry.distance_at(self.cursor)
    }

    pub fn distance_to_end_m(&self) -> f64 {
        (self.total_distance_m() - self.distance_from_begin_m()).max(0.0)
    }

    pub fn time_to_end_s(&self) -> f64 {
        (self.geometry.total_time_s() - self.geometry.time_at(self.cursor)).max(0.0)
    }

    /// Upcoming turns from the cursor on, nearest first, at most `max` of them.
    pub fn next_turns(&self, max: usize) -> Vec<TurnItemDist> {
        let here = self.distance_from_begin_m();
        self.geometry.segments[self.cursor.index..]
            .iter()
            .enumerate()
            .filter_map(|(offset, seg)| seg.turn.as_ref().map(|t| (self.cursor.index + offset, t)))
            .take(max)
            .map(|(idx, turn)| TurnItemDist {
                turn: turn.clone(),
                segment_index: idx,
                distance_m: (self.geometry.cum_distance[idx + 1] - here).max(0.0),
            })
            .collect()
    }

    pub fn nearest_turn(&self) -> Option<TurnItemDist> {
        self.next_turns(1).into_iter().next()
    }

    pub fn time_to_nearest_turn_s(&self) -> f64 {
        match self.nearest_turn() {
            Some(t) => (self.geometry.cum_time[t.segment_index + 1] - self.geometry.time_at(self.cursor)).max(0.0),
            None => self.time_to_end_s(),
        }
    }

    pub fn current_road(&self) -> &RoadNameInfo {
        &self.current_segment().road
    }

    /// Road taken after the nearest turn.
    pub fn next_turn_road(&self) -> Option<&RoadNameInfo> {
        self.road_after_turn(0)
    }

    /// Road taken after the turn following the nearest one.
    pub fn next_next_turn_road(&self) -> Option<&RoadNameInfo> {
        self.road_after_turn(1)
    }

    fn road_after_turn(&self, nth: usize) -> Option<&RoadNameInfo> {
        let turn = self.next_turns(nth + 1).into_iter().nth(nth)?;
        self.geometry.segments.get(turn.segment_index + 1).map(|s| &s.road)
    }

    pub fn traffic(&self, segment_index: usize) -> SpeedGroup {
        self.geometry
            .segments
            .get(segment_index)
            .map(|s| s.traffic)
            .unwrap_or_default()
    }

    pub fn subroute_count(&self) -> usize {
        self.geometry.subroute_ends.len()
    }

    pub fn passed_subroutes(&self) -> usize {
        self.passed_subroutes
    }

    /// Last segment of the leg currently being driven, `None` after the last leg.
    pub fn current_subroute_end(&self) -> Option<usize> {
        self.geometry.subroute_ends.get(self.passed_subroutes).copied()
    }

    /// Whether the cursor has reached the last segment of the current leg.
    ///
    /// Once every leg is passed, the last segment of the route is the anchor.
    pub fn is_subroute_anchor_reached(&self) -> bool {
        let end = self
            .current_subroute_end()
            .unwrap_or_else(|| self.segment_count().saturating_sub(1));
        self.cursor.index >= end
    }

    pub fn pass_next_subroute(&mut self) {
        if self.passed_subroutes < self.subroute_count() {
            self.passed_subroutes += 1;
        }
    }
}

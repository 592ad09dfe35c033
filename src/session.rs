//! # Routing Session
//!
//! State machine that owns the current route while the device moves.
//!
//! | State          | Meaning                                                   |
//! |----------------|-----------------------------------------------------------|
//! | `Inactive`     | No route requested                                        |
//! | `Building`     | First route requested, not yet returned                   |
//! | `NotStarted`   | Route ready, no fix has advanced progress yet             |
//! | `Following`    | Progress advancing normally                               |
//! | `NoFollowing`  | Route ready, guidance suspended by the caller             |
//! | `Rebuilding`   | Replacement requested while the old route stays in use    |
//! | `NeedsRebuild` | Drift exceeded the threshold; caller should `rebuild()`   |
//! | `Finished`     | Last checkpoint passed                                    |
//!
//! ## Threading
//! A session belongs to the thread that created it and panics when used from any
//! other. Router work runs on a tokio runtime; completions come back as messages
//! on a queue that the owner drains with [`RoutingSession::poll_router`] or awaits
//! with [`RoutingSession::next_route_event`]. Only the newest request can be
//! applied: anything older is dropped as stale.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::checkpoints::Checkpoints;
use crate::geo_utils::haversine_distance;
use crate::matcher::{match_fix, matching_threshold, MatchOutcome};
use crate::notifications::{NotificationManager, TurnNotificationManager};
use crate::position::PositionAccumulator;
use crate::rebuild::{DriftVerdict, RebuildPolicy};
use crate::route::{
    CarDirection, PedestrianDirection, Route, RouteCursor, RouteGeometry, SingleLane, SpeedGroup,
    TurnItem,
};
use crate::router::{AsyncRouter, RouteResponse, Router, RouterError, RouterResultCode};
use crate::speed::{CameraWarning, RouteSpeedAdvisor, SpeedAdvisor};
use crate::{GpsFix, GpsPoint, RoutingSettings};

/// Lanes are also shown when the next turn is less than this many seconds away.
const SHOW_LANES_MIN_TIME_S: f64 = 60.0;

// ============================================================================
// State and observer
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    #[default]
    Inactive,
    Building,
    NotStarted,
    Following,
    NoFollowing,
    Rebuilding,
    NeedsRebuild,
    Finished,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a route was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestKind {
    Build,
    Rebuild,
    TrafficRebuild,
}

/// Receives session events. Every method defaults to a no-op.
pub trait SessionObserver {
    /// Called on every actual state change, never for no-ops.
    fn on_state_changed(&mut self, _old: SessionState, _new: SessionState) {}

    /// Checkpoint `index` was passed.
    fn on_checkpoint_passed(&mut self, _index: usize) {}

    /// A route request completed; `code` is `NoError` when the route was installed.
    fn on_route_result(&mut self, _kind: RequestKind, _code: RouterResultCode) {}

    /// A manoeuvre was passed and the next turn became current.
    fn on_new_turn(&mut self) {}

    fn on_speed_camera(&mut self, _warning: &CameraWarning) {}

    fn on_speed_camera_cleared(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

/// Runtime single-thread-affinity guard.
#[derive(Debug, Clone)]
pub struct ThreadChecker {
    owner: ThreadId,
}

impl Default for ThreadChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadChecker {
    /// Bind to the calling thread.
    pub fn new() -> Self {
        Self { owner: thread::current().id() }
    }

    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// # Panics
    ///
    /// Panics when called from a thread other than the owner.
    #[track_caller]
    pub fn check(&self) {
        assert!(
            self.is_owner(),
            "routing session used from {:?}, owned by {:?}",
            thread::current().id(),
            self.owner
        );
    }
}

/// Guidance snapshot for the UI.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FollowingInfo {
    pub distance_to_target_m: f64,
    pub distance_to_turn_m: f64,
    pub turn: CarDirection,
    /// Turn after the next one, when close enough to be shown
    pub next_turn: CarDirection,
    pub exit_num: u32,
    /// Estimated time to the destination, seconds
    pub time_s: f64,
    pub current_street: String,
    pub next_street: String,
    pub next_next_street: String,
    pub completion_percent: f64,
    pub lanes: Vec<SingleLane>,
    pub pedestrian_turn: PedestrianDirection,
    /// km/h; `None` when unknown or unrestricted
    pub speed_limit_kmh: Option<f64>,
    pub camera: Option<CameraWarning>,
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PendingRequest {
    id: u64,
    kind: RequestKind,
    /// Checkpoints already passed when the request was issued
    passed_index: usize,
    /// State to fall back to if the request fails while a route exists
    resume: SessionState,
}

/// Turn-by-turn navigation session.
pub struct RoutingSession {
    thread_checker: ThreadChecker,
    settings: RoutingSettings,
    state: SessionState,

    router: AsyncRouter,
    responses: mpsc::UnboundedReceiver<RouteResponse>,
    pending: Option<PendingRequest>,

    route: Option<Route>,
    checkpoints: Option<Checkpoints>,
    policy: RebuildPolicy,
    accumulator: PositionAccumulator,
    last_good_position: Option<GpsPoint>,
    /// Projection of the last fix onto the route, cleared by a miss
    matched: Option<(GpsPoint, RouteCursor)>,
    last_speed_mps: Option<f64>,
    last_error: Option<RouterResultCode>,
    is_following: bool,

    /// Distance covered on routes replaced since the last build
    passed_distance_m: f64,
    last_progress: Cell<f64>,

    rebuilds_requested: u32,
    rebuilds_announced: u32,
    current_camera: Option<CameraWarning>,

    observer: Box<dyn SessionObserver>,
    notifications: Box<dyn NotificationManager>,
    speed_advisor: Box<dyn SpeedAdvisor>,
}

impl RoutingSession {
    /// Create an inactive session owned by the calling thread.
    ///
    /// Router calculations are spawned on `runtime`, which needs the time driver enabled.
    pub fn new(router: Arc<dyn Router>, runtime: Handle, settings: RoutingSettings) -> Self {
        let (router, responses) = AsyncRouter::new(router, runtime);
        Self {
            thread_checker: ThreadChecker::new(),
            settings,
            state: SessionState::Inactive,
            router,
            responses,
            pending: None,
            route: None,
            checkpoints: None,
            policy: RebuildPolicy::new(),
            accumulator: PositionAccumulator::new(),
            last_good_position: None,
            matched: None,
            last_speed_mps: None,
            last_error: None,
            is_following: false,
            passed_distance_m: 0.0,
            last_progress: Cell::new(0.0),
            rebuilds_requested: 0,
            rebuilds_announced: 0,
            current_camera: None,
            observer: Box::new(NoopObserver),
            notifications: Box::new(TurnNotificationManager::new()),
            speed_advisor: Box::new(RouteSpeedAdvisor::new()),
        }
    }

    pub fn with_observer(mut self, observer: impl SessionObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    pub fn with_notification_manager(mut self, manager: impl NotificationManager + 'static) -> Self {
        self.notifications = Box::new(manager);
        self
    }

    pub fn with_speed_advisor(mut self, advisor: impl SpeedAdvisor + 'static) -> Self {
        self.speed_advisor = Box::new(advisor);
        self
    }

    // ------------------------------------------------------------------------
    // Route requests
    // ------------------------------------------------------------------------

    /// Start a new navigation through `checkpoints`, dropping any current route.
    ///
    /// The route arrives later through [`poll_router`](Self::poll_router) or
    /// [`next_route_event`](Self::next_route_event).
    pub fn build(&mut self, checkpoints: Checkpoints, timeout: Duration) {
        self.thread_checker.check();
        info!("[RoutingSession] Build {}", checkpoints);

        self.cancel_pending();
        self.remove_route();
        self.passed_distance_m = 0.0;
        self.is_following = false;
        self.last_error = None;
        self.last_good_position = None;
        self.rebuilds_requested = 0;
        self.rebuilds_announced = 0;

        let start = checkpoints.start();
        self.checkpoints = Some(checkpoints);
        self.request(RequestKind::Build, start, false, timeout, SessionState::Building);
    }

    /// Ask for a replacement route from `start` (the last good position when `None`)
    /// through every unpassed checkpoint.
    ///
    /// Returns false, doing nothing, unless the session is `NeedsRebuild`,
    /// `Following` or `NotStarted`.
    ///
    /// # Panics
    ///
    /// Panics if no navigation was ever built.
    pub fn rebuild(&mut self, start: Option<GpsPoint>, timeout: Duration) -> bool {
        self.thread_checker.check();
        let Some(checkpoints) = self.checkpoints.as_ref() else {
            panic!("rebuild requested without checkpoints");
        };

        if !matches!(
            self.state,
            SessionState::NeedsRebuild | SessionState::Following | SessionState::NotStarted
        ) {
            debug!("[RoutingSession] Rebuild ignored in state {}", self.state);
            return false;
        }

        let start = start
            .or(self.last_good_position)
            .unwrap_or_else(|| checkpoints.point_from());
        info!("[RoutingSession] Rebuild from ({:.6}, {:.6})", start.latitude, start.longitude);

        self.rebuilds_requested += 1;
        self.request(RequestKind::Rebuild, start, true, timeout, SessionState::Rebuilding);
        true
    }

    /// Traffic data changed: recompute the route with fresh jams.
    ///
    /// Returns false when there is nothing to rebuild.
    pub fn on_traffic_update(&mut self) -> bool {
        self.thread_checker.check();
        let Some(checkpoints) = self.checkpoints.as_ref() else {
            return false;
        };

        let start = match self.state {
            SessionState::Inactive | SessionState::Finished => return false,
            SessionState::Building
            | SessionState::NotStarted
            | SessionState::NoFollowing
            | SessionState::Rebuilding => checkpoints.point_from(),
            SessionState::Following | SessionState::NeedsRebuild => self
                .last_good_position
                .unwrap_or_else(|| checkpoints.point_from()),
        };
        info!("[RoutingSession] Traffic update, rebuilding in state {}", self.state);

        let target = if self.route.is_some() {
            SessionState::Rebuilding
        } else {
            SessionState::Building
        };
        let timeout = Duration::try_from_secs_f64(self.settings.traffic_rebuild_timeout_s)
            .unwrap_or(Duration::from_secs(30));

        self.rebuilds_requested += 1;
        self.request(RequestKind::TrafficRebuild, start, false, timeout, target);
        true
    }

    fn request(
        &mut self,
        kind: RequestKind,
        start: GpsPoint,
        adjust_to_previous: bool,
        timeout: Duration,
        target: SessionState,
    ) {
        let Some(checkpoints) = self.checkpoints.as_ref() else {
            panic!("route requested without checkpoints");
        };
        let request_points = checkpoints.remaining_from(start);
        let passed_index = checkpoints.passed_index();

        let resume = match self.state {
            SessionState::NotStarted => SessionState::NotStarted,
            SessionState::NoFollowing => SessionState::NoFollowing,
            SessionState::Rebuilding | SessionState::Building => self
                .pending
                .map_or(SessionState::Following, |p| p.resume),
            _ => SessionState::Following,
        };
        let direction = if self.settings.use_direction_for_route_building {
            self.accumulator.direction()
        } else {
            None
        };

        self.policy.reset();
        self.set_state(target);
        let id = self.router.calculate(request_points, direction, adjust_to_previous, timeout);
        self.pending = Some(PendingRequest {
            id,
            kind,
            passed_index,
            resume,
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            debug!("[RoutingSession] Dropping request #{} ({:?})", pending.id, pending.kind);
        }
        self.router.cancel();
    }

    // ------------------------------------------------------------------------
    // Route completion
    // ------------------------------------------------------------------------

    /// Apply every router response already queued. Returns how many were applied.
    pub fn poll_router(&mut self) -> usize {
        self.thread_checker.check();
        let mut applied = 0;
        while let Ok(response) = self.responses.try_recv() {
            if self.on_route_ready(response) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the pending request to complete and apply it.
    ///
    /// Returns the resulting state, or `None` at once when nothing is pending.
    pub async fn next_route_event(&mut self) -> Option<SessionState> {
        self.thread_checker.check();
        while self.pending.is_some() {
            let response = self.responses.recv().await?;
            if self.on_route_ready(response) {
                return Some(self.state);
            }
        }
        None
    }

    /// Apply a router response. Stale responses are dropped and return false.
    pub fn on_route_ready(&mut self, response: RouteResponse) -> bool {
        self.thread_checker.check();
        let pending = match self.pending {
            Some(pending) if pending.id == response.request_id => pending,
            _ => {
                debug!("[RoutingSession] Dropping stale response #{}", response.request_id);
                return false;
            }
        };
        self.pending = None;
        self.router.finish(response.request_id);

        match response.result {
            Ok(geometry) => self.install_route(geometry, pending),
            Err(error) => self.fall_back(error, pending),
        }
        true
    }

    fn install_route(&mut self, geometry: RouteGeometry, pending: PendingRequest) {
        let mut route = Route::new(geometry);
        info!(
            "[RoutingSession] Route #{} from '{}' installed: {:.0}m, {} segments",
            route.id(),
            route.router_name(),
            route.total_distance_m(),
            route.segment_count()
        );

        if let Some(checkpoints) = self.checkpoints.as_mut() {
            // Legs passed while the request was in flight
            for _ in pending.passed_index..checkpoints.passed_index() {
                route.pass_next_subroute();
            }
            if let Some(first) = route.geometry().points().first() {
                checkpoints.set_point_from(*first);
            }
        }

        if let Some(old) = self.route.take() {
            self.passed_distance_m += old.distance_from_begin_m();
        }
        self.remove_route();
        self.route = Some(route);
        self.last_error = None;

        self.set_state(SessionState::NotStarted);
        self.observer.on_route_result(pending.kind, RouterResultCode::NoError);
    }

    fn fall_back(&mut self, error: RouterError, pending: PendingRequest) {
        let code = error.code();
        self.last_error = Some(code);

        if self.route.is_some() {
            warn!(
                "[RoutingSession] {:?} request failed ({}), keeping the current route",
                pending.kind, error
            );
            self.set_state(pending.resume);
        } else {
            warn!("[RoutingSession] {:?} request failed ({}), no route", pending.kind, error);
            self.checkpoints = None;
            self.is_following = false;
            self.set_state(SessionState::Inactive);
        }
        self.observer.on_route_result(pending.kind, code);
    }

    fn remove_route(&mut self) {
        self.route = None;
        self.matched = None;
        self.policy.reset();
        self.notifications.reset();
        self.speed_advisor.reset();
        self.current_camera = None;
        self.last_progress.set(0.0);
    }

    // ------------------------------------------------------------------------
    // Position updates
    // ------------------------------------------------------------------------

    /// Feed one GPS fix. Returns the state after processing it.
    pub fn on_position_changed(&mut self, fix: &GpsFix) -> SessionState {
        self.thread_checker.check();
        if matches!(
            self.state,
            SessionState::Inactive
                | SessionState::Building
                | SessionState::NoFollowing
                | SessionState::Finished
        ) {
            return self.state;
        }

        self.accumulator.push(fix.point);
        self.last_speed_mps = fix.speed_mps.filter(|_| fix.has_speed());
        if let Some(speed) = self.last_speed_mps {
            self.notifications.set_speed(speed);
        }

        let outcome = match self.route.as_ref() {
            Some(route) => match_fix(route, fix, &self.settings),
            None => return self.state,
        };

        match outcome {
            MatchOutcome::Advanced { cursor, projection, .. } => {
                self.on_matched(fix, cursor, projection)
            }
            MatchOutcome::Unmatched { distance_from_last_good_m } => {
                self.on_unmatched(fix, distance_from_last_good_m)
            }
        }
        self.state
    }

    fn on_matched(&mut self, fix: &GpsFix, cursor: RouteCursor, projection: GpsPoint) {
        let Some(route) = self.route.as_mut() else {
            return;
        };
        let former_turn = route.nearest_turn();
        route.advance_to(cursor);
        let current_turn = route.nearest_turn();

        self.policy.on_matched();
        self.last_good_position = Some(fix.point);
        self.matched = Some((projection, cursor));
        self.pass_checkpoints(fix);

        let finished = self.checkpoints.as_ref().map_or(false, |c| c.is_finished());
        if finished {
            self.set_state(SessionState::Finished);
        } else {
            self.set_state(SessionState::Following);
            self.update_camera();
        }

        if let (Some(former), Some(current)) = (former_turn, current_turn) {
            if former.turn.direction.is_normal_turn() && former.segment_index < current.segment_index {
                self.observer.on_new_turn();
            }
        }
    }

    fn on_unmatched(&mut self, fix: &GpsFix, distance_m: f64) {
        self.matched = None;
        if matches!(self.state, SessionState::NeedsRebuild | SessionState::Rebuilding) {
            return;
        }

        match self.policy.on_unmatched(distance_m, fix.speed_mps, &self.settings) {
            DriftVerdict::Fire => {
                info!("[RoutingSession] Left the route, {:.0}m from the last match", distance_m);
                self.set_state(SessionState::NeedsRebuild);
            }
            DriftVerdict::Counted(count) => {
                debug!("[RoutingSession] Unmatched fix {:.1}m off, miss count {}", distance_m, count);
            }
            DriftVerdict::Repeated => {}
        }
    }

    fn pass_checkpoints(&mut self, fix: &GpsFix) {
        let (Some(route), Some(checkpoints)) = (self.route.as_mut(), self.checkpoints.as_mut()) else {
            return;
        };
        let tolerance = matching_threshold(fix, &self.settings);

        let mut passed = Vec::new();
        while let Some((index, point)) = checkpoints.next_unpassed() {
            if !route.is_subroute_anchor_reached()
                || haversine_distance(&fix.point, &point) > tolerance
            {
                break;
            }
            checkpoints.pass_next_point();
            route.pass_next_subroute();
            passed.push(index);
            info!("[RoutingSession] Passed checkpoint {}: {}", index, checkpoints);
        }

        for index in passed {
            self.observer.on_checkpoint_passed(index);
        }
    }

    fn update_camera(&mut self) {
        let warning = match self.route.as_ref() {
            Some(route) if self.settings.camera_lookahead_m > 0.0 => {
                self.speed_advisor.nearest_camera(route, self.settings.camera_lookahead_m)
            }
            _ => None,
        };

        match (warning, self.current_camera) {
            (Some(new), Some(old))
                if new.segment_index == old.segment_index && new.fraction == old.fraction => {}
            (Some(new), _) => self.observer.on_speed_camera(&new),
            (None, Some(_)) => self.observer.on_speed_camera_cleared(),
            (None, None) => {}
        }
        self.current_camera = warning;
    }

    // ------------------------------------------------------------------------
    // Follow mode and reset
    // ------------------------------------------------------------------------

    /// Suspend guidance, e.g. while the user pans the map.
    pub fn disable_following(&mut self) -> bool {
        self.thread_checker.check();
        info!("[RoutingSession] Disable following in state {}", self.state);
        match self.state {
            SessionState::NotStarted | SessionState::Following => {
                self.set_state(SessionState::NoFollowing);
                self.is_following = false;
                true
            }
            SessionState::NoFollowing => true,
            _ => false,
        }
    }

    /// Resume guidance. Returns whether the session is following afterwards.
    pub fn enable_following(&mut self) -> bool {
        self.thread_checker.check();
        info!("[RoutingSession] Enable following in state {}", self.state);
        if self.route.is_some()
            && matches!(
                self.state,
                SessionState::NotStarted | SessionState::Following | SessionState::NoFollowing
            )
        {
            self.set_state(SessionState::Following);
            self.is_following = true;
        }
        self.is_following
    }

    /// Cancel everything and return to `Inactive`. Safe in any state.
    pub fn reset(&mut self) {
        self.thread_checker.check();
        info!("[RoutingSession] Reset");
        self.cancel_pending();
        self.remove_route();
        self.checkpoints = None;
        self.set_state(SessionState::Inactive);

        self.passed_distance_m = 0.0;
        self.is_following = false;
        self.last_error = None;
        self.last_good_position = None;
        self.last_speed_mps = None;
        self.rebuilds_requested = 0;
        self.rebuilds_announced = 0;
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        info!("[RoutingSession] {} -> {}", self.state, state);
        let old = self.state;
        self.state = state;
        self.observer.on_state_changed(old, state);
    }

    // ------------------------------------------------------------------------
    // Guidance
    // ------------------------------------------------------------------------

    /// Completion of the whole navigation, percent.
    ///
    /// Never decreases while the same route is active.
    pub fn progress(&self) -> f64 {
        self.thread_checker.check();
        if self.state == SessionState::Finished {
            self.last_progress.set(100.0);
            return 100.0;
        }
        let Some(route) = self.route.as_ref() else {
            return 0.0;
        };

        let denominator = self.passed_distance_m + route.total_distance_m();
        if denominator <= 0.0 {
            return self.last_progress.get();
        }
        let percent = 100.0 * (self.passed_distance_m + route.distance_from_begin_m()) / denominator;
        let clamped = percent.clamp(0.0, 100.0).max(self.last_progress.get());
        self.last_progress.set(clamped);
        clamped
    }

    /// Guidance snapshot, `None` without a route.
    pub fn route_following_info(&self) -> Option<FollowingInfo> {
        self.thread_checker.check();
        let route = self.route.as_ref()?;

        if !self.is_navigable() {
            return Some(FollowingInfo {
                distance_to_target_m: route.total_distance_m(),
                time_s: route.time_to_end_s().max(self.settings.min_eta_s),
                ..Default::default()
            });
        }

        let nearest = route.nearest_turn();
        let (turn, distance_to_turn_m) = match &nearest {
            Some(t) => (t.turn.clone(), t.distance_m),
            None => (TurnItem::default(), route.distance_to_end_m()),
        };

        let show_lanes = distance_to_turn_m < self.settings.show_lanes_min_distance_m
            || route.time_to_nearest_turn_s() < SHOW_LANES_MIN_TIME_S;
        let pedestrian_turn = if distance_to_turn_m < self.settings.show_pedestrian_turn_m {
            turn.pedestrian
        } else {
            PedestrianDirection::None
        };
        let next_turn = if self.settings.show_turn_after_next {
            self.notifications.second_turn().unwrap_or_default()
        } else {
            CarDirection::None
        };
        let time_s = if self.state == SessionState::Finished {
            0.0
        } else {
            route.time_to_end_s().max(self.settings.min_eta_s)
        };

        Some(FollowingInfo {
            distance_to_target_m: route.distance_to_end_m(),
            distance_to_turn_m,
            turn: turn.direction,
            next_turn,
            exit_num: turn.exit_num,
            time_s,
            current_street: route.current_road().full_name(),
            next_street: route.next_turn_road().map(|r| r.full_name()).unwrap_or_default(),
            next_next_street: route.next_next_turn_road().map(|r| r.full_name()).unwrap_or_default(),
            completion_percent: self.progress(),
            lanes: if show_lanes { turn.lanes } else { Vec::new() },
            pedestrian_turn,
            speed_limit_kmh: self.speed_advisor.check_speed_limit(route.current_segment()),
            camera: self.current_camera,
        })
    }

    /// Texts to speak now. Call after each fix; repeated calls do not repeat texts.
    pub fn generate_notifications(&mut self) -> Vec<String> {
        self.thread_checker.check();

        if self.rebuilds_requested > self.rebuilds_announced {
            self.rebuilds_announced = self.rebuilds_requested;
            return vec![self.notifications.recalculating_text()];
        }

        if !self.settings.sound_direction || !self.is_navigable() {
            return Vec::new();
        }
        let Some(route) = self.route.as_ref() else {
            return Vec::new();
        };

        let turns = route.next_turns(2);
        let next_street = if self.settings.announce_streets {
            route.next_turn_road()
        } else {
            None
        };
        let mut texts = self.notifications.generate(&turns, next_street);

        if let Some(camera) = self.current_camera {
            if let Some(text) = self.speed_advisor.camera_notification(&camera, self.last_speed_mps) {
                texts.push(text);
            }
        }
        texts
    }

    pub fn enable_turn_notifications(&mut self, enable: bool) {
        self.thread_checker.check();
        self.notifications.enable(enable);
    }

    pub fn are_turn_notifications_enabled(&self) -> bool {
        self.thread_checker.check();
        self.notifications.is_enabled()
    }

    /// Forget the movement history used as the direction hint for rebuilds.
    pub fn clear_position_accumulator(&mut self) {
        self.thread_checker.check();
        self.accumulator.clear();
    }

    /// Last fix snapped onto the route, with its place on the route.
    ///
    /// `None` unless the session is `Following` and the last fix matched.
    pub fn matched_location(&self) -> Option<(GpsPoint, RouteCursor)> {
        self.thread_checker.check();
        if self.state != SessionState::Following {
            return None;
        }
        self.matched
    }

    /// Traffic coloring where the last fix matched; `Unknown` off the route.
    pub fn current_traffic(&self) -> SpeedGroup {
        self.thread_checker.check();
        match (self.route.as_ref(), self.matched_location()) {
            (Some(route), Some((_, cursor))) => route.traffic(cursor.index),
            _ => SpeedGroup::Unknown,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.thread_checker.check();
        self.state
    }

    pub fn route(&self) -> Option<&Route> {
        self.thread_checker.check();
        self.route.as_ref()
    }

    /// Shared handle to the current route geometry, for readers that outlive a borrow.
    pub fn route_geometry(&self) -> Option<Arc<RouteGeometry>> {
        self.thread_checker.check();
        self.route.as_ref().map(|r| Arc::clone(r.geometry()))
    }

    pub fn checkpoints(&self) -> Option<&Checkpoints> {
        self.thread_checker.check();
        self.checkpoints.as_ref()
    }

    /// Code of the last failed request; cleared by a successful one.
    pub fn last_error(&self) -> Option<RouterResultCode> {
        self.thread_checker.check();
        self.last_error
    }

    pub fn pending_request_id(&self) -> Option<u64> {
        self.thread_checker.check();
        self.pending.map(|p| p.id)
    }

    pub fn is_following(&self) -> bool {
        self.thread_checker.check();
        self.is_following
    }

    /// A usable route exists and guidance is not suspended or being replaced.
    pub fn is_navigable(&self) -> bool {
        self.thread_checker.check();
        matches!(
            self.state,
            SessionState::NotStarted | SessionState::Following | SessionState::Finished
        )
    }

    pub fn is_building(&self) -> bool {
        self.thread_checker.check();
        matches!(self.state, SessionState::Building | SessionState::Rebuilding)
    }

    pub fn is_active(&self) -> bool {
        self.thread_checker.check();
        self.state != SessionState::Inactive
    }

    pub fn settings(&self) -> &RoutingSettings {
        self.thread_checker.check();
        &self.settings
    }

    pub fn set_settings(&mut self, settings: RoutingSettings) {
        self.thread_checker.check();
        self.settings = settings;
    }
}

//! Test doubles shared by the module tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;

use crate::route::{
    CarDirection, LaneWay, RoadNameInfo, RouteGeometry, RouteSegment, SingleLane, SpeedCamera,
    SpeedLimit, TurnItem,
};
use crate::router::{RouteRequest, Router, RouterError, RouterResult, RouterResultCode};
use crate::session::{RequestKind, SessionObserver, SessionState};
use crate::speed::CameraWarning;
use crate::GpsPoint;

/// Point at `latitude` on the prime meridian.
pub fn north(latitude: f64) -> GpsPoint {
    GpsPoint::new(latitude, 0.0)
}

/// Northbound single-leg route from the origin, `segments` steps of 0.001° (~111 m).
pub fn straight_geometry(segments: usize) -> RouteGeometry {
    let points = (0..=segments).map(|i| north(i as f64 * 0.001)).collect();
    RouteGeometry::from_points("test", 1, points).unwrap()
}

/// Four ~111 m segments through checkpoints at 0, 0.002 and 0.004: two legs.
pub fn two_leg_geometry() -> RouteGeometry {
    let points = (0..=4).map(|i| north(i as f64 * 0.001)).collect();
    let mut segments = vec![RouteSegment::default(); 4];
    segments[1].turn = Some(TurnItem::new(CarDirection::ReachedYourDestination));
    segments[3].turn = Some(TurnItem::new(CarDirection::ReachedYourDestination));
    RouteGeometry::new("test", 2, points, segments, vec![1, 3]).unwrap()
}

/// Three ~111 m segments with street names, a right turn with lanes after the
/// first one, a 50 km/h limit and a camera halfway along the second segment.
pub fn guided_geometry() -> RouteGeometry {
    let points = (0..=3).map(|i| north(i as f64 * 0.001)).collect();
    let segments = vec![
        RouteSegment {
            time_s: 10.0,
            turn: Some(TurnItem {
                direction: CarDirection::TurnRight,
                lanes: vec![
                    SingleLane { ways: vec![LaneWay::Through], recommended: false },
                    SingleLane { ways: vec![LaneWay::Right], recommended: true },
                ],
                ..Default::default()
            }),
            road: RoadNameInfo::named("Main Street"),
            speed_limit: SpeedLimit::Kmph(50.0),
            ..Default::default()
        },
        RouteSegment {
            time_s: 10.0,
            road: RoadNameInfo {
                name: "High Road".into(),
                road_ref: "A1".into(),
                ..Default::default()
            },
            cameras: vec![SpeedCamera { fraction: 0.5, max_speed_kmh: Some(50.0) }],
            ..Default::default()
        },
        RouteSegment {
            time_s: 10.0,
            turn: Some(TurnItem::new(CarDirection::ReachedYourDestination)),
            road: RoadNameInfo::named("Station Road"),
            ..Default::default()
        },
    ];
    RouteGeometry::new("test", 3, points, segments, Vec::new()).unwrap()
}

/// Router that answers every request at once with the same result.
pub struct ImmediateRouter {
    result: RouterResult,
    calls: AtomicUsize,
}

impl ImmediateRouter {
    pub fn ok(geometry: RouteGeometry) -> Self {
        Self { result: Ok(geometry), calls: AtomicUsize::new(0) }
    }

    pub fn err(error: RouterError) -> Self {
        Self { result: Err(error), calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Router for ImmediateRouter {
    fn name(&self) -> &str {
        "immediate"
    }

    fn calculate(&self, _request: RouteRequest) -> BoxFuture<'static, RouterResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = self.result.clone();
        async move { result }.boxed()
    }
}

/// Router whose calculations stay pending until the test answers them.
#[derive(Default)]
pub struct ManualRouter {
    requests: Mutex<Vec<RouteRequest>>,
    replies: Mutex<Vec<Option<oneshot::Sender<RouterResult>>>>,
    cancels: AtomicUsize,
}

impl ManualRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// The `n`th request received, counting from 0.
    pub fn request(&self, n: usize) -> RouteRequest {
        self.requests.lock().unwrap()[n].clone()
    }

    /// Complete the `n`th request. Returns false if its calculation was already dropped.
    pub fn respond(&self, n: usize, result: RouterResult) -> bool {
        let sender = self.replies.lock().unwrap()[n].take();
        match sender {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }
}

impl Router for ManualRouter {
    fn name(&self) -> &str {
        "manual"
    }

    fn calculate(&self, request: RouteRequest) -> BoxFuture<'static, RouterResult> {
        let (sender, receiver) = oneshot::channel();
        self.requests.lock().unwrap().push(request);
        self.replies.lock().unwrap().push(Some(sender));
        async move { receiver.await.unwrap_or(Err(RouterError::Cancelled)) }.boxed()
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Router with a bug: panics when asked for a route, or while computing it.
pub enum PanickingRouter {
    OnCall,
    InFuture,
}

impl Router for PanickingRouter {
    fn name(&self) -> &str {
        "panicking"
    }

    fn calculate(&self, _request: RouteRequest) -> BoxFuture<'static, RouterResult> {
        match self {
            PanickingRouter::OnCall => engine_bug(),
            PanickingRouter::InFuture => async { engine_bug() }.boxed(),
        }
    }
}

fn engine_bug<T>() -> T {
    panic!("engine bug")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    State(SessionState, SessionState),
    Checkpoint(usize),
    RouteResult(RequestKind, RouterResultCode),
    NewTurn,
    Camera(usize),
    CameraCleared,
}

/// Observer that logs every callback; clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// Visited states: the first old state followed by every new one.
    pub fn states(&self) -> Vec<SessionState> {
        let events = self.events.borrow();
        let mut states = Vec::new();
        for event in events.iter() {
            if let Event::State(old, new) = event {
                if states.is_empty() {
                    states.push(*old);
                }
                states.push(*new);
            }
        }
        states
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events.borrow().iter().filter(|e| *e == wanted).count()
    }

    fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn on_state_changed(&mut self, old: SessionState, new: SessionState) {
        self.push(Event::State(old, new));
    }

    fn on_checkpoint_passed(&mut self, index: usize) {
        self.push(Event::Checkpoint(index));
    }

    fn on_route_result(&mut self, kind: RequestKind, code: RouterResultCode) {
        self.push(Event::RouteResult(kind, code));
    }

    fn on_new_turn(&mut self) {
        self.push(Event::NewTurn);
    }

    fn on_speed_camera(&mut self, warning: &CameraWarning) {
        self.push(Event::Camera(warning.segment_index));
    }

    fn on_speed_camera_cleared(&mut self) {
        self.push(Event::CameraCleared);
    }
}

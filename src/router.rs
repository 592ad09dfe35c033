//! # Router Collaborator
//!
//! The path search itself lives outside this crate. The session talks to it through
//! the [`Router`] trait, whose `calculate` hands back a future that resolves to a
//! [`RouteGeometry`] or a [`RouterError`].
//!
//! [`AsyncRouter`] is the session-side adapter:
//! - spawns each calculation on a tokio runtime, bounded by the request timeout
//! - posts the outcome as a [`RouteResponse`] into the session's queue, so routes
//!   only reach session state on the session's own thread
//! - turns a panicking router into `RouterError::Internal`, so every request
//!   gets an answer
//! - keeps at most one request in flight; a new request or a cancel aborts the
//!   previous one, and its id goes stale
//!
//! For synchronous search engines, [`BlockingRouter`] runs a [`RoutingEngine`] on
//! tokio's blocking pool and lets it poll a [`RouterDelegate`] for cancellation.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::checkpoints::Checkpoints;
use crate::route::RouteGeometry;

/// Outcome code of a route calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RouterResultCode {
    NoError,
    Cancelled,
    NoRouteFound,
    NeedMoreData,
    Timeout,
    InternalError,
    StartPointNotFound,
    EndPointNotFound,
}

impl fmt::Display for RouterResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Failure reported by a router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("route calculation cancelled")]
    Cancelled,

    #[error("no route found")]
    NoRouteFound,

    #[error("map data missing for: {}", .0.join(", "))]
    NeedMoreData(Vec<String>),

    #[error("route calculation timed out after {0:?}")]
    Timeout(Duration),

    #[error("start point is not on the road network")]
    StartPointNotFound,

    #[error("end point is not on the road network")]
    EndPointNotFound,

    #[error("internal router error: {0}")]
    Internal(String),
}

impl RouterError {
    pub fn code(&self) -> RouterResultCode {
        match self {
            RouterError::Cancelled => RouterResultCode::Cancelled,
            RouterError::NoRouteFound => RouterResultCode::NoRouteFound,
            RouterError::NeedMoreData(_) => RouterResultCode::NeedMoreData,
            RouterError::Timeout(_) => RouterResultCode::Timeout,
            RouterError::StartPointNotFound => RouterResultCode::StartPointNotFound,
            RouterError::EndPointNotFound => RouterResultCode::EndPointNotFound,
            RouterError::Internal(_) => RouterResultCode::InternalError,
        }
    }
}

pub type RouterResult = Result<RouteGeometry, RouterError>;

/// One route calculation request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Monotonic id assigned by the session
    pub id: u64,
    /// Start (possibly replaced by the current position) and all unpassed points
    pub checkpoints: Checkpoints,
    /// Bearing of travel, degrees; `None` when unknown or not wanted
    pub direction: Option<f64>,
    /// Prefer a route that continues the previous one
    pub adjust_to_previous: bool,
    pub timeout: Duration,
}

/// Asynchronous path search service.
///
/// `calculate` must return quickly; the work happens when the future is polled.
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    fn calculate(&self, request: RouteRequest) -> BoxFuture<'static, RouterResult>;

    /// Stop work on the current calculation. The future may still resolve.
    fn cancel(&self) {}
}

/// Completion message of a request, delivered to the session's queue.
#[derive(Debug)]
pub struct RouteResponse {
    pub request_id: u64,
    pub result: RouterResult,
}

struct InFlight {
    id: u64,
    task: JoinHandle<()>,
}

/// Session-side adapter that runs router futures and queues their results.
pub struct AsyncRouter {
    router: Arc<dyn Router>,
    runtime: Handle,
    sender: mpsc::UnboundedSender<RouteResponse>,
    next_id: u64,
    in_flight: Option<InFlight>,
}

impl AsyncRouter {
    /// Create the adapter and the receiving end of its response queue.
    pub fn new(router: Arc<dyn Router>, runtime: Handle) -> (Self, mpsc::UnboundedReceiver<RouteResponse>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let adapter = Self {
            router,
            runtime,
            sender,
            next_id: 0,
            in_flight: None,
        };
        (adapter, receiver)
    }

    pub fn router_name(&self) -> &str {
        self.router.name()
    }

    /// Start a calculation, cancelling any request still in flight. Returns the request id.
    pub fn calculate(
        &mut self,
        checkpoints: Checkpoints,
        direction: Option<f64>,
        adjust_to_previous: bool,
        timeout: Duration,
    ) -> u64 {
        self.cancel();

        self.next_id += 1;
        let id = self.next_id;
        let request = RouteRequest {
            id,
            checkpoints,
            direction,
            adjust_to_previous,
            timeout,
        };
        info!(
            "[AsyncRouter] Request #{} to '{}': {} checkpoints, timeout {:?}",
            id,
            self.router.name(),
            request.checkpoints.len(),
            timeout
        );

        let router = &self.router;
        let calculation = match panic::catch_unwind(AssertUnwindSafe(|| router.calculate(request))) {
            Ok(calculation) => calculation,
            Err(payload) => {
                let error = RouterError::Internal(panic_message(payload.as_ref()));
                async move { Err(error) }.boxed()
            }
        };
        let sender = self.sender.clone();
        let task = self.runtime.spawn(async move {
            let guarded = AssertUnwindSafe(calculation).catch_unwind();
            let result = match tokio::time::timeout(timeout, guarded).await {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => Err(RouterError::Internal(panic_message(payload.as_ref()))),
                Err(_) => Err(RouterError::Timeout(timeout)),
            };
            // A closed queue means the session is gone
            if sender.send(RouteResponse { request_id: id, result }).is_err() {
                debug!("[AsyncRouter] Request #{} finished after its session was dropped", id);
            }
        });

        self.in_flight = Some(InFlight { id, task });
        id
    }

    /// Abort the in-flight request, if any. Its response will never be applied.
    pub fn cancel(&mut self) {
        if let Some(previous) = self.in_flight.take() {
            debug!("[AsyncRouter] Cancelling request #{}", previous.id);
            previous.task.abort();
            self.router.cancel();
        }
    }

    /// Id of the request in flight.
    pub fn pending_id(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.id)
    }

    /// Mark `id` as answered. Returns false for stale or unknown ids.
    pub fn finish(&mut self, id: u64) -> bool {
        match &self.in_flight {
            Some(current) if current.id == id => {
                self.in_flight = None;
                true
            }
            _ => false,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    warn!("[AsyncRouter] Router panicked: {}", detail);
    format!("router panicked: {}", detail)
}

impl Drop for AsyncRouter {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// Blocking engines
// ============================================================================

/// Cancellation and deadline view handed to a running [`RoutingEngine`].
#[derive(Debug, Clone)]
pub struct RouterDelegate {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RouterDelegate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// `Err` with the reason the engine should stop, `Ok` to keep going.
    pub fn check(&self) -> Result<(), RouterError> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(RouterError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                Err(RouterError::Timeout(Duration::ZERO))
            }
            _ => Ok(()),
        }
    }
}

/// Synchronous path search, run off the session thread by [`BlockingRouter`].
///
/// Long searches should call [`RouterDelegate::check`] periodically.
pub trait RoutingEngine: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn calculate_route(&self, request: &RouteRequest, delegate: &RouterDelegate) -> RouterResult;
}

/// [`Router`] over a blocking [`RoutingEngine`].
pub struct BlockingRouter<E> {
    engine: Arc<E>,
    current: Mutex<Option<RouterDelegate>>,
}

impl<E: RoutingEngine> BlockingRouter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            current: Mutex::new(None),
        }
    }
}

impl<E: RoutingEngine> Router for BlockingRouter<E> {
    fn name(&self) -> &str {
        self.engine.name()
    }

    fn calculate(&self, request: RouteRequest) -> BoxFuture<'static, RouterResult> {
        let delegate = RouterDelegate::new(request.timeout);
        if let Ok(mut current) = self.current.lock() {
            *current = Some(delegate.clone());
        }

        let engine = Arc::clone(&self.engine);
        async move {
            let worker = tokio::task::spawn_blocking(move || {
                if delegate.is_cancelled() {
                    return Err(RouterError::Cancelled);
                }
                let result = engine.calculate_route(&request, &delegate);
                match delegate.check() {
                    Ok(()) => result,
                    Err(RouterError::Timeout(_)) => Err(RouterError::Timeout(request.timeout)),
                    Err(stop) => Err(stop),
                }
            });
            match worker.await {
                Ok(result) => result,
                Err(e) => Err(RouterError::Internal(format!("routing worker failed: {}", e))),
            }
        }
        .boxed()
    }

    fn cancel(&self) {
        if let Ok(current) = self.current.lock() {
            if let Some(delegate) = current.as_ref() {
                delegate.cancel();
            }
        }
    }
}

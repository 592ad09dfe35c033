//! Drive a session along a synthetic route, leave it, and get rerouted.
//!
//! Run with: cargo run --example drive_simulation

use std::sync::Arc;
use std::time::Duration;

use nav_session::{
    BlockingRouter, CarDirection, Checkpoints, GpsFix, GpsPoint, RoadNameInfo, RouteGeometry,
    RouteRequest, RouteSegment, RouterDelegate, RouterError, RouterResult, RoutingEngine,
    RoutingSession, RoutingSettings, SessionState, TurnItem,
};

/// Connects the checkpoints with straight ~100 m steps and a left turn at every corner.
struct GridEngine;

impl RoutingEngine for GridEngine {
    fn name(&self) -> &str {
        "grid"
    }

    fn calculate_route(&self, request: &RouteRequest, delegate: &RouterDelegate) -> RouterResult {
        let checkpoints = request.checkpoints.points();
        let mut points = vec![checkpoints[0]];
        let mut segments = Vec::new();
        let mut leg_ends = Vec::new();

        for (leg, pair) in checkpoints.windows(2).enumerate() {
            delegate.check()?;
            let (from, to) = (pair[0], pair[1]);
            let steps = 10;
            for step in 1..=steps {
                let t = step as f64 / steps as f64;
                points.push(GpsPoint::new(
                    from.latitude + (to.latitude - from.latitude) * t,
                    from.longitude + (to.longitude - from.longitude) * t,
                ));
                segments.push(RouteSegment {
                    time_s: 8.0,
                    road: RoadNameInfo::named(&format!("Grid Street {}", leg + 1)),
                    ..Default::default()
                });
            }
            let last = segments.len() - 1;
            leg_ends.push(last);
            segments[last].turn = Some(TurnItem::new(if leg + 2 == checkpoints.len() {
                CarDirection::ReachedYourDestination
            } else {
                CarDirection::TurnLeft
            }));
        }

        RouteGeometry::new(self.name(), request.id, points, segments, leg_ends)
            .map_err(|e| RouterError::Internal(e.to_string()))
    }
}

fn report(session: &mut RoutingSession, step: usize, state: SessionState) {
    for text in session.generate_notifications() {
        println!("  [{:>3}] say: {}", step, text);
    }
    if let Some(info) = session.route_following_info() {
        println!(
            "  [{:>3}] {:<12} {:>5.1}% done, {:>4.0}m to turn, street '{}'",
            step, state, info.completion_percent, info.distance_to_turn_m, info.current_street
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Drive Simulation\n");

    let start = GpsPoint::new(51.5000, -0.1200);
    let corner = GpsPoint::new(51.5090, -0.1200);
    let finish = GpsPoint::new(51.5090, -0.1344);

    let router = Arc::new(BlockingRouter::new(GridEngine));
    let mut session = RoutingSession::new(
        router,
        tokio::runtime::Handle::current(),
        RoutingSettings::default(),
    );

    session.build(Checkpoints::new(vec![start, corner, finish]), Duration::from_secs(5));
    let state = session.next_route_event().await;
    println!(
        "Route ready: {:?}, {:.0}m\n",
        state,
        session.route().map_or(0.0, |r| r.total_distance_m())
    );

    // Up the first street, 20 m per fix
    let mut step = 0;
    for i in 1..=30 {
        step += 1;
        let fix = GpsFix::new(51.5000 + i as f64 * 0.00018, -0.1200)
            .with_speed(12.0)
            .with_bearing(0.0);
        let state = session.on_position_changed(&fix);
        if i % 5 == 0 {
            report(&mut session, step, state);
        }
    }

    // Miss the corner: keep going north
    for i in 1..=40 {
        step += 1;
        let position = GpsPoint::new(51.5054 + i as f64 * 0.0003, -0.1200);
        let fix = GpsFix::at(position).with_speed(12.0).with_bearing(0.0);
        if session.on_position_changed(&fix) == SessionState::NeedsRebuild {
            println!("\n  [{:>3}] off route, rebuilding", step);
            session.rebuild(Some(position), Duration::from_secs(5));
            let state = session.state();
            report(&mut session, step, state);
            break;
        }
    }

    let state = session.next_route_event().await;
    println!(
        "  rerouted: {:?}, {} checkpoint(s) passed\n",
        state,
        session.checkpoints().map_or(0, |c| c.passed_index())
    );

    // Drive the new route to the end
    let Some(points) = session.route_geometry().map(|g| g.points().to_vec()) else {
        println!("No route after rebuild");
        return;
    };
    for point in points.iter().skip(1) {
        step += 1;
        let fix = GpsFix::at(*point).with_speed(12.0);
        let state = session.on_position_changed(&fix);
        report(&mut session, step, state);
        if state == SessionState::Finished {
            break;
        }
    }

    println!("\nFinal state: {} ({:.0}%)", session.state(), session.progress());
}

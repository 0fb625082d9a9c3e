// src/coordinator.rs
//! Route handoff coordination across the legs of a plan

use crate::error::{CoordinatorError, RoutingError};
use crate::geo::Coordinate;
use crate::plan::{Leg, RoutePlan};
use crate::routing::Route;
use crate::tracking::{Location, Maneuver, NavigationDelegate, RouteProgress, TrackingSession};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Tracking { leg: usize },
    Arrived,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Tracking { leg } => write!(f, "tracking leg {}", leg),
            CoordinatorState::Arrived => write!(f, "arrived"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerouteGuard {
    Clear,
    InProgress,
}

/// Distance bookkeeping for the active leg
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressState {
    pub distance_traveled: f64,
    pub last_distance_traveled: f64,
    pub last_location: Option<Location>,
}

/// Drives a [`RoutePlan`] through a tracking session leg by leg.
///
/// Arrival at the end of a leg installs the next leg's route in the same
/// session. A deviation is handled at most once at a time: the guard stays
/// set until the session reports the reroute completed or failed.
/// Callbacks must be delivered serially; the guard is a plain flag.
pub struct Coordinator {
    plan: Option<RoutePlan>,
    state: CoordinatorState,
    guard: RerouteGuard,
    progress: ProgressState,
    monotonicity_violations: usize,
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            plan: None,
            state: CoordinatorState::Idle,
            guard: RerouteGuard::Clear,
            progress: ProgressState::default(),
            monotonicity_violations: 0,
        }
    }

    /// Begin tracking leg 0 of `plan`
    pub fn start(
        &mut self,
        plan: RoutePlan,
        session: &mut dyn TrackingSession,
    ) -> Result<(), CoordinatorError> {
        if self.state != CoordinatorState::Idle {
            return Err(CoordinatorError::AlreadyStarted);
        }

        let first = plan.legs()[0].clone();
        info!(
            "Starting navigation: {} leg(s), {:.0} m total",
            plan.len(),
            plan.total_distance_m()
        );

        self.plan = Some(plan);
        self.progress = ProgressState::default();
        self.begin_leg(session, first);
        Ok(())
    }

    fn begin_leg(&mut self, session: &mut dyn TrackingSession, leg: Leg) {
        info!(
            "Tracking leg {} ({}): {:.0} m",
            leg.index, leg.name, leg.route.distance_m
        );
        self.state = CoordinatorState::Tracking { leg: leg.index };
        session.set_route(leg.route);
        session.start();
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    pub fn active_leg(&self) -> Option<usize> {
        match self.state {
            CoordinatorState::Tracking { leg } => Some(leg),
            _ => None,
        }
    }

    pub fn active_leg_info(&self) -> Option<&Leg> {
        self.plan.as_ref()?.leg(self.active_leg()?)
    }

    pub fn plan(&self) -> Option<&RoutePlan> {
        self.plan.as_ref()
    }

    pub fn reroute_guard(&self) -> RerouteGuard {
        self.guard
    }

    pub fn is_rerouting(&self) -> bool {
        self.guard == RerouteGuard::InProgress
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn monotonicity_violations(&self) -> usize {
        self.monotonicity_violations
    }

    pub fn is_arrived(&self) -> bool {
        self.state == CoordinatorState::Arrived
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationDelegate for Coordinator {
    fn on_arrival(&mut self, session: &mut dyn TrackingSession, waypoint: &Coordinate) -> bool {
        let current = match self.state {
            CoordinatorState::Tracking { leg } => leg,
            other => {
                debug!("Arrival at {} while {}; letting the session continue", waypoint, other);
                return true;
            }
        };

        let next = self
            .plan
            .as_ref()
            .and_then(|plan| plan.leg(current + 1))
            .cloned();

        match next {
            Some(leg) => {
                info!("Arrived at end of leg {} ({}); handing off", current, waypoint);
                session.stop();
                self.progress = ProgressState::default();
                self.begin_leg(session, leg);
                false
            }
            None => {
                info!("Arrived at final destination {}", waypoint);
                self.state = CoordinatorState::Arrived;
                true
            }
        }
    }

    fn on_progress(
        &mut self,
        _session: &mut dyn TrackingSession,
        progress: &RouteProgress,
        location: &Location,
    ) {
        let distance = progress.distance_traveled;
        debug!(
            "Distance traveled: {:.1} m, remaining: {:.1} m",
            distance, progress.distance_remaining
        );

        match progress.maneuver {
            Maneuver::Depart => debug!("Departing route"),
            Maneuver::Arrive => debug!("Arriving at destination"),
            Maneuver::Continue => {}
        }

        if distance < self.progress.last_distance_traveled && distance > 0.0 {
            self.monotonicity_violations += 1;
            warn!(
                "Traveling backwards on route: {:.1} m -> {:.1} m",
                self.progress.last_distance_traveled, distance
            );
        }

        self.progress.last_distance_traveled = distance;
        self.progress.distance_traveled = distance;
        self.progress.last_location = Some(location.clone());
    }

    fn on_reroute_requested(
        &mut self,
        session: &mut dyn TrackingSession,
        location: &Location,
    ) -> bool {
        if self.guard == RerouteGuard::InProgress {
            debug!("Reroute already in progress; ignoring request at {}", location.coordinate);
            return false;
        }

        self.guard = RerouteGuard::InProgress;
        session.stop();
        // No route recomputation happens here; navigation stays stopped
        // until the session reports a reroute outcome.
        info!(
            "Off route at {}; tracking stopped, automatic rerouting is not implemented",
            location.coordinate
        );
        false
    }

    fn on_reroute_completed(&mut self, _session: &mut dyn TrackingSession, route: &Route) {
        info!("Rerouted along a new route of {:.0} m", route.distance_m);
        self.guard = RerouteGuard::Clear;
    }

    fn on_reroute_failed(&mut self, _session: &mut dyn TrackingSession, error: &RoutingError) {
        warn!("Rerouting failed: {}", error);
        self.guard = RerouteGuard::Clear;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::offset;

    /// Records every call a coordinator makes on its session
    #[derive(Default)]
    struct RecordingSession {
        running: bool,
        route: Option<Route>,
        starts: usize,
        stops: usize,
    }

    impl TrackingSession for RecordingSession {
        fn start(&mut self) {
            self.running = true;
            self.starts += 1;
        }

        fn stop(&mut self) {
            self.running = false;
            self.stops += 1;
        }

        fn is_running(&self) -> bool {
            self.running
        }

        fn set_route(&mut self, route: Route) {
            self.route = Some(route);
        }

        fn active_route(&self) -> Option<&Route> {
            self.route.as_ref()
        }
    }

    fn plan_with_legs(n: usize) -> RoutePlan {
        let mut point = Coordinate::new(59.34914, 18.11226);
        let legs = (0..n)
            .map(|i| {
                let end = offset(&point, -100.0, 10.0 * i as f64);
                let leg = Leg::new(i, &format!("leg {}", i), Route::from_geometry(vec![point, end], 10.0));
                point = end;
                leg
            })
            .collect();
        RoutePlan::new(legs).unwrap()
    }

    fn location() -> Location {
        Location::new(Coordinate::new(59.349, 18.112))
    }

    fn progress(distance: f64) -> RouteProgress {
        RouteProgress::new(distance, 100.0, Maneuver::Continue)
    }

    #[test]
    fn test_start_tracks_first_leg() {
        let plan = plan_with_legs(2);
        let first_route = plan.leg(0).unwrap().route.clone();
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();

        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        coordinator.start(plan, &mut session).unwrap();

        assert_eq!(coordinator.state(), CoordinatorState::Tracking { leg: 0 });
        assert_eq!(session.active_route(), Some(&first_route));
        assert!(session.is_running());
        assert_eq!(session.starts, 1);
    }

    #[test]
    fn test_start_twice_is_refused() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(1), &mut session).unwrap();

        let err = coordinator.start(plan_with_legs(2), &mut session).unwrap_err();
        assert_eq!(err, CoordinatorError::AlreadyStarted);
        assert_eq!(coordinator.plan().unwrap().len(), 1);
        assert_eq!(session.starts, 1);
    }

    #[test]
    fn test_two_leg_handoff() {
        let plan = plan_with_legs(2);
        let leg_a_end = plan.leg(0).unwrap().end().unwrap();
        let leg_b = plan.leg(1).unwrap().clone();
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan, &mut session).unwrap();

        assert!(!coordinator.on_arrival(&mut session, &leg_a_end));
        assert_eq!(session.active_route(), Some(&leg_b.route));
        assert_eq!(coordinator.active_leg(), Some(1));
        assert_eq!(session.stops, 1);
        assert_eq!(session.starts, 2);
        assert!(session.is_running());

        assert!(coordinator.on_arrival(&mut session, &leg_b.end().unwrap()));
        assert_eq!(coordinator.state(), CoordinatorState::Arrived);
        assert_eq!(coordinator.active_leg(), None);
    }

    #[test]
    fn test_n_legs_reach_last_leg_after_n_minus_one_arrivals() {
        for n in 1..=5 {
            let mut session = RecordingSession::default();
            let mut coordinator = Coordinator::new();
            coordinator.start(plan_with_legs(n), &mut session).unwrap();

            let here = Coordinate::new(59.0, 18.0);
            for _ in 0..n - 1 {
                assert!(!coordinator.on_arrival(&mut session, &here));
            }
            assert_eq!(coordinator.active_leg(), Some(n - 1));
            assert!(coordinator.on_arrival(&mut session, &here));
            assert!(coordinator.is_arrived());
        }
    }

    #[test]
    fn test_arrival_when_not_tracking_defers_to_session() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        assert!(coordinator.on_arrival(&mut session, &Coordinate::new(59.0, 18.0)));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        assert_eq!(session.stops, 0);
    }

    #[test]
    fn test_backward_progress_flags_exactly_one_violation() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(1), &mut session).unwrap();

        for d in [0.0, 10.0, 25.0, 20.0, 40.0] {
            coordinator.on_progress(&mut session, &progress(d), &location());
        }
        assert_eq!(coordinator.monotonicity_violations(), 1);
        assert_eq!(coordinator.progress().distance_traveled, 40.0);
    }

    #[test]
    fn test_reset_to_zero_is_not_a_violation() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(2), &mut session).unwrap();

        coordinator.on_progress(&mut session, &progress(80.0), &location());
        coordinator.on_progress(&mut session, &progress(0.0), &location());
        assert_eq!(coordinator.monotonicity_violations(), 0);
    }

    #[test]
    fn test_handoff_resets_progress() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(2), &mut session).unwrap();

        coordinator.on_progress(&mut session, &progress(95.0), &location());
        coordinator.on_arrival(&mut session, &Coordinate::new(59.0, 18.0));
        coordinator.on_progress(&mut session, &progress(5.0), &location());
        assert_eq!(coordinator.monotonicity_violations(), 0);
    }

    #[test]
    fn test_second_reroute_request_is_declined_without_side_effects() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(1), &mut session).unwrap();

        assert!(!coordinator.on_reroute_requested(&mut session, &location()));
        assert!(coordinator.is_rerouting());
        assert_eq!(session.stops, 1);

        assert!(!coordinator.on_reroute_requested(&mut session, &location()));
        assert_eq!(session.stops, 1);
        assert!(coordinator.is_rerouting());
    }

    #[test]
    fn test_reroute_failure_clears_guard() {
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan_with_legs(1), &mut session).unwrap();

        assert!(!coordinator.on_reroute_requested(&mut session, &location()));
        coordinator.on_reroute_failed(&mut session, &RoutingError::NoRoute);
        assert_eq!(coordinator.reroute_guard(), RerouteGuard::Clear);

        // Accepted again: guard set and tracking stopped a second time
        assert!(!coordinator.on_reroute_requested(&mut session, &location()));
        assert!(coordinator.is_rerouting());
        assert_eq!(session.stops, 2);
    }

    #[test]
    fn test_reroute_completion_clears_guard() {
        let plan = plan_with_legs(1);
        let route = plan.leg(0).unwrap().route.clone();
        let mut session = RecordingSession::default();
        let mut coordinator = Coordinator::new();
        coordinator.start(plan, &mut session).unwrap();

        coordinator.on_reroute_requested(&mut session, &location());
        coordinator.on_reroute_completed(&mut session, &route);
        assert!(!coordinator.is_rerouting());
        assert_eq!(coordinator.state(), CoordinatorState::Tracking { leg: 0 });
    }
}

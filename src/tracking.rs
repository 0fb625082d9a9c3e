// src/tracking.rs
//! Progress tracking session and the delegate contract it calls into

use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::routing::Route;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A location fix as reported by a tracking session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub coordinate: Coordinate,
    /// Degrees clockwise from north
    pub course: Option<f64>,
    pub speed_mps: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            course: None,
            speed_mps: None,
            timestamp: Utc::now(),
        }
    }
}

/// Maneuver at the current step of the active route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Maneuver {
    Depart,
    Continue,
    Arrive,
}

impl std::fmt::Display for Maneuver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Maneuver::Depart => write!(f, "depart"),
            Maneuver::Continue => write!(f, "continue"),
            Maneuver::Arrive => write!(f, "arrive"),
        }
    }
}

/// Progress along the active route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteProgress {
    pub distance_traveled: f64,
    pub distance_remaining: f64,
    pub fraction_traveled: f64,
    pub maneuver: Maneuver,
}

impl RouteProgress {
    pub fn new(distance_traveled: f64, route_distance: f64, maneuver: Maneuver) -> Self {
        let distance_remaining = (route_distance - distance_traveled).max(0.0);
        let fraction_traveled = if route_distance > 0.0 {
            (distance_traveled / route_distance).clamp(0.0, 1.0)
        } else {
            1.0
        };
        Self {
            distance_traveled,
            distance_remaining,
            fraction_traveled,
            maneuver,
        }
    }
}

/// A live session that follows one active route and emits location,
/// arrival and reroute events for it.
pub trait TrackingSession {
    fn start(&mut self);

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Swap the active route; allowed while running
    fn set_route(&mut self, route: Route);

    fn active_route(&self) -> Option<&Route>;
}

/// Callbacks a tracking session delivers, one at a time and in order.
///
/// Every callback receives the session that raised it so the delegate can
/// stop, restart or re-target it.
pub trait NavigationDelegate {
    /// The traveler reached the end of the active route. Return `true` to
    /// let the session report final arrival, `false` when the delegate has
    /// taken over (for example by installing another route).
    fn on_arrival(&mut self, session: &mut dyn TrackingSession, waypoint: &Coordinate) -> bool;

    fn on_progress(
        &mut self,
        session: &mut dyn TrackingSession,
        progress: &RouteProgress,
        location: &Location,
    );

    /// The traveler left the route. Return `true` to let the session
    /// compute a new route itself.
    fn on_reroute_requested(&mut self, session: &mut dyn TrackingSession, location: &Location)
        -> bool;

    fn on_reroute_completed(&mut self, session: &mut dyn TrackingSession, route: &Route);

    fn on_reroute_failed(&mut self, session: &mut dyn TrackingSession, error: &RoutingError);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fractions() {
        let progress = RouteProgress::new(25.0, 100.0, Maneuver::Continue);
        assert_eq!(progress.distance_remaining, 75.0);
        assert_eq!(progress.fraction_traveled, 0.25);

        let overshoot = RouteProgress::new(120.0, 100.0, Maneuver::Arrive);
        assert_eq!(overshoot.distance_remaining, 0.0);
        assert_eq!(overshoot.fraction_traveled, 1.0);

        let empty = RouteProgress::new(0.0, 0.0, Maneuver::Arrive);
        assert_eq!(empty.fraction_traveled, 1.0);
    }
}

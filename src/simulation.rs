// src/simulation.rs
//! Simulated location source that follows the active route

use crate::error::RoutingError;
use crate::geo::{distance_to_polyline, interpolate_along, offset, polyline_length, Coordinate};
use crate::routing::Route;
use crate::tracking::{Location, Maneuver, NavigationDelegate, RouteProgress, TrackingSession};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// One-shot backward jump in reported distance, like GPS jitter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacktrackConfig {
    pub at_m: f64,
    pub distance_m: f64,
}

/// One-shot sideways excursion off the route
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationConfig {
    pub at_m: f64,
    pub offset_m: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub speed_mps: f64,
    pub speed_multiplier: f64,
    pub tick_ms: u64,
    pub arrival_threshold_m: f64,
    pub off_route_threshold_m: f64,
    pub backtrack: Option<BacktrackConfig>,
    pub deviation: Option<DeviationConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed_mps: 13.9,
            speed_multiplier: 1.0,
            tick_ms: 1000,
            arrival_threshold_m: 5.0,
            off_route_threshold_m: 30.0,
            backtrack: None,
            deviation: None,
        }
    }
}

impl SimulationConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Events raised by a session, to be delivered to a delegate in order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Progress {
        progress: RouteProgress,
        location: Location,
    },
    Arrived {
        waypoint: Coordinate,
    },
    RerouteRequested {
        location: Location,
    },
    RerouteCompleted {
        route: Route,
    },
    RerouteFailed {
        error: RoutingError,
    },
}

pub struct SimulatedSession {
    config: SimulationConfig,
    route: Option<Route>,
    route_length: f64,
    running: bool,
    traveled: f64,
    departed: bool,
    leg_finished: bool,
    final_arrival: bool,
    backtrack_fired: bool,
    deviation_fired: bool,
    pending: VecDeque<SessionEvent>,
}

impl SimulatedSession {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            route: None,
            route_length: 0.0,
            running: false,
            traveled: 0.0,
            departed: false,
            leg_finished: false,
            final_arrival: false,
            backtrack_fired: false,
            deviation_fired: false,
            pending: VecDeque::new(),
        }
    }

    pub fn distance_traveled(&self) -> f64 {
        self.traveled
    }

    /// The delegate accepted arrival at the end of the last route
    pub fn has_arrived(&self) -> bool {
        self.final_arrival
    }

    pub fn has_pending_events(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Report a reroute produced outside the coordinator and make it active
    pub fn complete_reroute(&mut self, route: Route) {
        self.set_route(route.clone());
        self.pending.push_back(SessionEvent::RerouteCompleted { route });
    }

    pub fn fail_reroute(&mut self, error: RoutingError) {
        self.pending.push_back(SessionEvent::RerouteFailed { error });
    }

    /// Reroute from `location` back onto the untraveled part of the route
    fn reroute_from(&mut self, location: &Location) {
        let remaining = self.route.as_ref().map(|route| {
            let mut geometry = vec![location.coordinate];
            let mut walked = 0.0;
            for pair in route.geometry.windows(2) {
                walked += pair[0].distance_to(&pair[1]);
                if walked > self.traveled {
                    geometry.push(pair[1]);
                }
            }
            Route::from_geometry(geometry, self.config.speed_mps)
        });

        match remaining {
            Some(route) if route.is_valid() => self.complete_reroute(route),
            _ => self.fail_reroute(RoutingError::NoRoute),
        }
    }

    /// Advance simulated time by `dt` and collect the resulting events
    pub fn advance(&mut self, dt: Duration) -> Vec<SessionEvent> {
        let mut events: Vec<SessionEvent> = self.pending.drain(..).collect();

        if !self.running || self.leg_finished {
            return events;
        }
        let route = match &self.route {
            Some(route) => route,
            None => return events,
        };

        let step = self.config.speed_mps * self.config.speed_multiplier * dt.as_secs_f64();
        self.traveled = (self.traveled + step).min(self.route_length);

        let on_route = match interpolate_along(&route.geometry, self.traveled) {
            Some(point) => point,
            None => return events,
        };
        let ahead = interpolate_along(&route.geometry, self.traveled + 1.0).unwrap_or(on_route);
        let course = if ahead != on_route {
            on_route.bearing_to(&ahead)
        } else {
            0.0
        };

        let mut reported_coordinate = on_route;
        if let Some(deviation) = self.config.deviation {
            if !self.deviation_fired && self.traveled >= deviation.at_m {
                self.deviation_fired = true;
                let right = (course + 90.0).to_radians();
                reported_coordinate = offset(
                    &on_route,
                    right.cos() * deviation.offset_m,
                    right.sin() * deviation.offset_m,
                );
            }
        }

        let location = Location {
            coordinate: reported_coordinate,
            course: Some(course),
            speed_mps: Some(self.config.speed_mps * self.config.speed_multiplier),
            timestamp: chrono::Utc::now(),
        };

        let off_route = distance_to_polyline(&route.geometry, &reported_coordinate).unwrap_or(0.0);
        if off_route > self.config.off_route_threshold_m {
            debug!("Simulated location {:.1} m off route", off_route);
            events.push(SessionEvent::RerouteRequested { location });
            return events;
        }

        let mut reported = self.traveled;
        if let Some(backtrack) = self.config.backtrack {
            if !self.backtrack_fired && self.traveled >= backtrack.at_m {
                self.backtrack_fired = true;
                reported = (self.traveled - backtrack.distance_m).max(0.0);
            }
        }

        let remaining = self.route_length - self.traveled;
        let maneuver = if !self.departed {
            Maneuver::Depart
        } else if remaining <= self.config.arrival_threshold_m {
            Maneuver::Arrive
        } else {
            Maneuver::Continue
        };
        self.departed = true;

        events.push(SessionEvent::Progress {
            progress: RouteProgress::new(reported, self.route_length, maneuver),
            location,
        });

        if remaining <= self.config.arrival_threshold_m {
            self.leg_finished = true;
            if let Some(end) = route.end() {
                events.push(SessionEvent::Arrived { waypoint: end });
            }
        }

        events
    }
}

impl TrackingSession for SimulatedSession {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn set_route(&mut self, route: Route) {
        self.route_length = polyline_length(&route.geometry);
        self.route = Some(route);
        self.traveled = 0.0;
        self.departed = false;
        self.leg_finished = false;
        self.final_arrival = false;
    }

    fn active_route(&self) -> Option<&Route> {
        self.route.as_ref()
    }
}

/// Deliver one event to `delegate` and apply the delegate's decision
pub fn dispatch(
    event: SessionEvent,
    delegate: &mut dyn NavigationDelegate,
    session: &mut SimulatedSession,
) {
    match event {
        SessionEvent::Progress { progress, location } => {
            delegate.on_progress(session, &progress, &location);
        }
        SessionEvent::Arrived { waypoint } => {
            if delegate.on_arrival(session, &waypoint) {
                session.final_arrival = true;
                session.stop();
            }
        }
        SessionEvent::RerouteRequested { location } => {
            if delegate.on_reroute_requested(session, &location) {
                session.reroute_from(&location);
            }
        }
        SessionEvent::RerouteCompleted { route } => {
            delegate.on_reroute_completed(session, &route);
        }
        SessionEvent::RerouteFailed { error } => {
            delegate.on_reroute_failed(session, &error);
        }
    }
}

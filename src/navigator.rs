// src/navigator.rs
//! Runs a resolved plan through a simulated tracking session

use crate::{
    coordinator::Coordinator,
    error::Result,
    geo::Coordinate,
    plan::RoutePlan,
    simulation::{dispatch, SessionEvent, SimulatedSession, SimulationConfig},
    tracking::{Maneuver, RouteProgress, TrackingSession},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};
use tracing::info;

/// Snapshot of navigation state shared with displays
#[derive(Debug, Clone, Default, Serialize)]
pub struct NavigationStatus {
    pub state: String,
    pub active_leg: Option<usize>,
    pub leg_count: usize,
    pub leg_name: Option<String>,
    pub distance_traveled: f64,
    pub distance_remaining: f64,
    pub location: Option<Coordinate>,
    pub course: Option<f64>,
    pub maneuver: Option<Maneuver>,
    pub rerouting: bool,
    pub monotonicity_violations: usize,
    pub updated: Option<DateTime<Utc>>,
}

impl NavigationStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds since the last update
    pub fn age_seconds(&self) -> Option<i64> {
        self.updated
            .map(|ts| Utc::now().signed_duration_since(ts).num_seconds())
    }

    /// Leg position as "2/3", or "-" when not tracking
    pub fn leg_label(&self) -> String {
        match self.active_leg {
            Some(leg) => format!("{}/{}", leg + 1, self.leg_count),
            None => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Final leg completed
    Arrived,
    /// Tracking stopped by a declined reroute
    Halted,
    /// Run flag cleared from outside
    Interrupted,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Arrived => write!(f, "arrived at final destination"),
            Outcome::Halted => write!(f, "halted after reroute request"),
            Outcome::Interrupted => write!(f, "interrupted"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavigationReport {
    pub outcome: Outcome,
    pub legs_completed: usize,
    pub leg_count: usize,
    pub monotonicity_violations: usize,
    pub ticks: u64,
}

/// Owns the shared status and run flag for one navigation run
pub struct Navigator {
    status: Arc<RwLock<NavigationStatus>>,
    running: Arc<AtomicBool>,
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            status: Arc::new(RwLock::new(NavigationStatus::new())),
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn status_handle(&self) -> Arc<RwLock<NavigationStatus>> {
        Arc::clone(&self.status)
    }

    pub fn running_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Drive `plan` to completion. Events from each tick are delivered to
    /// the coordinator one by one before the next tick is taken.
    pub async fn run(&self, plan: RoutePlan, config: SimulationConfig) -> Result<NavigationReport> {
        let tick = config.tick();
        let leg_count = plan.len();
        let mut session = SimulatedSession::new(config);
        let mut coordinator = Coordinator::new();
        coordinator.start(plan, &mut session)?;

        let mut last_progress: Option<RouteProgress> = None;
        let mut ticks: u64 = 0;
        self.update_status(&coordinator, &session, last_progress.as_ref(), leg_count);

        let mut interval = tokio::time::interval(tick);
        interval.tick().await;

        let outcome = loop {
            if !self.running.load(Ordering::Relaxed) {
                break Outcome::Interrupted;
            }
            interval.tick().await;
            ticks += 1;

            for event in session.advance(tick) {
                if let SessionEvent::Progress { progress, .. } = &event {
                    last_progress = Some(progress.clone());
                }
                dispatch(event, &mut coordinator, &mut session);
            }
            self.update_status(&coordinator, &session, last_progress.as_ref(), leg_count);

            if session.has_arrived() {
                break Outcome::Arrived;
            }
            if !session.is_running() && !session.has_pending_events() {
                break Outcome::Halted;
            }
        };

        let legs_completed = match (outcome, coordinator.active_leg()) {
            (Outcome::Arrived, _) => leg_count,
            (_, Some(leg)) => leg,
            (_, None) => 0,
        };

        info!("Navigation {} after {} tick(s)", outcome, ticks);
        Ok(NavigationReport {
            outcome,
            legs_completed,
            leg_count,
            monotonicity_violations: coordinator.monotonicity_violations(),
            ticks,
        })
    }

    fn update_status(
        &self,
        coordinator: &Coordinator,
        session: &SimulatedSession,
        progress: Option<&RouteProgress>,
        leg_count: usize,
    ) {
        let mut status = self.status.write().unwrap_or_else(|e| e.into_inner());
        let last_location = coordinator.progress().last_location.as_ref();

        status.state = coordinator.state().to_string();
        status.active_leg = coordinator.active_leg();
        status.leg_count = leg_count;
        status.leg_name = coordinator.active_leg_info().map(|leg| leg.name.clone());
        status.distance_traveled = progress.map_or(0.0, |p| p.distance_traveled);
        status.distance_remaining = progress.map_or_else(
            || session.active_route().map_or(0.0, |r| r.distance_m),
            |p| p.distance_remaining,
        );
        status.location = last_location.map(|l| l.coordinate);
        status.course = last_location.and_then(|l| l.course);
        status.maneuver = progress.map(|p| p.maneuver);
        status.rerouting = coordinator.is_rerouting();
        status.monotonicity_violations = coordinator.monotonicity_violations();
        status.updated = Some(Utc::now());
    }

    /// Stop the navigator
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Check if the navigator is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Get a clone of the current status
    pub fn get_status(&self) -> NavigationStatus {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

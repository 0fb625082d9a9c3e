// src/lib.rs
//! Route Handoff Library
//!
//! Drives multi-leg turn-by-turn navigation: a route plan is resolved through
//! a routing service, then tracked leg by leg in a tracking session, handing
//! off to the next leg on arrival and guarding against re-entrant reroutes.

pub mod config;
pub mod coordinator;
pub mod display;
pub mod error;
pub mod geo;
pub mod navigator;
pub mod plan;
pub mod routing;
pub mod simulation;
pub mod tracking;
pub mod waypoint;

// Re-export main types for convenience
pub use coordinator::{Coordinator, CoordinatorState, RerouteGuard};
pub use error::{NavError, Result};
pub use geo::Coordinate;
pub use navigator::{NavigationReport, Navigator, Outcome};
pub use plan::{Leg, PlanConfig, RoutePlan, RoutePlanner};
pub use routing::{Route, RoutingService};
pub use tracking::{NavigationDelegate, TrackingSession};

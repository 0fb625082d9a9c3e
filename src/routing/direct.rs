// src/routing/direct.rs
//! Offline router that joins waypoints with straight segments

use super::{MatchRequest, Route, RouteRequest, RoutingService};
use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::waypoint::Waypoint;
use async_trait::async_trait;

/// Default travel speed, roughly 50 km/h
pub const DEFAULT_SPEED_MPS: f64 = 13.9;

/// Routes without a road network: the route shape is the waypoint sequence
/// itself, and a matched trace is the trace minus repeated points.
#[derive(Debug, Clone)]
pub struct DirectRouter {
    speed_mps: f64,
}

impl DirectRouter {
    pub fn new(speed_mps: f64) -> Self {
        Self { speed_mps }
    }

    fn build(&self, points: Vec<Coordinate>) -> Result<Route, RoutingError> {
        let geometry = dedup_consecutive(points);
        if geometry.len() < 2 {
            return Err(RoutingError::NoRoute);
        }
        Ok(Route::from_geometry(geometry, self.speed_mps))
    }
}

impl Default for DirectRouter {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED_MPS)
    }
}

fn dedup_consecutive(mut points: Vec<Coordinate>) -> Vec<Coordinate> {
    points.dedup();
    points
}

#[async_trait]
impl RoutingService for DirectRouter {
    async fn calculate(&self, request: &RouteRequest) -> Result<Vec<Route>, RoutingError> {
        let points = request.waypoints.iter().map(|wp| wp.location).collect();
        let route = self.build(points)?.with_waypoints(request.waypoints.clone());
        Ok(vec![route])
    }

    async fn match_trace(&self, request: &MatchRequest) -> Result<Vec<Route>, RoutingError> {
        let waypoints = request
            .waypoint_indices
            .iter()
            .map(|&i| {
                request
                    .coordinates
                    .get(i)
                    .map(|c| Waypoint::new(*c))
                    .ok_or_else(|| {
                        RoutingError::InvalidRequest(format!("waypoint index {} out of range", i))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let route = self
            .build(request.coordinates.clone())?
            .with_waypoints(waypoints);
        Ok(vec![route])
    }

    fn name(&self) -> &str {
        "direct"
    }
}

// src/routing/mod.rs
//! Routing service abstraction and route types

pub mod direct;
pub mod osrm;

use crate::error::RoutingError;
use crate::geo::{polyline_length, Coordinate};
use crate::waypoint::Waypoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use direct::DirectRouter;
pub use osrm::OsrmClient;

/// Travel mode passed to the routing service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Driving,
    Walking,
    Cycling,
}

impl Profile {
    /// Profile segment of an OSRM request path
    pub fn osrm_name(&self) -> &'static str {
        match self {
            Profile::Driving => "driving",
            Profile::Walking => "foot",
            Profile::Cycling => "bike",
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::Driving => write!(f, "driving"),
            Profile::Walking => write!(f, "walking"),
            Profile::Cycling => write!(f, "cycling"),
        }
    }
}

/// A computed route. Immutable once returned by a routing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub geometry: Vec<Coordinate>,
    pub distance_m: f64,
    pub duration_s: f64,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    /// Build a route from its shape, deriving duration from a constant speed
    pub fn from_geometry(geometry: Vec<Coordinate>, speed_mps: f64) -> Self {
        let distance_m = polyline_length(&geometry);
        let duration_s = if speed_mps > 0.0 {
            distance_m / speed_mps
        } else {
            0.0
        };
        Self {
            geometry,
            distance_m,
            duration_s,
            waypoints: Vec::new(),
        }
    }

    pub fn with_waypoints(mut self, waypoints: Vec<Waypoint>) -> Self {
        self.waypoints = waypoints;
        self
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.geometry.first().copied()
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.geometry.last().copied()
    }

    pub fn is_valid(&self) -> bool {
        self.geometry.len() >= 2
    }
}

/// Route calculation through an ordered list of waypoints
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub waypoints: Vec<Waypoint>,
    pub profile: Profile,
}

impl RouteRequest {
    pub fn new(waypoints: Vec<Waypoint>, profile: Profile) -> Result<Self, RoutingError> {
        if waypoints.len() < 2 {
            return Err(RoutingError::InvalidRequest(format!(
                "route calculation needs at least 2 waypoints, got {}",
                waypoints.len()
            )));
        }
        Ok(Self { waypoints, profile })
    }
}

/// Map matching of a dense recorded trace
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub coordinates: Vec<Coordinate>,
    pub profile: Profile,
    /// Trace indices that become waypoints of the matched route
    pub waypoint_indices: Vec<usize>,
}

impl MatchRequest {
    /// Only the first and last trace points become waypoints
    pub fn new(coordinates: Vec<Coordinate>, profile: Profile) -> Result<Self, RoutingError> {
        if coordinates.len() < 2 {
            return Err(RoutingError::InvalidRequest(format!(
                "route matching needs at least 2 coordinates, got {}",
                coordinates.len()
            )));
        }
        let waypoint_indices = vec![0, coordinates.len() - 1];
        Ok(Self {
            coordinates,
            profile,
            waypoint_indices,
        })
    }
}

/// External routing engine: route calculation and route matching
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Candidate routes through the request's waypoints, best first
    async fn calculate(&self, request: &RouteRequest) -> Result<Vec<Route>, RoutingError>;

    /// Candidate routes snapped to the road network along a recorded trace
    async fn match_trace(&self, request: &MatchRequest) -> Result<Vec<Route>, RoutingError>;

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: RoutingService + ?Sized> RoutingService for Box<T> {
    async fn calculate(&self, request: &RouteRequest) -> Result<Vec<Route>, RoutingError> {
        (**self).calculate(request).await
    }

    async fn match_trace(&self, request: &MatchRequest) -> Result<Vec<Route>, RoutingError> {
        (**self).match_trace(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let one = vec![Waypoint::new(Coordinate::new(59.0, 18.0))];
        assert!(matches!(
            RouteRequest::new(one, Profile::Driving),
            Err(RoutingError::InvalidRequest(_))
        ));

        let trace = vec![
            Coordinate::new(59.0, 18.0),
            Coordinate::new(59.1, 18.0),
            Coordinate::new(59.2, 18.0),
        ];
        let request = MatchRequest::new(trace, Profile::Walking).unwrap();
        assert_eq!(request.waypoint_indices, vec![0, 2]);
    }

    #[test]
    fn test_route_from_geometry() {
        let route = Route::from_geometry(
            vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.001, 0.0)],
            10.0,
        );
        assert!(route.is_valid());
        assert!((route.distance_m - 111.2).abs() < 0.5);
        assert!((route.duration_s - route.distance_m / 10.0).abs() < 1e-9);
        assert_eq!(route.start(), Some(Coordinate::new(0.0, 0.0)));

        let stub = Route::from_geometry(vec![Coordinate::new(0.0, 0.0)], 10.0);
        assert!(!stub.is_valid());
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::default(), Profile::Driving);
        assert_eq!(Profile::Walking.osrm_name(), "foot");
        let parsed: Profile = serde_json::from_str("\"cycling\"").unwrap();
        assert_eq!(parsed, Profile::Cycling);
    }
}

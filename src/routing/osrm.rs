// src/routing/osrm.rs
//! Client for OSRM-compatible `route` and `match` HTTP endpoints

use super::{MatchRequest, Route, RouteRequest, RoutingService};
use crate::error::RoutingError;
use crate::geo::Coordinate;
use crate::waypoint::Waypoint;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org";

/// Bearing range sent for a heading without a stated accuracy
const DEFAULT_BEARING_RANGE: f64 = 45.0;

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
    #[serde(default)]
    matchings: Vec<OsrmRoute>,
    #[serde(default)]
    waypoints: Vec<OsrmWaypoint>,
    #[serde(default)]
    tracepoints: Vec<Option<OsrmWaypoint>>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

/// GeoJSON LineString; requested with `geometries=geojson`
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Coordinate>,
}

#[derive(Debug, Deserialize)]
struct OsrmWaypoint {
    location: Coordinate,
    #[serde(default)]
    name: String,
}

impl From<OsrmWaypoint> for Waypoint {
    fn from(wp: OsrmWaypoint) -> Self {
        if wp.name.is_empty() {
            Waypoint::new(wp.location)
        } else {
            Waypoint::named(wp.location, &wp.name)
        }
    }
}

pub struct OsrmClient {
    base_url: String,
    client: Client,
}

impl OsrmClient {
    pub fn new(base_url: &str) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("route-handoff/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// URL for a route calculation request. Waypoint headings become
    /// `bearings` and known accuracies become `radiuses`; each parameter is
    /// left out when no waypoint carries it.
    pub fn route_url(&self, request: &RouteRequest) -> String {
        let locations: Vec<Coordinate> = request.waypoints.iter().map(|wp| wp.location).collect();
        let mut url = format!(
            "{}/route/v1/{}/{}?overview=full&geometries=geojson&steps=true",
            self.base_url,
            request.profile.osrm_name(),
            coordinate_path(&locations)
        );

        if request.waypoints.iter().any(|wp| wp.heading.is_some()) {
            let bearings: Vec<String> = request.waypoints.iter().map(bearing_param).collect();
            url.push_str("&bearings=");
            url.push_str(&bearings.join(";"));
        }

        if request
            .waypoints
            .iter()
            .any(|wp| wp.coordinate_accuracy.is_some())
        {
            let radiuses: Vec<String> = request
                .waypoints
                .iter()
                .map(|wp| match wp.coordinate_accuracy {
                    Some(accuracy) => format!("{:.1}", accuracy),
                    None => "unlimited".to_string(),
                })
                .collect();
            url.push_str("&radiuses=");
            url.push_str(&radiuses.join(";"));
        }

        url
    }

    /// URL for a trace matching request
    pub fn match_url(&self, request: &MatchRequest) -> String {
        let indices: Vec<String> = request
            .waypoint_indices
            .iter()
            .map(|i| i.to_string())
            .collect();
        format!(
            "{}/match/v1/{}/{}?overview=full&geometries=geojson&steps=true&waypoints={}",
            self.base_url,
            request.profile.osrm_name(),
            coordinate_path(&request.coordinates),
            indices.join(";")
        )
    }

    async fn fetch(&self, url: &str) -> Result<String, RoutingError> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // OSRM reports NoRoute and friends with a 400 and a JSON body, so only
        // treat the status as fatal when the body is not an OSRM response.
        if !status.is_success() && serde_json::from_str::<OsrmResponse>(&body).is_err() {
            return Err(RoutingError::Http(format!("{} returned {}", url, status)));
        }
        Ok(body)
    }
}

/// OSRM takes whole degrees: heading 0-359 and a range of at most 180
fn bearing_param(wp: &Waypoint) -> String {
    match wp.heading {
        Some(heading) => {
            let range = wp.heading_accuracy.unwrap_or(DEFAULT_BEARING_RANGE);
            format!(
                "{},{}",
                (heading.round() as i64).rem_euclid(360),
                range.round().clamp(0.0, 180.0) as i64
            )
        }
        None => String::new(),
    }
}

fn coordinate_path(points: &[Coordinate]) -> String {
    points
        .iter()
        .map(|c| format!("{:.6},{:.6}", c.longitude, c.latitude))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a `route` endpoint response body into candidate routes
pub fn parse_route_response(body: &str) -> Result<Vec<Route>, RoutingError> {
    let response = decode(body)?;
    let waypoints: Vec<Waypoint> = response.waypoints.into_iter().map(Waypoint::from).collect();
    into_routes(response.routes, &waypoints)
}

/// Parse a `match` endpoint response body into candidate routes
pub fn parse_match_response(body: &str) -> Result<Vec<Route>, RoutingError> {
    let response = decode(body)?;
    let waypoints: Vec<Waypoint> = response
        .tracepoints
        .into_iter()
        .flatten()
        .map(Waypoint::from)
        .collect();
    into_routes(response.matchings, &waypoints)
}

fn decode(body: &str) -> Result<OsrmResponse, RoutingError> {
    let response: OsrmResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Decode(e.to_string()))?;

    match response.code.as_str() {
        "Ok" => Ok(response),
        "NoRoute" | "NoMatch" | "NoSegment" => Err(RoutingError::NoRoute),
        _ => Err(RoutingError::Service {
            message: response.message.clone().unwrap_or_default(),
            code: response.code,
        }),
    }
}

fn into_routes(candidates: Vec<OsrmRoute>, waypoints: &[Waypoint]) -> Result<Vec<Route>, RoutingError> {
    let routes: Vec<Route> = candidates
        .into_iter()
        .filter(|r| r.geometry.coordinates.len() >= 2)
        .map(|r| Route {
            geometry: r.geometry.coordinates,
            distance_m: r.distance,
            duration_s: r.duration,
            waypoints: waypoints.to_vec(),
        })
        .collect();

    if routes.is_empty() {
        return Err(RoutingError::NoRoute);
    }
    Ok(routes)
}

#[async_trait]
impl RoutingService for OsrmClient {
    async fn calculate(&self, request: &RouteRequest) -> Result<Vec<Route>, RoutingError> {
        let body = self.fetch(&self.route_url(request)).await?;
        parse_route_response(&body)
    }

    async fn match_trace(&self, request: &MatchRequest) -> Result<Vec<Route>, RoutingError> {
        let body = self.fetch(&self.match_url(request)).await?;
        parse_match_response(&body)
    }

    fn name(&self) -> &str {
        "osrm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Profile;

    const ROUTE_OK: &str = r#"{
        "code": "Ok",
        "routes": [{
            "geometry": {"type": "LineString", "coordinates": [[18.112495,59.349141],[18.1131,59.34912],[18.113701,59.349103]]},
            "distance": 69.4,
            "duration": 11.2,
            "legs": [],
            "weight": 11.2,
            "weight_name": "routability"
        }],
        "waypoints": [
            {"hint": "x", "distance": 1.2, "name": "Lidingövägen", "location": [18.112495,59.349141]},
            {"hint": "y", "distance": 0.4, "name": "", "location": [18.113701,59.349103]}
        ]
    }"#;

    const MATCH_OK: &str = r#"{
        "code": "Ok",
        "matchings": [{
            "geometry": {"type": "LineString", "coordinates": [[18.11211,59.34749],[18.11208,59.34713],[18.11107,59.34721]]},
            "distance": 120.0,
            "duration": 30.0,
            "confidence": 0.9
        }],
        "tracepoints": [
            {"location": [18.11211,59.34749], "name": "", "matchings_index": 0, "waypoint_index": 0},
            null,
            {"location": [18.11107,59.34721], "name": "", "matchings_index": 0, "waypoint_index": 1}
        ]
    }"#;

    #[test]
    fn test_parse_route_response() {
        let routes = parse_route_response(ROUTE_OK).unwrap();
        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.geometry.len(), 3);
        assert_eq!(route.start(), Some(Coordinate::new(59.349141, 18.112495)));
        assert_eq!(route.distance_m, 69.4);
        assert_eq!(route.waypoints.len(), 2);
        assert_eq!(route.waypoints[0].name.as_deref(), Some("Lidingövägen"));
        assert_eq!(route.waypoints[1].name, None);
    }

    #[test]
    fn test_parse_match_response_skips_unmatched_tracepoints() {
        let routes = parse_match_response(MATCH_OK).unwrap();
        assert_eq!(routes[0].waypoints.len(), 2);
        assert_eq!(routes[0].duration_s, 30.0);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            parse_route_response(r#"{"code":"NoRoute","message":"Impossible route"}"#),
            Err(RoutingError::NoRoute)
        );
        assert_eq!(
            parse_route_response(r#"{"code":"InvalidQuery","message":"bad coordinates"}"#),
            Err(RoutingError::Service {
                code: "InvalidQuery".to_string(),
                message: "bad coordinates".to_string()
            })
        );
        assert_eq!(
            parse_route_response(r#"{"code":"Ok","routes":[]}"#),
            Err(RoutingError::NoRoute)
        );
        assert!(matches!(
            parse_route_response("<html>"),
            Err(RoutingError::Decode(_))
        ));
    }

    #[test]
    fn test_request_urls() {
        let client = OsrmClient::new("http://localhost:5000/").unwrap();
        let waypoints = vec![
            Waypoint::new(Coordinate::new(59.349141, 18.112495)),
            Waypoint::new(Coordinate::new(59.349103, 18.113701)),
        ];
        let request = RouteRequest::new(waypoints, Profile::Driving).unwrap();
        assert_eq!(
            client.route_url(&request),
            "http://localhost:5000/route/v1/driving/18.112495,59.349141;18.113701,59.349103?overview=full&geometries=geojson&steps=true"
        );

        let trace = vec![
            Coordinate::new(59.34749, 18.11211),
            Coordinate::new(59.34713, 18.11208),
            Coordinate::new(59.34721, 18.11107),
        ];
        let request = MatchRequest::new(trace, Profile::Walking).unwrap();
        let url = client.match_url(&request);
        assert!(url.starts_with("http://localhost:5000/match/v1/foot/"));
        assert!(url.ends_with("&waypoints=0;2"));
    }

    #[test]
    fn test_route_url_carries_waypoint_constraints() {
        let client = OsrmClient::new("http://localhost:5000").unwrap();
        let mut from = Waypoint::named(Coordinate::new(59.349141, 18.112495), "Start of AB route");
        from.heading = Some(0.0);
        from.heading_accuracy = Some(55.0);
        let mut via = Waypoint::new(Coordinate::new(59.34912, 18.1131));
        via.coordinate_accuracy = Some(55.0);
        let mut to = Waypoint::named(Coordinate::new(59.349103, 18.113701), "End of AB route");
        to.heading = Some(272.7964302815958);
        to.heading_accuracy = Some(55.0);

        let request = RouteRequest::new(vec![from, via, to], Profile::Driving).unwrap();
        let url = client.route_url(&request);
        assert!(url.ends_with("&bearings=0,55;;273,55&radiuses=unlimited;55.0;unlimited"));

        let mut wide = Waypoint::new(Coordinate::new(59.349141, 18.112495));
        wide.heading = Some(-90.0);
        wide.heading_accuracy = Some(400.0);
        let plain = Waypoint::new(Coordinate::new(59.349103, 18.113701));
        let request = RouteRequest::new(vec![wide, plain], Profile::Driving).unwrap();
        let url = client.route_url(&request);
        assert!(url.ends_with("&bearings=270,180;"));
        assert!(!url.contains("radiuses"));
    }
}

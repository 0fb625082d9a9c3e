// src/plan.rs
//! Route plans: ordered legs resolved from fixture files

use crate::error::{ConfigError, PlanError, Result, RoutingError};
use crate::geo::{haversine_distance, Coordinate};
use crate::routing::{MatchRequest, Profile, Route, RouteRequest, RoutingService};
use crate::waypoint::{load_waypoints, Waypoint};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default tolerance for the end of one leg meeting the start of the next
pub const DEFAULT_MAX_LEG_GAP_M: f64 = 50.0;

/// One segment of the journey with its resolved route
#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub index: usize,
    pub name: String,
    pub route: Route,
}

impl Leg {
    pub fn new(index: usize, name: &str, route: Route) -> Self {
        Self {
            index,
            name: name.to_string(),
            route,
        }
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.route.start()
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.route.end()
    }
}

/// Ordered legs; insertion order is traversal order. Never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePlan {
    legs: Vec<Leg>,
    profile: Profile,
}

impl RoutePlan {
    pub fn new(legs: Vec<Leg>) -> std::result::Result<Self, PlanError> {
        if legs.is_empty() {
            return Err(PlanError::Empty);
        }
        Ok(Self {
            legs,
            profile: Profile::default(),
        })
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn leg(&self, index: usize) -> Option<&Leg> {
        self.legs.get(index)
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn total_distance_m(&self) -> f64 {
        self.legs.iter().map(|leg| leg.route.distance_m).sum()
    }

    /// Junctions where leg `i` ends further than `tolerance_m` from where
    /// leg `i + 1` starts, as `(i, gap_m)`
    pub fn continuity_gaps(&self, tolerance_m: f64) -> Vec<(usize, f64)> {
        self.legs
            .windows(2)
            .filter_map(|pair| {
                let gap = haversine_distance(&pair[0].end()?, &pair[1].start()?);
                (gap > tolerance_m).then_some((pair[0].index, gap))
            })
            .collect()
    }

    pub fn summary(&self, tolerance_m: f64) -> PlanSummary {
        PlanSummary {
            profile: self.profile,
            total_distance_m: self.total_distance_m(),
            legs: self
                .legs
                .iter()
                .map(|leg| LegSummary {
                    index: leg.index,
                    name: leg.name.clone(),
                    start: leg.start(),
                    end: leg.end(),
                    points: leg.route.geometry.len(),
                    distance_m: leg.route.distance_m,
                    duration_s: leg.route.duration_s,
                })
                .collect(),
            gaps: self
                .continuity_gaps(tolerance_m)
                .into_iter()
                .map(|(after_leg, gap_m)| GapSummary { after_leg, gap_m })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub profile: Profile,
    pub total_distance_m: f64,
    pub legs: Vec<LegSummary>,
    pub gaps: Vec<GapSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegSummary {
    pub index: usize,
    pub name: String,
    pub start: Option<Coordinate>,
    pub end: Option<Coordinate>,
    pub points: usize,
    pub distance_m: f64,
    pub duration_s: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GapSummary {
    pub after_leg: usize,
    pub gap_m: f64,
}

/// How a leg's route is obtained
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LegSpec {
    /// Route calculation through waypoints
    Route {
        name: String,
        #[serde(default)]
        waypoints: Vec<Waypoint>,
        #[serde(default)]
        waypoints_file: Option<PathBuf>,
        /// Aim the final waypoint at the start of the next leg's route
        #[serde(default)]
        connect_to_next: bool,
    },
    /// Map matching of a recorded coordinate trace
    Match {
        name: String,
        #[serde(default)]
        coordinates: Vec<Coordinate>,
        #[serde(default)]
        coordinates_file: Option<PathBuf>,
    },
}

impl LegSpec {
    pub fn name(&self) -> &str {
        match self {
            LegSpec::Route { name, .. } | LegSpec::Match { name, .. } => name,
        }
    }

    /// Inline points, or the referenced fixture file when none are inline
    fn load_input(&self, base_dir: &Path) -> std::result::Result<LegInput, ConfigError> {
        match self {
            LegSpec::Route {
                waypoints,
                waypoints_file: Some(file),
                ..
            } if waypoints.is_empty() => {
                Ok(LegInput::Waypoints(load_waypoints(&base_dir.join(file))?))
            }
            LegSpec::Route { waypoints, .. } => Ok(LegInput::Waypoints(waypoints.clone())),
            LegSpec::Match {
                coordinates,
                coordinates_file: Some(file),
                ..
            } if coordinates.is_empty() => {
                Ok(LegInput::Trace(load_coordinates(&base_dir.join(file))?))
            }
            LegSpec::Match { coordinates, .. } => Ok(LegInput::Trace(coordinates.clone())),
        }
    }

    fn connects_to_next(&self) -> bool {
        matches!(
            self,
            LegSpec::Route {
                connect_to_next: true,
                ..
            }
        )
    }
}

enum LegInput {
    Waypoints(Vec<Waypoint>),
    Trace(Vec<Coordinate>),
}

/// Read a JSON array of `[longitude, latitude]` pairs
pub fn load_coordinates(path: &Path) -> std::result::Result<Vec<Coordinate>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Decode {
        what: path.display().to_string(),
        source,
    })
}

/// A plan fixture file
#[derive(Debug, Clone, Deserialize)]
pub struct PlanConfig {
    /// Travel mode; the caller's default applies when absent
    #[serde(default)]
    pub profile: Option<Profile>,
    pub legs: Vec<LegSpec>,
    /// Gap tolerance between legs; the caller's default applies when absent
    #[serde(default)]
    pub max_leg_gap_m: Option<f64>,
    /// Directory that relative fixture paths resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl PlanConfig {
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|source| ConfigError::Decode {
            what: "plan".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json(&contents)?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    /// Fill settings the plan file left out
    pub fn fill_defaults(&mut self, profile: Profile, max_leg_gap_m: f64) {
        self.profile.get_or_insert(profile);
        self.max_leg_gap_m.get_or_insert(max_leg_gap_m);
    }

    pub fn profile(&self) -> Profile {
        self.profile.unwrap_or_default()
    }

    pub fn gap_tolerance(&self) -> f64 {
        self.max_leg_gap_m.unwrap_or(DEFAULT_MAX_LEG_GAP_M)
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.legs.is_empty() {
            return Err(ConfigError::Invalid("plan has no legs".to_string()));
        }
        if let Some(LegSpec::Route {
            connect_to_next: true,
            name,
            ..
        }) = self.legs.last()
        {
            return Err(ConfigError::Invalid(format!(
                "last leg '{}' has no next leg to connect to",
                name
            )));
        }
        Ok(())
    }
}

/// Resolves a [`PlanConfig`] into a [`RoutePlan`] through a routing service
pub struct RoutePlanner<'a, R: RoutingService + ?Sized> {
    router: &'a R,
}

impl<'a, R: RoutingService + ?Sized> RoutePlanner<'a, R> {
    pub fn new(router: &'a R) -> Self {
        Self { router }
    }

    /// Resolve every leg, last to first, so that a leg marked
    /// `connect_to_next` can target the start of the already resolved next
    /// route.
    ///
    /// Fixture files for all legs are read before any routing request, so a
    /// bad file surfaces as [`ConfigError`]. The first routing failure aborts
    /// the whole plan. Failures are returned, not logged.
    pub async fn resolve(&self, config: &PlanConfig) -> Result<RoutePlan> {
        let inputs = config
            .legs
            .iter()
            .map(|leg_spec| leg_spec.load_input(&config.base_dir))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let profile = config.profile();
        let mut resolved: Vec<Leg> = Vec::with_capacity(config.legs.len());
        let mut next_start: Option<Coordinate> = None;

        for (index, (leg_spec, input)) in config.legs.iter().zip(inputs).enumerate().rev() {
            let target = next_start.filter(|_| leg_spec.connects_to_next());
            let route = self
                .resolve_leg(input, target, profile)
                .await
                .map_err(|source| PlanError::Leg {
                    index,
                    name: leg_spec.name().to_string(),
                    source,
                })?;

            if !route.is_valid() {
                return Err(PlanError::InvalidLeg {
                    index,
                    name: leg_spec.name().to_string(),
                    reason: format!("route has {} point(s)", route.geometry.len()),
                }
                .into());
            }

            info!(
                "Resolved leg {} ({}) via {}: {:.0} m, {} points",
                index,
                leg_spec.name(),
                self.router.name(),
                route.distance_m,
                route.geometry.len()
            );
            next_start = route.start();
            resolved.push(Leg::new(index, leg_spec.name(), route));
        }

        resolved.reverse();
        let plan = RoutePlan::new(resolved)?.with_profile(profile);

        for (leg, gap) in plan.continuity_gaps(config.gap_tolerance()) {
            warn!(
                "Leg {} ends {:.1} m from the start of leg {}",
                leg,
                gap,
                leg + 1
            );
        }

        Ok(plan)
    }

    async fn resolve_leg(
        &self,
        input: LegInput,
        connect_to: Option<Coordinate>,
        profile: Profile,
    ) -> std::result::Result<Route, RoutingError> {
        let routes = match input {
            LegInput::Waypoints(mut waypoints) => {
                if let Some(target) = connect_to {
                    match waypoints.len() {
                        0 | 1 => waypoints.push(Waypoint::new(target)),
                        _ => {
                            if let Some(last) = waypoints.last_mut() {
                                last.location = target;
                            }
                        }
                    }
                }
                let request = RouteRequest::new(waypoints, profile)?;
                self.router.calculate(&request).await?
            }
            LegInput::Trace(coordinates) => {
                let request = MatchRequest::new(coordinates, profile)?;
                self.router.match_trace(&request).await?
            }
        };

        routes.into_iter().next().ok_or(RoutingError::NoRoute)
    }
}

/// Load a plan file and resolve it in one step
pub async fn load_plan<R: RoutingService + ?Sized>(path: &Path, router: &R) -> Result<RoutePlan> {
    let config = PlanConfig::load(path)?;
    RoutePlanner::new(router).resolve(&config).await
}

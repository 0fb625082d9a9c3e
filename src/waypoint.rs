// src/waypoint.rs
//! Serialized waypoint fixtures and route plan export

use crate::error::{ConfigError, Result};
use crate::geo::Coordinate;
use crate::plan::RoutePlan;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// A routing waypoint in the navigation SDK's serialized form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub location: Coordinate,
    /// Radius in meters around `location`; `None` when unknown
    #[serde(default, deserialize_with = "known_accuracy")]
    pub coordinate_accuracy: Option<f64>,
    #[serde(default = "default_true")]
    pub separates_legs: bool,
    #[serde(default = "default_true")]
    pub allows_arriving_on_opposite_side: bool,
    #[serde(default)]
    pub target_coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_accuracy: Option<f64>,
}

fn default_true() -> bool {
    true
}

// The SDK writes -1 (or null) for "accuracy unknown"
fn known_accuracy<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|accuracy| *accuracy >= 0.0))
}

impl Waypoint {
    pub fn new(location: Coordinate) -> Self {
        Self {
            location,
            coordinate_accuracy: None,
            separates_legs: true,
            allows_arriving_on_opposite_side: true,
            target_coordinate: None,
            name: None,
            heading: None,
            heading_accuracy: None,
        }
    }

    pub fn named(location: Coordinate, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::new(location)
        }
    }
}

/// Decode a serialized waypoint list.
///
/// Malformed JSON, an empty list, or an out-of-range location are reported as
/// [`ConfigError`] rather than aborting.
pub fn decode_waypoints(json: &str) -> std::result::Result<Vec<Waypoint>, ConfigError> {
    let waypoints: Vec<Waypoint> =
        serde_json::from_str(json).map_err(|source| ConfigError::Decode {
            what: "waypoint list".to_string(),
            source,
        })?;

    if waypoints.is_empty() {
        return Err(ConfigError::Invalid("waypoint list is empty".to_string()));
    }

    if let Some((i, wp)) = waypoints
        .iter()
        .enumerate()
        .find(|(_, wp)| !wp.location.is_valid())
    {
        return Err(ConfigError::Invalid(format!(
            "waypoint {} has an invalid location {}",
            i, wp.location
        )));
    }

    Ok(waypoints)
}

pub fn load_waypoints(path: &Path) -> std::result::Result<Vec<Waypoint>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    decode_waypoints(&contents)
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum ExportFormat {
    Gpx,
    #[value(name = "geojson")]
    GeoJson,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Gpx => "gpx",
            ExportFormat::GeoJson => "geojson",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ExportFormat::Gpx => "GPX (GPS Exchange)",
            ExportFormat::GeoJson => "GeoJSON",
        }
    }
}

/// Writes a resolved plan out, one track or feature per leg
pub struct PlanExporter<'a> {
    plan: &'a RoutePlan,
}

impl<'a> PlanExporter<'a> {
    pub fn new(plan: &'a RoutePlan) -> Self {
        Self { plan }
    }

    pub fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let content = self.render(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Gpx => Ok(self.to_gpx()),
            ExportFormat::GeoJson => self.to_geojson(),
        }
    }

    fn to_gpx(&self) -> String {
        let mut gpx = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route-handoff" xmlns="http://www.topografix.com/GPX/1/1">
"#,
        );

        for leg in self.plan.legs() {
            gpx.push_str("  <trk>\n");
            gpx.push_str(&format!("    <name>{}</name>\n", Self::escape_xml(&leg.name)));
            gpx.push_str(&format!("    <number>{}</number>\n", leg.index));
            gpx.push_str("    <trkseg>\n");
            for point in &leg.route.geometry {
                gpx.push_str(&format!(
                    "      <trkpt lat=\"{}\" lon=\"{}\"/>\n",
                    point.latitude, point.longitude
                ));
            }
            gpx.push_str("    </trkseg>\n");
            gpx.push_str("  </trk>\n");
        }

        gpx.push_str("</gpx>\n");
        gpx
    }

    fn to_geojson(&self) -> Result<String> {
        let features: Vec<serde_json::Value> = self
            .plan
            .legs()
            .iter()
            .map(|leg| {
                serde_json::json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "LineString",
                        "coordinates": leg.route.geometry,
                    },
                    "properties": {
                        "leg": leg.index,
                        "name": leg.name,
                        "distance_m": leg.route.distance_m,
                        "duration_s": leg.route.duration_s,
                    }
                })
            })
            .collect();

        let feature_collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": features
        });

        Ok(serde_json::to_string_pretty(&feature_collection)?)
    }

    fn escape_xml(s: &str) -> String {
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&apos;")
    }
}

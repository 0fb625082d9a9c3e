// src/geo.rs
//! Coordinates and polyline measurements

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in degrees.
///
/// Serialized as a `[longitude, latitude]` pair, the order used by GeoJSON
/// and by serialized waypoint fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        haversine_distance(self, other)
    }

    /// Initial bearing towards `other`, in degrees clockwise from north
    pub fn bearing_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let y = dlon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
        (y.atan2(x).to_degrees() + 360.0) % 360.0
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            longitude: pair[0],
            latitude: pair[1],
        }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coord: Coordinate) -> Self {
        [coord.longitude, coord.latitude]
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Great-circle distance in meters
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

pub fn polyline_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance(&pair[0], &pair[1]))
        .sum()
}

/// Point `distance` meters along the polyline, clamped to its ends.
pub fn interpolate_along(points: &[Coordinate], distance: f64) -> Option<Coordinate> {
    let first = *points.first()?;
    if distance <= 0.0 {
        return Some(first);
    }

    let mut walked = 0.0;
    for pair in points.windows(2) {
        let segment = haversine_distance(&pair[0], &pair[1]);
        if walked + segment >= distance {
            if segment <= f64::EPSILON {
                return Some(pair[1]);
            }
            let t = (distance - walked) / segment;
            return Some(Coordinate {
                latitude: pair[0].latitude + (pair[1].latitude - pair[0].latitude) * t,
                longitude: pair[0].longitude + (pair[1].longitude - pair[0].longitude) * t,
            });
        }
        walked += segment;
    }

    points.last().copied()
}

/// Shortest distance in meters from `point` to any segment of the polyline.
///
/// Uses an equirectangular projection centred on `point`, which is accurate
/// at the scale of off-route detection.
pub fn distance_to_polyline(points: &[Coordinate], point: &Coordinate) -> Option<f64> {
    match points {
        [] => None,
        [only] => Some(haversine_distance(only, point)),
        _ => {
            let project = |c: &Coordinate| -> (f64, f64) {
                let x = (c.longitude - point.longitude).to_radians()
                    * point.latitude.to_radians().cos()
                    * EARTH_RADIUS_M;
                let y = (c.latitude - point.latitude).to_radians() * EARTH_RADIUS_M;
                (x, y)
            };

            points
                .windows(2)
                .map(|pair| {
                    let (ax, ay) = project(&pair[0]);
                    let (bx, by) = project(&pair[1]);
                    let (dx, dy) = (bx - ax, by - ay);
                    let len_sq = dx * dx + dy * dy;
                    let t = if len_sq <= f64::EPSILON {
                        0.0
                    } else {
                        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
                    };
                    let (cx, cy) = (ax + t * dx, ay + t * dy);
                    (cx * cx + cy * cy).sqrt()
                })
                .reduce(f64::min)
        }
    }
}

/// Displace a coordinate by a local north/east offset in meters
pub fn offset(coord: &Coordinate, meters_north: f64, meters_east: f64) -> Coordinate {
    let dlat = (meters_north / EARTH_RADIUS_M).to_degrees();
    let dlon = (meters_east / (EARTH_RADIUS_M * coord.latitude.to_radians().cos())).to_degrees();
    Coordinate {
        latitude: coord.latitude + dlat,
        longitude: coord.longitude + dlon,
    }
}

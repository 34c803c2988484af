//! Great-circle distance and proximity decisions.
//!
//! # Properties
//! - `is_within_radius(a, b, r) == is_within_radius(b, a, r)`
//! - `is_within_radius(a, a, r)` for every `r >= 0`
//! - `is_within_radius(a, b, r1) && r2 > r1 => is_within_radius(a, b, r2)`

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    #[serde(rename = "lat", alias = "latitude")]
    pub latitude: f64,
    #[serde(rename = "lng", alias = "lon", alias = "longitude")]
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside the valid latitude/longitude ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Round both components to `places` decimals.
    pub fn rounded(&self, places: i32) -> Self {
        let factor = 10f64.powi(places);
        Self {
            latitude: (self.latitude * factor).round() / factor,
            longitude: (self.longitude * factor).round() / factor,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

/// Tolerance around a target, in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProximityRadius(f64);

impl ProximityRadius {
    /// Radius for quest and item steps.
    pub const QUEST_DEFAULT: ProximityRadius = ProximityRadius(80.0);
    /// Radius for broader venue checks (malls, hospitals).
    pub const VENUE_DEFAULT: ProximityRadius = ProximityRadius(120.0);

    /// Returns `None` for negative or non-finite values.
    pub fn new(meters: f64) -> Option<Self> {
        (meters.is_finite() && meters >= 0.0).then_some(Self(meters))
    }

    pub fn meters(&self) -> f64 {
        self.0
    }
}

impl Default for ProximityRadius {
    fn default() -> Self {
        Self::QUEST_DEFAULT
    }
}

/// Haversine distance between two coordinates in meters.
pub fn distance_meters(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// True iff `user` is no farther than `radius` from `target`.
pub fn is_within_radius(user: Coordinate, target: Coordinate, radius: ProximityRadius) -> bool {
    ProximityCheck::evaluate(user, target, radius).within
}

/// Outcome of one proximity evaluation, kept for error messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProximityCheck {
    pub distance_meters: f64,
    pub radius_meters: f64,
    pub within: bool,
}

impl ProximityCheck {
    pub fn evaluate(user: Coordinate, target: Coordinate, radius: ProximityRadius) -> Self {
        let distance = distance_meters(user, target);
        Self {
            distance_meters: distance,
            radius_meters: radius.meters(),
            within: distance <= radius.meters(),
        }
    }
}

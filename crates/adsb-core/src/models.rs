//! Core data models for the surveillance pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One raw surveillance report as delivered by the polling layer.
///
/// Every field except the id is optional; numeric fields that are missing,
/// null or non-finite are tolerated and normalized to `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReport {
    #[serde(default, alias = "icao24", alias = "hex")]
    pub id: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Barometric altitude in feet
    #[serde(default, alias = "altitude")]
    pub altitude_ft: Option<f64>,
    /// Ground speed in knots
    #[serde(default, alias = "groundSpeed", alias = "speed")]
    pub ground_speed_kt: Option<f64>,
    /// Track over ground in degrees
    #[serde(default, alias = "heading", alias = "track")]
    pub heading_deg: Option<f64>,
    /// Vertical rate in feet per minute
    #[serde(default, alias = "verticalRate")]
    pub vertical_rate_fpm: Option<f64>,
    #[serde(default)]
    pub squawk: Option<String>,
    /// Explicit emergency flag; derived from the squawk when absent
    #[serde(default)]
    pub emergency: Option<bool>,
}

/// Last known position of a track. Any component may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude_ft: Option<f64>,
}

impl Position {
    /// Horizontal position, only when both coordinates are known.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub ground_speed_kt: Option<f64>,
    pub heading_deg: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,
}

/// Reconciled state of one aircraft for the current tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftTrack {
    /// Uppercased surveillance identifier (ICAO24)
    pub id: String,
    pub callsign: Option<String>,
    pub position: Position,
    pub velocity: Velocity,
    pub squawk: Option<String>,
    pub emergency: bool,
    pub first_seen: DateTime<Utc>,
    /// Tick time of the most recent report carrying this id
    pub last_seen: DateTime<Utc>,
    /// Tick time of the most recent change to a tracked field
    pub last_update: DateTime<Utc>,
}

// ========== FLIGHT SESSIONS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// Airborne predicate went false
    Landed,
    /// Aircraft vanished from the snapshot
    Disappeared,
    /// No update within the flight end timeout
    Timeout,
}

/// The continuous interval during which an aircraft is classified airborne.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSession {
    pub session_id: u64,
    pub aircraft_id: String,
    pub start_time: DateTime<Utc>,
    pub start_position: Position,
    pub last_position: Position,
    pub last_update: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub end_position: Option<Position>,
    pub duration_ms: Option<i64>,
    pub end_reason: Option<EndReason>,
}

impl FlightSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

// ========== ZONES ==========

/// A polygon that aircraft should be tracked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub name: String,
    pub zone_type: ZoneType,
    /// Polygon vertices; open or closed ring, at least 3 points
    pub polygon: Vec<GeoPoint>,
    /// Optional altitude floor in feet
    #[serde(default)]
    pub floor_ft: Option<f64>,
    /// Optional altitude ceiling in feet
    #[serde(default)]
    pub ceiling_ft: Option<f64>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneType {
    /// No flights allowed
    NoFlyZone,
    /// Flights allowed with authorization
    RestrictedArea,
    /// Temporary flight restriction (TFR)
    TemporaryRestriction,
    /// Advisory only (not enforced)
    Advisory,
}

impl Zone {
    /// Membership test for a track position.
    ///
    /// Returns `None` when the position does not carry enough data to
    /// decide (no coordinates, or an altitude band with unknown altitude).
    pub fn contains(&self, position: &Position) -> Option<bool> {
        let point = position.point()?;
        if self.floor_ft.is_some() || self.ceiling_ft.is_some() {
            let altitude = position.altitude_ft?;
            if self.floor_ft.is_some_and(|floor| altitude < floor)
                || self.ceiling_ft.is_some_and(|ceiling| altitude > ceiling)
            {
                return Some(false);
            }
        }
        Some(crate::spatial::point_in_polygon(point, &self.polygon))
    }

    /// Validate zone geometry.
    /// Returns list of validation errors (empty = valid).
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.polygon.len() < 3 {
            errors.push("Polygon must have at least 3 vertices".to_string());
        }
        if self.polygon.iter().any(|p| {
            !p.lat.is_finite() || !p.lon.is_finite() || p.lat.abs() > 90.0 || p.lon.abs() > 180.0
        }) {
            errors.push("Polygon vertices must be valid coordinates".to_string());
        }
        if let (Some(floor), Some(ceiling)) = (self.floor_ft, self.ceiling_ft) {
            if floor >= ceiling {
                errors.push(format!(
                    "Floor ({}) must be less than ceiling ({})",
                    floor, ceiling
                ));
            }
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Request to create a new zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateZoneRequest {
    pub name: String,
    pub zone_type: ZoneType,
    pub polygon: Vec<GeoPoint>,
    #[serde(default)]
    pub floor_ft: Option<f64>,
    #[serde(default)]
    pub ceiling_ft: Option<f64>,
}

/// Request to update an existing zone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateZoneRequest {
    pub name: Option<String>,
    pub zone_type: Option<ZoneType>,
    pub polygon: Option<Vec<GeoPoint>>,
    pub floor_ft: Option<f64>,
    pub ceiling_ft: Option<f64>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    Active,
    Resolved,
}

/// Why a violation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Position left the polygon
    Left,
    /// Aircraft disappeared from surveillance while inside
    Disappeared,
    /// Zone was deactivated or deleted
    ZoneInactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneViolation {
    pub id: u64,
    pub zone_id: String,
    pub aircraft_id: String,
    pub status: ViolationStatus,
    pub entered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// ========== AIRPORTS ==========

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runway {
    /// Runway designator, e.g. "12" or "30L"
    pub id: String,
    pub heading_deg: f64,
    pub length_m: f64,
    /// Representative point (threshold or midpoint)
    pub location: GeoPoint,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub icao: String,
    pub name: String,
    pub location: GeoPoint,
    pub runways: Vec<Runway>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunwayUsageSample {
    pub aircraft_id: String,
    pub runway_id: String,
    pub timestamp: DateTime<Utc>,
}

// ========== DETECTIONS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionType {
    Approach,
    Departure,
    Landing,
    GroundMovement,
    Taxi,
    Parking,
    HelicopterAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxiPhase {
    RunwayApproach,
    Taxiway,
    Apron,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkingArea {
    Terminal,
    Apron,
    RemoteParking,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelicopterAction {
    Hover,
    VerticalClimb,
    VerticalDescent,
    Transit,
}

/// Where the rotorcraft classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelicopterSource {
    Registration,
    Heuristic,
}

/// Maneuver-specific detail carried by a detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionMetadata {
    Approach { airspace: String },
    Departure { airspace: String },
    Landing { seconds_since_approach: i64 },
    GroundMovement { ground_speed_kt: Option<f64> },
    Taxi { phase: TaxiPhase, distance_to_runway_km: Option<f64> },
    Parking { area: ParkingArea, distance_to_center_km: f64 },
    Helicopter { action: HelicopterAction, source: HelicopterSource },
}

/// A heuristic maneuver classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub detection_type: DetectionType,
    pub aircraft_id: String,
    pub airport: Option<String>,
    pub runway: Option<String>,
    /// Heuristic certainty in `[0, 1]`
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub metadata: DetectionMetadata,
}

// ========== ENRICHMENT ==========

/// Registration record from the external aircraft database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrationInfo {
    pub registration: Option<String>,
    pub aircraft_type: Option<String>,
    pub operator: Option<String>,
    /// `Some(true)` when the registry classifies the airframe as rotorcraft
    pub rotorcraft: Option<bool>,
}

/// Reference entry for a transponder code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquawkInfo {
    pub code: String,
    pub description: String,
}

/// Best-effort lookup results gathered for one tick.
///
/// Keyed by normalized aircraft id. Missing entries mean the lookup was
/// unavailable or returned nothing; the core treats both the same way.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub registrations: HashMap<String, RegistrationInfo>,
    /// Names of the airspaces containing each aircraft. An absent key means
    /// membership is unknown this tick, not "outside everything".
    pub airspaces: HashMap<String, Vec<String>>,
    /// Keyed by squawk code
    pub squawks: HashMap<String, SquawkInfo>,
}

impl Enrichment {
    pub fn registration(&self, aircraft_id: &str) -> Option<&RegistrationInfo> {
        self.registrations.get(aircraft_id)
    }

    pub fn airspaces(&self, aircraft_id: &str) -> Option<&[String]> {
        self.airspaces.get(aircraft_id).map(Vec::as_slice)
    }

    pub fn squawk(&self, code: &str) -> Option<&SquawkInfo> {
        self.squawks.get(code)
    }
}

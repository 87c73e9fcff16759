//! Heuristic maneuver classifiers.
//!
//! These thresholds are tuning knobs calibrated by eye, not physical limits.
//! Keep them here so they can be recalibrated against recorded traffic.

use crate::models::{AircraftTrack, HelicopterAction, ParkingArea, TaxiPhase};

/// Below this altitude an aircraft counts as on the ground (ft)
pub const ON_GROUND_MAX_ALT_FT: f64 = 50.0;

pub const TAXI_MAX_ALT_FT: f64 = 20.0;
pub const TAXI_MIN_SPEED_KT: f64 = 5.0;
pub const TAXI_MAX_SPEED_KT: f64 = 50.0;

pub const PARKED_MAX_ALT_FT: f64 = 10.0;
pub const PARKED_MAX_SPEED_KT: f64 = 5.0;

pub const HELICOPTER_MIN_VERTICAL_RATE_FPM: f64 = 1000.0;
pub const HELICOPTER_MAX_SPEED_KT: f64 = 100.0;
pub const HOVER_MAX_SPEED_KT: f64 = 10.0;

pub const LANDING_MAX_ALT_FT: f64 = 100.0;
pub const LANDING_MAX_VERTICAL_RATE_FPM: f64 = 100.0;
pub const LANDING_MAX_SPEED_KT: f64 = 150.0;
/// An approach must have been seen this recently for a landing to count
pub const LANDING_APPROACH_WINDOW_MINUTES: i64 = 5;

/// Starting confidence for approach/departure detections
pub const BASE_CONFIDENCE: f64 = 0.5;
/// Bonus for a vertical rate consistent with the maneuver
pub const VERTICAL_RATE_BONUS: f64 = 0.3;
/// Bonus for a speed consistent with the maneuver
pub const SPEED_BONUS: f64 = 0.2;

pub const APPROACH_DESCENT_RATE_FPM: f64 = 300.0;
pub const APPROACH_MAX_SPEED_KT: f64 = 180.0;
pub const DEPARTURE_CLIMB_RATE_FPM: f64 = 300.0;
pub const DEPARTURE_MIN_SPEED_KT: f64 = 100.0;

pub const LANDING_BASE_CONFIDENCE: f64 = 0.6;
pub const LANDING_RUNWAY_BONUS: f64 = 0.2;
pub const LANDING_TOUCHDOWN_BONUS: f64 = 0.2;

pub const GROUND_BASE_CONFIDENCE: f64 = 0.6;
pub const GROUND_RUNWAY_BONUS: f64 = 0.3;

pub const HELICOPTER_REGISTRATION_CONFIDENCE: f64 = 0.9;
pub const HELICOPTER_HEURISTIC_CONFIDENCE: f64 = 0.6;

/// Taxi phase distance bands to the nearest runway (km)
pub const TAXI_RUNWAY_APPROACH_KM: f64 = 0.5;
pub const TAXI_TAXIWAY_KM: f64 = 1.0;

/// Parking area distance bands to the airport reference point (km)
pub const PARKING_TERMINAL_KM: f64 = 0.3;
pub const PARKING_APRON_KM: f64 = 0.8;
pub const PARKING_REMOTE_KM: f64 = 1.5;

/// The kinematic slice of a track the classifiers look at.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Kinematics {
    pub altitude_ft: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,
}

impl From<&AircraftTrack> for Kinematics {
    fn from(track: &AircraftTrack) -> Self {
        Self {
            altitude_ft: track.position.altitude_ft,
            ground_speed_kt: track.velocity.ground_speed_kt,
            vertical_rate_fpm: track.velocity.vertical_rate_fpm,
        }
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

pub fn is_on_ground(k: &Kinematics) -> bool {
    k.altitude_ft.is_some_and(|alt| alt < ON_GROUND_MAX_ALT_FT)
}

pub fn is_taxiing(k: &Kinematics) -> bool {
    matches!(
        (k.altitude_ft, k.ground_speed_kt),
        (Some(alt), Some(speed))
            if alt < TAXI_MAX_ALT_FT && speed > TAXI_MIN_SPEED_KT && speed < TAXI_MAX_SPEED_KT
    )
}

pub fn is_parked(k: &Kinematics) -> bool {
    matches!(
        (k.altitude_ft, k.ground_speed_kt),
        (Some(alt), Some(speed)) if alt < PARKED_MAX_ALT_FT && speed < PARKED_MAX_SPEED_KT
    )
}

/// Rotorcraft test. A registry answer wins; the kinematic heuristic is only
/// a fallback when the registry has nothing to say.
pub fn is_helicopter(registry_rotorcraft: Option<bool>, k: &Kinematics) -> bool {
    match registry_rotorcraft {
        Some(known) => known,
        None => matches!(
            (k.vertical_rate_fpm, k.ground_speed_kt),
            (Some(rate), Some(speed))
                if rate.abs() > HELICOPTER_MIN_VERTICAL_RATE_FPM && speed < HELICOPTER_MAX_SPEED_KT
        ),
    }
}

/// Low, not climbing and slow enough to be on short final or rolling out.
/// The recent-approach condition is checked by the caller.
pub fn is_landing_profile(k: &Kinematics) -> bool {
    matches!(
        (k.altitude_ft, k.vertical_rate_fpm, k.ground_speed_kt),
        (Some(alt), Some(rate), Some(speed))
            if alt <= LANDING_MAX_ALT_FT
                && rate <= LANDING_MAX_VERTICAL_RATE_FPM
                && speed <= LANDING_MAX_SPEED_KT
    )
}

pub fn is_climbing(k: &Kinematics) -> bool {
    k.vertical_rate_fpm
        .is_some_and(|rate| rate >= DEPARTURE_CLIMB_RATE_FPM)
}

pub fn approach_confidence(k: &Kinematics) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if k.vertical_rate_fpm.is_some_and(|rate| rate <= -APPROACH_DESCENT_RATE_FPM) {
        confidence += VERTICAL_RATE_BONUS;
    }
    if k.ground_speed_kt.is_some_and(|speed| speed < APPROACH_MAX_SPEED_KT) {
        confidence += SPEED_BONUS;
    }
    clamp_confidence(confidence)
}

pub fn departure_confidence(k: &Kinematics) -> f64 {
    let mut confidence = BASE_CONFIDENCE;
    if is_climbing(k) {
        confidence += VERTICAL_RATE_BONUS;
    }
    if k.ground_speed_kt.is_some_and(|speed| speed > DEPARTURE_MIN_SPEED_KT) {
        confidence += SPEED_BONUS;
    }
    clamp_confidence(confidence)
}

pub fn landing_confidence(k: &Kinematics, runway_known: bool) -> f64 {
    let mut confidence = LANDING_BASE_CONFIDENCE;
    if runway_known {
        confidence += LANDING_RUNWAY_BONUS;
    }
    if is_on_ground(k) {
        confidence += LANDING_TOUCHDOWN_BONUS;
    }
    clamp_confidence(confidence)
}

pub fn ground_confidence(runway_known: bool) -> f64 {
    let bonus = if runway_known { GROUND_RUNWAY_BONUS } else { 0.0 };
    clamp_confidence(GROUND_BASE_CONFIDENCE + bonus)
}

pub fn taxi_phase(distance_to_runway_km: Option<f64>) -> TaxiPhase {
    match distance_to_runway_km {
        Some(d) if d < TAXI_RUNWAY_APPROACH_KM => TaxiPhase::RunwayApproach,
        Some(d) if d < TAXI_TAXIWAY_KM => TaxiPhase::Taxiway,
        _ => TaxiPhase::Apron,
    }
}

pub fn parking_area(distance_to_center_km: f64) -> ParkingArea {
    if distance_to_center_km < PARKING_TERMINAL_KM {
        ParkingArea::Terminal
    } else if distance_to_center_km < PARKING_APRON_KM {
        ParkingArea::Apron
    } else if distance_to_center_km < PARKING_REMOTE_KM {
        ParkingArea::RemoteParking
    } else {
        ParkingArea::Maintenance
    }
}

pub fn helicopter_action(k: &Kinematics) -> HelicopterAction {
    let rate = k.vertical_rate_fpm.unwrap_or(0.0);
    if rate > HELICOPTER_MIN_VERTICAL_RATE_FPM {
        HelicopterAction::VerticalClimb
    } else if rate < -HELICOPTER_MIN_VERTICAL_RATE_FPM {
        HelicopterAction::VerticalDescent
    } else if k.ground_speed_kt.is_some_and(|speed| speed < HOVER_MAX_SPEED_KT)
        && !is_on_ground(k)
    {
        HelicopterAction::Hover
    } else {
        HelicopterAction::Transit
    }
}

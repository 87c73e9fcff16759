//! Closed set of domain events produced by the core.

use serde::Serialize;

use crate::models::{
    AircraftTrack, DetectionEvent, DetectionType, ExitReason, FlightSession, GeoPoint,
    RegistrationInfo, ZoneViolation,
};
use crate::rules::EmergencyKind;

/// Old and new value of one changed field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueChange<T> {
    pub from: T,
    pub to: T,
}

/// Fields that differ between two consecutive ticks of one track.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<ValueChange<Option<GeoPoint>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude_ft: Option<ValueChange<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_speed_kt: Option<ValueChange<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency: Option<ValueChange<bool>>,
}

impl TrackDiff {
    pub fn between(old: &AircraftTrack, new: &AircraftTrack) -> Self {
        fn change<T: PartialEq + Copy>(from: T, to: T) -> Option<ValueChange<T>> {
            (from != to).then_some(ValueChange { from, to })
        }

        Self {
            position: change(old.position.point(), new.position.point()),
            altitude_ft: change(old.position.altitude_ft, new.position.altitude_ft),
            ground_speed_kt: change(old.velocity.ground_speed_kt, new.velocity.ground_speed_kt),
            emergency: change(old.emergency, new.emergency),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.altitude_ft.is_none()
            && self.ground_speed_kt.is_none()
            && self.emergency.is_none()
    }
}

/// Component that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Tracks,
    Flights,
    Geofence,
    Airport,
}

/// A domain event. Consumers match on the variant; `event_type` gives the
/// wire name used by the aggregator envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrackEvent {
    Appeared {
        track: AircraftTrack,
        registration: Option<RegistrationInfo>,
    },
    Updated {
        track: AircraftTrack,
        diff: TrackDiff,
    },
    Disappeared {
        track: AircraftTrack,
    },
    Emergency {
        aircraft_id: String,
        kind: EmergencyKind,
        squawk: Option<String>,
        description: Option<String>,
    },
    FlightStarted {
        session: FlightSession,
    },
    FlightUpdated {
        session: FlightSession,
    },
    FlightEnded {
        session: FlightSession,
    },
    ZoneEntered {
        zone_name: String,
        violation: ZoneViolation,
    },
    ZoneExited {
        zone_name: String,
        violation: ZoneViolation,
        reason: ExitReason,
    },
    Detection(DetectionEvent),
}

impl TrackEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            TrackEvent::Appeared { .. } => "appeared",
            TrackEvent::Updated { .. } => "updated",
            TrackEvent::Disappeared { .. } => "disappeared",
            TrackEvent::Emergency { .. } => "emergency",
            TrackEvent::FlightStarted { .. } => "flight:started",
            TrackEvent::FlightUpdated { .. } => "flight:updated",
            TrackEvent::FlightEnded { .. } => "flight:ended",
            TrackEvent::ZoneEntered { .. } => "zone:entered",
            TrackEvent::ZoneExited { .. } => "zone:exited",
            TrackEvent::Detection(detection) => match detection.detection_type {
                DetectionType::Approach => "approach:detected",
                DetectionType::Departure => "departure:detected",
                DetectionType::Landing => "landing:detected",
                DetectionType::GroundMovement => "ground:movement",
                DetectionType::Taxi => "taxi:detected",
                DetectionType::Parking => "parking:detected",
                DetectionType::HelicopterAction => "helicopter:action",
            },
        }
    }

    pub fn aircraft_id(&self) -> &str {
        match self {
            TrackEvent::Appeared { track, .. }
            | TrackEvent::Updated { track, .. }
            | TrackEvent::Disappeared { track } => &track.id,
            TrackEvent::Emergency { aircraft_id, .. } => aircraft_id,
            TrackEvent::FlightStarted { session }
            | TrackEvent::FlightUpdated { session }
            | TrackEvent::FlightEnded { session } => &session.aircraft_id,
            TrackEvent::ZoneEntered { violation, .. }
            | TrackEvent::ZoneExited { violation, .. } => &violation.aircraft_id,
            TrackEvent::Detection(detection) => &detection.aircraft_id,
        }
    }

    pub fn source(&self) -> EventSource {
        match self {
            TrackEvent::Appeared { .. }
            | TrackEvent::Updated { .. }
            | TrackEvent::Disappeared { .. }
            | TrackEvent::Emergency { .. } => EventSource::Tracks,
            TrackEvent::FlightStarted { .. }
            | TrackEvent::FlightUpdated { .. }
            | TrackEvent::FlightEnded { .. } => EventSource::Flights,
            TrackEvent::ZoneEntered { .. } | TrackEvent::ZoneExited { .. } => EventSource::Geofence,
            TrackEvent::Detection(_) => EventSource::Airport,
        }
    }
}

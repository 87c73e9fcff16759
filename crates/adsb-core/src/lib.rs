pub mod airport;
pub mod error;
pub mod events;
pub mod flight;
pub mod geofence;
pub mod maneuver;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod rules;
pub mod spatial;

pub use airport::{best_runway, score_runway, select_airport, AirportInferenceEngine};
pub use error::CoreError;
pub use events::{EventSource, TrackDiff, TrackEvent, ValueChange};
pub use flight::{is_airborne, FlightStateMachine};
pub use geofence::{GeofenceEngine, ZoneRegistry};
pub use models::{
    AircraftTrack, Airport, CreateZoneRequest, DetectionEvent, DetectionMetadata, DetectionType,
    EndReason, Enrichment, ExitReason, FlightSession, GeoPoint, Position, RawReport,
    RegistrationInfo, Runway, RunwayUsageSample, SquawkInfo, UpdateZoneRequest, Velocity,
    ViolationStatus, Zone, ZoneType, ZoneViolation,
};
pub use pipeline::{PurgeStats, SurveillanceCore, TickOutput};
pub use reconcile::{normalize_report, reconcile, Reconciliation, TrackTable};
pub use rules::{EmergencyCode, EmergencyKind, TrackingRules};
pub use spatial::haversine_distance;

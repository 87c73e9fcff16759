//! Airport-relative inference: airport selection, runway alignment, runway
//! usage and maneuver detections.
//!
//! Everything here is heuristic. Detections carry a confidence in `[0, 1]`
//! and downstream consumers are expected to treat them as hints.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::events::TrackEvent;
use crate::maneuver::{
    approach_confidence, clamp_confidence, departure_confidence, ground_confidence,
    helicopter_action, is_helicopter, is_landing_profile, is_on_ground, is_parked, is_taxiing,
    landing_confidence, parking_area, taxi_phase, Kinematics,
    HELICOPTER_HEURISTIC_CONFIDENCE, HELICOPTER_REGISTRATION_CONFIDENCE,
    LANDING_APPROACH_WINDOW_MINUTES,
};
use crate::models::{
    AircraftTrack, Airport, DetectionEvent, DetectionMetadata, DetectionType, Enrichment,
    GeoPoint, HelicopterAction, HelicopterSource, ParkingArea, Runway, RunwayUsageSample,
    TaxiPhase,
};
use crate::reconcile::TrackTable;
use crate::rules::TrackingRules;
use crate::spatial::{distance_km, heading_difference};

/// Airports further than this are never selected (km)
pub const AIRPORT_RADIUS_KM: f64 = 10.0;
pub const HEADING_WEIGHT: f64 = 0.7;
pub const PROXIMITY_WEIGHT: f64 = 0.3;
/// Heading difference at which the heading score reaches zero (deg)
pub const MAX_HEADING_DIFF_DEG: f64 = 45.0;
/// Distance at which the proximity score reaches zero (km)
pub const MAX_RUNWAY_DISTANCE_KM: f64 = 2.0;
/// A runway is only selected when it scores strictly above this
pub const MIN_RUNWAY_SCORE: f64 = 0.5;
pub const RUNWAY_USAGE_WINDOW_MINUTES: i64 = 30;

/// Pick the airport a position belongs to.
///
/// The home airport wins whenever it is within range; otherwise the nearest
/// airport within range is used.
pub fn select_airport<'a>(
    airports: &'a [Airport],
    point: GeoPoint,
    home: Option<&str>,
) -> Option<&'a Airport> {
    let in_range = airports
        .iter()
        .map(|airport| (airport, distance_km(point, airport.location)))
        .filter(|(_, distance)| *distance <= AIRPORT_RADIUS_KM);

    if let Some(home) = home {
        let home_airport = in_range
            .clone()
            .find(|(airport, _)| airport.icao.eq_ignore_ascii_case(home));
        if let Some((airport, _)) = home_airport {
            return Some(airport);
        }
    }

    in_range
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(airport, _)| airport)
}

/// Alignment score of an aircraft against one runway, in `[0, 1]`.
pub fn score_runway(runway: &Runway, heading_deg: f64, point: GeoPoint) -> f64 {
    let diff = heading_difference(heading_deg, runway.heading_deg);
    let heading_score = (1.0 - diff / MAX_HEADING_DIFF_DEG).max(0.0);
    let proximity_score =
        (1.0 - distance_km(point, runway.location) / MAX_RUNWAY_DISTANCE_KM).max(0.0);
    HEADING_WEIGHT * heading_score + PROXIMITY_WEIGHT * proximity_score
}

/// Best scoring runway above the selection threshold.
pub fn best_runway(
    airport: &Airport,
    heading_deg: f64,
    point: GeoPoint,
) -> Option<(&Runway, f64)> {
    airport
        .runways
        .iter()
        .map(|runway| (runway, score_runway(runway, heading_deg, point)))
        .filter(|(_, score)| *score > MIN_RUNWAY_SCORE)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Airport context resolved for one observation.
#[derive(Debug, Clone)]
struct Site {
    icao: String,
    runway: Option<String>,
    distance_to_center_km: f64,
    nearest_runway_km: Option<f64>,
}

struct Observation<'a> {
    track: &'a AircraftTrack,
    kinematics: Kinematics,
    site: Option<Site>,
    now: DateTime<Utc>,
}

impl Observation<'_> {
    fn detection(
        &self,
        detection_type: DetectionType,
        confidence: f64,
        metadata: DetectionMetadata,
    ) -> TrackEvent {
        TrackEvent::Detection(DetectionEvent {
            detection_type,
            aircraft_id: self.track.id.clone(),
            airport: self.site.as_ref().map(|site| site.icao.clone()),
            runway: self.site.as_ref().and_then(|site| site.runway.clone()),
            confidence: clamp_confidence(confidence),
            timestamp: self.now,
            metadata,
        })
    }

    fn runway_known(&self) -> bool {
        self.site.as_ref().is_some_and(|site| site.runway.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroundState {
    Movement,
    Taxi(TaxiPhase),
    Parked(ParkingArea),
}

#[derive(Debug, Default)]
pub struct AirportInferenceEngine {
    airports: Vec<Airport>,
    usage: HashMap<String, Vec<RunwayUsageSample>>,
    last_approach: HashMap<String, DateTime<Utc>>,
    final_approach: HashMap<String, BTreeSet<String>>,
    ground: HashMap<String, GroundState>,
    helicopter: HashMap<String, HelicopterAction>,
}

impl AirportInferenceEngine {
    pub fn new(airports: Vec<Airport>) -> Self {
        Self {
            airports,
            ..Self::default()
        }
    }

    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    /// Replace the airport table. Usage samples for airports that are gone
    /// are dropped; runway flags are recomputed on the next tick.
    pub fn set_airports(&mut self, airports: Vec<Airport>) {
        self.usage
            .retain(|icao, _| airports.iter().any(|airport| &airport.icao == icao));
        self.airports = airports;
    }

    pub fn runway_usage(&self, icao: &str) -> &[RunwayUsageSample] {
        self.usage.get(icao).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_runway(&self, icao: &str) -> Option<&Runway> {
        self.airports
            .iter()
            .find(|airport| airport.icao == icao)?
            .runways
            .iter()
            .find(|runway| runway.active)
    }

    pub fn last_approach(&self, aircraft_id: &str) -> Option<DateTime<Utc>> {
        self.last_approach.get(aircraft_id).copied()
    }

    /// Low, slow, not climbing, and an approach was recorded recently.
    pub fn is_likely_landing(&self, track: &AircraftTrack, now: DateTime<Utc>) -> bool {
        self.last_approach(&track.id).is_some_and(|at| {
            now - at <= Duration::minutes(LANDING_APPROACH_WINDOW_MINUTES)
        }) && is_landing_profile(&Kinematics::from(track))
    }

    /// Run inference for every positioned aircraft in the table.
    pub fn process(
        &mut self,
        tracks: &TrackTable,
        disappeared: &[AircraftTrack],
        enrichment: &Enrichment,
        rules: &TrackingRules,
        now: DateTime<Utc>,
    ) -> Vec<TrackEvent> {
        let mut events = Vec::new();

        for track in tracks.values() {
            let (Some(point), Some(_)) = (track.position.point(), track.position.altitude_ft)
            else {
                debug!("Skipping airport inference for {}: partial position", track.id);
                continue;
            };
            let site = self.locate(
                point,
                track.velocity.heading_deg,
                rules.home_airport.as_deref(),
            );
            let observation = Observation {
                track,
                kinematics: Kinematics::from(track),
                site,
                now,
            };

            self.record_usage(&observation);
            events.extend(self.airspace_transitions(&observation, enrichment, rules));
            events.extend(self.landing(&observation));
            events.extend(self.ground_movement(&observation));
            events.extend(self.helicopter(&observation, enrichment));
        }

        for track in disappeared {
            self.forget(&track.id);
        }
        self.prune_usage(now);

        events
    }

    fn locate(
        &self,
        point: GeoPoint,
        heading_deg: Option<f64>,
        home: Option<&str>,
    ) -> Option<Site> {
        let airport = select_airport(&self.airports, point, home)?;
        let runway = heading_deg
            .and_then(|heading| best_runway(airport, heading, point))
            .map(|(runway, _)| runway.id.clone());
        let nearest_runway_km = airport
            .runways
            .iter()
            .map(|runway| distance_km(point, runway.location))
            .min_by(f64::total_cmp);

        Some(Site {
            icao: airport.icao.clone(),
            runway,
            distance_to_center_km: distance_km(point, airport.location),
            nearest_runway_km,
        })
    }

    fn record_usage(&mut self, observation: &Observation<'_>) {
        let Some(Site {
            icao,
            runway: Some(runway_id),
            ..
        }) = &observation.site
        else {
            return;
        };

        self.usage.entry(icao.clone()).or_default().push(RunwayUsageSample {
            aircraft_id: observation.track.id.clone(),
            runway_id: runway_id.clone(),
            timestamp: observation.now,
        });
    }

    fn airspace_transitions(
        &mut self,
        observation: &Observation<'_>,
        enrichment: &Enrichment,
        rules: &TrackingRules,
    ) -> Vec<TrackEvent> {
        let track = observation.track;
        // Unknown membership this tick: keep the previous state.
        let Some(airspaces) = enrichment.airspaces(&track.id) else {
            return Vec::new();
        };

        let marker = rules.final_approach_marker.to_lowercase();
        let current: BTreeSet<String> = airspaces
            .iter()
            .filter(|name| name.to_lowercase().contains(&marker))
            .cloned()
            .collect();
        let previous = self
            .final_approach
            .insert(track.id.clone(), current.clone())
            .unwrap_or_default();

        // Entering is an approach and leaving is a departure. Kinematics only
        // move the confidence.
        let mut events = Vec::new();
        for airspace in current.difference(&previous) {
            info!("{} approaching via '{}'", track.id, airspace);
            self.last_approach.insert(track.id.clone(), observation.now);
            events.push(observation.detection(
                DetectionType::Approach,
                approach_confidence(&observation.kinematics),
                DetectionMetadata::Approach {
                    airspace: airspace.clone(),
                },
            ));
        }
        for airspace in previous.difference(&current) {
            info!("{} departing via '{}'", track.id, airspace);
            events.push(observation.detection(
                DetectionType::Departure,
                departure_confidence(&observation.kinematics),
                DetectionMetadata::Departure {
                    airspace: airspace.clone(),
                },
            ));
        }

        events
    }

    fn landing(&mut self, observation: &Observation<'_>) -> Option<TrackEvent> {
        let track = observation.track;
        let approached_at = self.last_approach(&track.id)?;
        let since_approach = observation.now - approached_at;

        if since_approach > Duration::minutes(LANDING_APPROACH_WINDOW_MINUTES) {
            debug!("Approach for {} expired without a landing", track.id);
            self.last_approach.remove(&track.id);
            return None;
        }
        if !self.is_likely_landing(track, observation.now) {
            return None;
        }

        // One landing per recorded approach.
        self.last_approach.remove(&track.id);
        info!("{} landing", track.id);
        Some(observation.detection(
            DetectionType::Landing,
            landing_confidence(&observation.kinematics, observation.runway_known()),
            DetectionMetadata::Landing {
                seconds_since_approach: since_approach.num_seconds(),
            },
        ))
    }

    fn ground_movement(&mut self, observation: &Observation<'_>) -> Option<TrackEvent> {
        let track = observation.track;
        let k = &observation.kinematics;
        let site = match &observation.site {
            Some(site) if is_on_ground(k) => site,
            _ => {
                self.ground.remove(&track.id);
                return None;
            }
        };

        let state = if is_parked(k) {
            GroundState::Parked(parking_area(site.distance_to_center_km))
        } else if is_taxiing(k) {
            GroundState::Taxi(taxi_phase(site.nearest_runway_km))
        } else {
            GroundState::Movement
        };
        if self.ground.insert(track.id.clone(), state) == Some(state) {
            return None;
        }

        let confidence = ground_confidence(observation.runway_known());
        let (detection_type, metadata) = match state {
            GroundState::Movement => (
                DetectionType::GroundMovement,
                DetectionMetadata::GroundMovement {
                    ground_speed_kt: k.ground_speed_kt,
                },
            ),
            GroundState::Taxi(phase) => (
                DetectionType::Taxi,
                DetectionMetadata::Taxi {
                    phase,
                    distance_to_runway_km: site.nearest_runway_km,
                },
            ),
            GroundState::Parked(area) => (
                DetectionType::Parking,
                DetectionMetadata::Parking {
                    area,
                    distance_to_center_km: site.distance_to_center_km,
                },
            ),
        };
        Some(observation.detection(detection_type, confidence, metadata))
    }

    fn helicopter(
        &mut self,
        observation: &Observation<'_>,
        enrichment: &Enrichment,
    ) -> Option<TrackEvent> {
        let track = observation.track;
        let registered = enrichment
            .registration(&track.id)
            .and_then(|info| info.rotorcraft);
        if !is_helicopter(registered, &observation.kinematics) {
            self.helicopter.remove(&track.id);
            return None;
        }

        let action = helicopter_action(&observation.kinematics);
        if self.helicopter.insert(track.id.clone(), action) == Some(action) {
            return None;
        }

        let (source, confidence) = if registered == Some(true) {
            (HelicopterSource::Registration, HELICOPTER_REGISTRATION_CONFIDENCE)
        } else {
            (HelicopterSource::Heuristic, HELICOPTER_HEURISTIC_CONFIDENCE)
        };
        Some(observation.detection(
            DetectionType::HelicopterAction,
            confidence,
            DetectionMetadata::Helicopter { action, source },
        ))
    }

    fn forget(&mut self, aircraft_id: &str) {
        self.last_approach.remove(aircraft_id);
        self.final_approach.remove(aircraft_id);
        self.ground.remove(aircraft_id);
        self.helicopter.remove(aircraft_id);
    }

    /// Drop usage samples outside the rolling window and re-flag the busiest
    /// runway of each airport as active. Returns how many samples were dropped.
    pub fn prune_usage(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::minutes(RUNWAY_USAGE_WINDOW_MINUTES);
        let mut pruned = 0;
        for samples in self.usage.values_mut() {
            let before = samples.len();
            samples.retain(|sample| sample.timestamp >= cutoff);
            pruned += before - samples.len();
        }
        self.usage.retain(|_, samples| !samples.is_empty());

        for airport in &mut self.airports {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for sample in self.usage.get(&airport.icao).into_iter().flatten() {
                *counts.entry(sample.runway_id.as_str()).or_default() += 1;
            }
            // Ties go to the lexicographically first runway id.
            let busiest = counts
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(runway_id, _)| runway_id.to_string());
            for runway in &mut airport.runways {
                runway.active = busiest.as_deref() == Some(runway.id.as_str());
            }
        }

        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, RegistrationInfo, Velocity};
    use crate::spatial::EARTH_RADIUS_M;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    const EGPK: GeoPoint = GeoPoint {
        lat: 55.5094,
        lon: -4.5867,
    };
    const RUNWAY_12: GeoPoint = GeoPoint {
        lat: 55.5150,
        lon: -4.6050,
    };

    fn runway(id: &str, heading_deg: f64) -> Runway {
        Runway {
            id: id.to_string(),
            heading_deg,
            length_m: 2986.0,
            location: RUNWAY_12,
            active: false,
        }
    }

    fn egpk() -> Airport {
        Airport {
            icao: "EGPK".into(),
            name: "Glasgow Prestwick".into(),
            location: EGPK,
            runways: vec![runway("12", 120.0), runway("30", 300.0)],
        }
    }

    fn nearby() -> Airport {
        Airport {
            icao: "EGXX".into(),
            name: "Nearby Field".into(),
            location: GeoPoint::new(55.55, -4.60),
            runways: Vec::new(),
        }
    }

    fn track(
        id: &str,
        at: GeoPoint,
        altitude_ft: Option<f64>,
        speed: f64,
        heading: f64,
        vertical_rate: f64,
    ) -> AircraftTrack {
        AircraftTrack {
            id: id.to_string(),
            callsign: None,
            position: Position {
                lat: Some(at.lat),
                lon: Some(at.lon),
                altitude_ft,
            },
            velocity: Velocity {
                ground_speed_kt: Some(speed),
                heading_deg: Some(heading),
                vertical_rate_fpm: Some(vertical_rate),
            },
            squawk: None,
            emergency: false,
            first_seen: t0(),
            last_seen: t0(),
            last_update: t0(),
        }
    }

    fn table(tracks: &[AircraftTrack]) -> TrackTable {
        tracks.iter().map(|t| (t.id.clone(), t.clone())).collect()
    }

    fn in_airspace(id: &str, names: &[&str]) -> Enrichment {
        let mut enrichment = Enrichment::default();
        enrichment
            .airspaces
            .insert(id.to_string(), names.iter().map(|n| n.to_string()).collect());
        enrichment
    }

    fn detections(events: &[TrackEvent]) -> Vec<&DetectionEvent> {
        events
            .iter()
            .filter_map(|event| match event {
                TrackEvent::Detection(detection) => Some(detection),
                _ => None,
            })
            .collect()
    }

    fn of_type(events: &[TrackEvent], detection_type: DetectionType) -> Vec<&DetectionEvent> {
        detections(events)
            .into_iter()
            .filter(|d| d.detection_type == detection_type)
            .collect()
    }

    #[test]
    fn home_airport_preferred_within_radius() {
        let airports = vec![egpk(), nearby()];

        let nearest = select_airport(&airports, EGPK, None).expect("in range");
        assert_eq!(nearest.icao, "EGPK");

        let home = select_airport(&airports, EGPK, Some("egxx")).expect("home in range");
        assert_eq!(home.icao, "EGXX");

        // Home too far away: fall back to nearest.
        let far_home = vec![
            egpk(),
            Airport {
                location: GeoPoint::new(56.5, -4.0),
                ..nearby()
            },
        ];
        assert_eq!(
            select_airport(&far_home, EGPK, Some("EGXX")).map(|a| a.icao.as_str()),
            Some("EGPK")
        );

        assert!(select_airport(&airports, GeoPoint::new(56.5, -3.0), None).is_none());
    }

    #[test]
    fn runway_scoring_weights_heading_and_proximity() {
        let rw = runway("12", 120.0);
        assert!((score_runway(&rw, 120.0, RUNWAY_12) - 1.0).abs() < 1e-9);
        // Perpendicular heading on the threshold: proximity only.
        assert!((score_runway(&rw, 30.0, RUNWAY_12) - PROXIMITY_WEIGHT).abs() < 1e-9);
        assert!((score_runway(&rw, 165.0, RUNWAY_12) - PROXIMITY_WEIGHT).abs() < 1e-9);

        // Perfectly aligned but 2 km and 3 km out: heading only.
        let km_per_deg = EARTH_RADIUS_M / 1000.0 * std::f64::consts::PI / 180.0;
        let two_km_out = GeoPoint::new(RUNWAY_12.lat + 2.0 / km_per_deg, RUNWAY_12.lon);
        let three_km_out = GeoPoint::new(RUNWAY_12.lat + 3.0 / km_per_deg, RUNWAY_12.lon);
        assert!((score_runway(&rw, 120.0, two_km_out) - HEADING_WEIGHT).abs() < 1e-9);
        assert_eq!(score_runway(&rw, 120.0, three_km_out), HEADING_WEIGHT);

        // Wraparound: 359 vs 1 is a 2 degree difference.
        let north = runway("01", 1.0);
        assert!(score_runway(&north, 359.0, RUNWAY_12) > 0.95);

        let airport = egpk();
        let (best, _) = best_runway(&airport, 295.0, RUNWAY_12).expect("aligned");
        assert_eq!(best.id, "30");
        assert!(best_runway(&airport, 30.0, RUNWAY_12).is_none());
    }

    #[test]
    fn busiest_runway_in_window_is_active() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let tracks = table(&[
            track("A1", RUNWAY_12, Some(0.0), 20.0, 120.0, 0.0),
            track("B2", RUNWAY_12, Some(0.0), 20.0, 120.0, 0.0),
            track("C3", RUNWAY_12, Some(0.0), 20.0, 300.0, 0.0),
            // Stationary traffic with a selected runway is usage too.
            track("D4", RUNWAY_12, Some(0.0), 0.0, 120.0, 0.0),
        ]);

        engine.process(&tracks, &[], &Enrichment::default(), &rules, t0());
        assert_eq!(engine.runway_usage("EGPK").len(), 4);
        let on_12 = engine
            .runway_usage("EGPK")
            .iter()
            .filter(|sample| sample.runway_id == "12")
            .count();
        assert_eq!(on_12, 3);
        assert_eq!(engine.active_runway("EGPK").map(|r| r.id.as_str()), Some("12"));
        let flags: Vec<bool> = engine.airports()[0].runways.iter().map(|r| r.active).collect();
        assert_eq!(flags, vec![true, false]);

        let later = t0() + Duration::minutes(RUNWAY_USAGE_WINDOW_MINUTES + 1);
        engine.process(&TrackTable::new(), &[], &Enrichment::default(), &rules, later);
        assert!(engine.runway_usage("EGPK").is_empty());
        assert!(engine.active_runway("EGPK").is_none());
    }

    #[test]
    fn approach_then_single_landing() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let final_12 = GeoPoint::new(55.52, -4.62);

        let descending = track("A1", final_12, Some(1500.0), 140.0, 120.0, -800.0);
        let events = engine.process(
            &table(&[descending]),
            &[],
            &in_airspace("A1", &["RWY12 Final Approach"]),
            &rules,
            t0(),
        );
        let approach = of_type(&events, DetectionType::Approach);
        assert_eq!(approach.len(), 1);
        assert_eq!(approach[0].airport.as_deref(), Some("EGPK"));
        assert_eq!(approach[0].runway.as_deref(), Some("12"));
        assert!((approach[0].confidence - 1.0).abs() < 1e-9);
        assert_eq!(engine.last_approach("A1"), Some(t0()));

        // Still inside the final approach polygon at touchdown.
        let on_final = in_airspace("A1", &["RWY12 Final Approach"]);
        let touchdown_at = t0() + Duration::minutes(2);
        let low = track("A1", RUNWAY_12, Some(40.0), 120.0, 120.0, -200.0);
        let events = engine.process(&table(&[low.clone()]), &[], &on_final, &rules, touchdown_at);
        let landing = of_type(&events, DetectionType::Landing);
        assert_eq!(landing.len(), 1);
        assert_eq!(
            landing[0].metadata,
            DetectionMetadata::Landing {
                seconds_since_approach: 120
            }
        );
        assert!(of_type(&events, DetectionType::Departure).is_empty());
        assert!(engine.last_approach("A1").is_none());

        let events = engine.process(
            &table(&[low]),
            &[],
            &on_final,
            &rules,
            touchdown_at + Duration::seconds(5),
        );
        assert!(of_type(&events, DetectionType::Landing).is_empty());
    }

    #[test]
    fn entry_is_approach_and_exit_is_departure() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let climb_out = GeoPoint::new(55.50, -4.56);
        let final_30 = in_airspace("A1", &["Final Approach 30"]);
        let tma = in_airspace("A1", &["TMA"]);

        let level = track("A1", climb_out, Some(800.0), 150.0, 300.0, 0.0);
        let events = engine.process(&table(&[level]), &[], &final_30, &rules, t0());
        let approach = of_type(&events, DetectionType::Approach);
        assert_eq!(approach.len(), 1);
        // Base plus the slow-speed bonus; no descent bonus.
        assert!((approach[0].confidence - 0.7).abs() < 1e-9);

        // A shallow climb still departs, just without the climb bonus.
        let shallow = track("A1", climb_out, Some(850.0), 150.0, 300.0, 200.0);
        let later = t0() + Duration::seconds(5);
        let events = engine.process(&table(&[shallow]), &[], &tma, &rules, later);
        let departure = of_type(&events, DetectionType::Departure);
        assert_eq!(departure.len(), 1);
        assert_eq!(
            departure[0].metadata,
            DetectionMetadata::Departure {
                airspace: "Final Approach 30".into()
            }
        );
        assert!((departure[0].confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn departure_confidence_stacks_kinematic_bonuses() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let climb_out = GeoPoint::new(55.50, -4.56);
        let inside = |id: &str| in_airspace(id, &["Final Approach 30"]);
        let outside = |id: &str| in_airspace(id, &["TMA"]);

        // Slow and level: the bare base confidence.
        let slow = track("C3", climb_out, Some(800.0), 90.0, 300.0, 0.0);
        engine.process(&table(&[slow.clone()]), &[], &inside("C3"), &rules, t0());
        let events = engine.process(
            &table(&[slow]),
            &[],
            &outside("C3"),
            &rules,
            t0() + Duration::seconds(5),
        );
        let departure = of_type(&events, DetectionType::Departure);
        assert_eq!(departure.len(), 1);
        assert!((departure[0].confidence - 0.5).abs() < 1e-9);

        // Climbing hard and fast: both bonuses, capped at 1.
        let climbing = track("B2", climb_out, Some(800.0), 160.0, 300.0, 2000.0);
        let events = engine.process(&table(&[climbing.clone()]), &[], &inside("B2"), &rules, t0());
        assert_eq!(of_type(&events, DetectionType::Approach).len(), 1);
        let events = engine.process(
            &table(&[climbing]),
            &[],
            &outside("B2"),
            &rules,
            t0() + Duration::seconds(5),
        );
        let departure = of_type(&events, DetectionType::Departure);
        assert_eq!(departure.len(), 1);
        assert!((departure[0].confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_airspace_keeps_previous_membership() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let inbound = track(
            "A1",
            GeoPoint::new(55.52, -4.62),
            Some(1500.0),
            140.0,
            120.0,
            -800.0,
        );
        let on_final = in_airspace("A1", &["FINAL APPROACH 12"]);

        engine.process(&table(&[inbound.clone()]), &[], &on_final, &rules, t0());
        // Lookup failed this tick.
        let unknown = Enrichment::default();
        let later = t0() + Duration::seconds(5);
        let events = engine.process(&table(&[inbound.clone()]), &[], &unknown, &rules, later);
        assert!(of_type(&events, DetectionType::Departure).is_empty());
        let events = engine.process(
            &table(&[inbound]),
            &[],
            &in_airspace("A1", &["FINAL APPROACH 12"]),
            &rules,
            t0() + Duration::seconds(10),
        );
        assert!(of_type(&events, DetectionType::Approach).is_empty());
    }

    #[test]
    fn ground_detections_fire_on_change() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let none = Enrichment::default();

        let parked = track("A1", EGPK, Some(0.0), 0.0, 120.0, 0.0);
        let events = engine.process(&table(&[parked.clone()]), &[], &none, &rules, t0());
        let parking = of_type(&events, DetectionType::Parking);
        assert_eq!(parking.len(), 1);
        assert!(matches!(
            parking[0].metadata,
            DetectionMetadata::Parking {
                area: ParkingArea::Terminal,
                ..
            }
        ));

        let later = t0() + Duration::seconds(5);
        let events = engine.process(&table(&[parked]), &[], &none, &rules, later);
        assert!(detections(&events).is_empty());

        let taxiing = track("A1", RUNWAY_12, Some(0.0), 15.0, 120.0, 0.0);
        let later = t0() + Duration::seconds(10);
        let events = engine.process(&table(&[taxiing]), &[], &none, &rules, later);
        let taxi = of_type(&events, DetectionType::Taxi);
        assert_eq!(taxi.len(), 1);
        assert!(matches!(
            taxi[0].metadata,
            DetectionMetadata::Taxi {
                phase: TaxiPhase::RunwayApproach,
                ..
            }
        ));
        assert_eq!(taxi[0].runway.as_deref(), Some("12"));

        let rolling = track("A1", RUNWAY_12, Some(0.0), 80.0, 120.0, 0.0);
        let later = t0() + Duration::seconds(15);
        let events = engine.process(&table(&[rolling]), &[], &none, &rules, later);
        assert_eq!(of_type(&events, DetectionType::GroundMovement).len(), 1);
    }

    #[test]
    fn off_airport_ground_traffic_is_ignored() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let field = track("A1", GeoPoint::new(56.5, -3.0), Some(0.0), 0.0, 0.0, 0.0);
        let events = engine.process(
            &table(&[field]),
            &[],
            &Enrichment::default(),
            &TrackingRules::default(),
            t0(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn helicopter_from_registration() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let mut enrichment = Enrichment::default();
        enrichment.registrations.insert(
            "H1".into(),
            RegistrationInfo {
                rotorcraft: Some(true),
                ..RegistrationInfo::default()
            },
        );

        let hovering = track("H1", GeoPoint::new(55.60, -4.50), Some(600.0), 3.0, 0.0, 0.0);
        let events = engine.process(&table(&[hovering.clone()]), &[], &enrichment, &rules, t0());
        let heli = of_type(&events, DetectionType::HelicopterAction);
        assert_eq!(heli.len(), 1);
        assert_eq!(
            heli[0].metadata,
            DetectionMetadata::Helicopter {
                action: HelicopterAction::Hover,
                source: HelicopterSource::Registration,
            }
        );

        let later = t0() + Duration::seconds(5);
        let events = engine.process(&table(&[hovering]), &[], &enrichment, &rules, later);
        assert!(events.is_empty());
    }

    #[test]
    fn partial_data_is_skipped_and_disappearance_clears_state() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let final_12 = GeoPoint::new(55.52, -4.62);
        let airspace = in_airspace("A1", &["Final Approach 12"]);

        let no_altitude = track("A1", final_12, None, 140.0, 120.0, -800.0);
        let events = engine.process(&table(&[no_altitude]), &[], &airspace, &rules, t0());
        assert!(events.is_empty());
        assert!(engine.last_approach("A1").is_none());

        let inbound = track("A1", final_12, Some(1500.0), 140.0, 120.0, -800.0);
        engine.process(&table(&[inbound.clone()]), &[], &airspace, &rules, t0());
        assert!(engine.last_approach("A1").is_some());

        let later = t0() + Duration::seconds(5);
        engine.process(&TrackTable::new(), &[inbound], &airspace, &rules, later);
        assert!(engine.last_approach("A1").is_none());
    }

    #[test]
    fn confidences_are_clamped() {
        let mut engine = AirportInferenceEngine::new(vec![egpk()]);
        let rules = TrackingRules::default();
        let inbound = track(
            "A1",
            GeoPoint::new(55.52, -4.62),
            Some(1500.0),
            140.0,
            120.0,
            -800.0,
        );
        let airspace = in_airspace("A1", &["final approach"]);
        let events = engine.process(&table(&[inbound]), &[], &airspace, &rules, t0());
        for detection in detections(&events) {
            assert!((0.0..=1.0).contains(&detection.confidence));
        }
    }
}

//! One tick of the surveillance pipeline.
//!
//! `SurveillanceCore` owns all domain state. A tick runs reconciliation,
//! flight state, geofencing and airport inference in that order and hands
//! back the events; it never touches the network or the clock.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::airport::AirportInferenceEngine;
use crate::error::Result;
use crate::events::TrackEvent;
use crate::flight::FlightStateMachine;
use crate::geofence::{GeofenceEngine, ZoneRegistry};
use crate::models::{
    AircraftTrack, Airport, Enrichment, FlightSession, RawReport, Runway, Zone, ZoneViolation,
};
use crate::reconcile::{reconcile, Reconciliation, TrackTable};
use crate::rules::TrackingRules;

/// Events produced by one snapshot.
#[derive(Debug, Clone, Default)]
pub struct TickOutput {
    pub events: Vec<TrackEvent>,
    /// Reports rejected for lacking a usable id
    pub dropped_reports: usize,
}

/// Result of a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub violations: usize,
    pub runway_samples: usize,
}

pub struct SurveillanceCore {
    rules: TrackingRules,
    tracks: TrackTable,
    flights: FlightStateMachine,
    geofence: GeofenceEngine,
    inference: AirportInferenceEngine,
    zones: Arc<dyn ZoneRegistry>,
}

impl SurveillanceCore {
    /// Build a core with validated rules. Invalid rules are the only fatal
    /// error the core reports.
    pub fn new(
        rules: TrackingRules,
        airports: Vec<Airport>,
        zones: Arc<dyn ZoneRegistry>,
    ) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            rules,
            tracks: TrackTable::new(),
            flights: FlightStateMachine::new(),
            geofence: GeofenceEngine::new(),
            inference: AirportInferenceEngine::new(airports),
            zones,
        })
    }

    /// Process one complete snapshot.
    pub fn process_snapshot(
        &mut self,
        snapshot: &[RawReport],
        enrichment: &Enrichment,
        now: DateTime<Utc>,
    ) -> TickOutput {
        let Reconciliation {
            tracks,
            mut events,
            disappeared,
            dropped_reports,
        } = reconcile(&self.tracks, snapshot, enrichment, &self.rules, now);

        events.extend(self.flights.process(&tracks, &disappeared, &self.rules, now));

        let zones = self.zones.list_active_zones();
        events.extend(self.geofence.evaluate(&zones, &tracks, &disappeared, now));

        events.extend(
            self.inference
                .process(&tracks, &disappeared, enrichment, &self.rules, now),
        );

        debug!(
            "Tick at {}: {} tracks, {} events, {} dropped",
            now,
            tracks.len(),
            events.len(),
            dropped_reports
        );
        self.tracks = tracks;

        TickOutput {
            events,
            dropped_reports,
        }
    }

    /// Close flight sessions that stopped receiving updates.
    pub fn sweep_flight_timeouts(&mut self, now: DateTime<Utc>) -> Vec<TrackEvent> {
        self.flights.sweep_timeouts(&self.rules, now)
    }

    /// Drop expired violation history and runway usage samples.
    pub fn purge(&mut self, now: DateTime<Utc>) -> PurgeStats {
        PurgeStats {
            violations: self.geofence.purge(now),
            runway_samples: self.inference.prune_usage(now),
        }
    }

    pub fn set_airports(&mut self, airports: Vec<Airport>) {
        self.inference.set_airports(airports);
    }

    pub fn rules(&self) -> &TrackingRules {
        &self.rules
    }

    pub fn tracks(&self) -> &TrackTable {
        &self.tracks
    }

    pub fn track(&self, aircraft_id: &str) -> Option<&AircraftTrack> {
        self.tracks.get(aircraft_id)
    }

    pub fn open_sessions(&self) -> Vec<FlightSession> {
        self.flights.open_sessions().cloned().collect()
    }

    pub fn open_session(&self, aircraft_id: &str) -> Option<&FlightSession> {
        self.flights.open_session(aircraft_id)
    }

    pub fn zones(&self) -> Vec<Zone> {
        self.zones.list_active_zones()
    }

    pub fn active_violations(&self) -> Vec<ZoneViolation> {
        self.geofence.active_violations()
    }

    pub fn resolved_violations(&self, zone_id: &str) -> &[ZoneViolation] {
        self.geofence.resolved_violations(zone_id)
    }

    pub fn airports(&self) -> &[Airport] {
        self.inference.airports()
    }

    pub fn active_runway(&self, icao: &str) -> Option<&Runway> {
        self.inference.active_runway(icao)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EndReason, GeoPoint, ZoneType};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn a1() -> RawReport {
        RawReport {
            id: Some("a1".into()),
            lat: Some(55.50),
            lon: Some(-4.59),
            altitude_ft: Some(125.0),
            ground_speed_kt: Some(121.6),
            vertical_rate_fpm: Some(-64.0),
            ..RawReport::default()
        }
    }

    fn core(zones: Vec<Zone>) -> SurveillanceCore {
        SurveillanceCore::new(TrackingRules::default(), Vec::new(), Arc::new(zones))
            .expect("default rules are valid")
    }

    fn types(output: &TickOutput) -> Vec<&'static str> {
        output.events.iter().map(TrackEvent::event_type).collect()
    }

    #[test]
    fn appear_fly_and_disappear() {
        let mut core = core(Vec::new());

        let first = core.process_snapshot(&[a1()], &Enrichment::default(), t0());
        assert_eq!(types(&first), vec!["appeared", "flight:started"]);
        assert!(first.events.iter().all(|e| e.aircraft_id() == "A1"));

        let later = t0() + Duration::seconds(90);
        let second = core.process_snapshot(&[], &Enrichment::default(), later);
        assert_eq!(types(&second), vec!["disappeared", "flight:ended"]);
        let Some(TrackEvent::FlightEnded { session }) = second.events.last() else {
            panic!("expected flight:ended");
        };
        assert_eq!(session.end_reason, Some(EndReason::Disappeared));
        assert_eq!(session.duration_ms, Some(90_000));
        assert!(core.tracks().is_empty());
        assert!(core.open_sessions().is_empty());
    }

    #[test]
    fn short_flight_disappears_quietly() {
        let mut core = core(Vec::new());
        core.process_snapshot(&[a1()], &Enrichment::default(), t0());
        let output =
            core.process_snapshot(&[], &Enrichment::default(), t0() + Duration::seconds(10));
        assert_eq!(types(&output), vec!["disappeared"]);
    }

    #[test]
    fn invalid_rules_are_fatal() {
        let rules = TrackingRules {
            flight_end_timeout_secs: 0,
            ..TrackingRules::default()
        };
        assert!(SurveillanceCore::new(rules, Vec::new(), Arc::new(Vec::<Zone>::new())).is_err());
    }

    #[test]
    fn events_follow_component_order() {
        let zone = Zone {
            id: "Z1".into(),
            name: "Prestwick NFZ".into(),
            zone_type: ZoneType::NoFlyZone,
            polygon: vec![
                GeoPoint::new(55.49, -4.60),
                GeoPoint::new(55.49, -4.58),
                GeoPoint::new(55.51, -4.58),
                GeoPoint::new(55.51, -4.60),
            ],
            floor_ft: None,
            ceiling_ft: None,
            active: true,
            created_at: t0(),
        };
        let mut core = core(vec![zone]);

        let output = core.process_snapshot(
            &[a1(), RawReport::default()],
            &Enrichment::default(),
            t0(),
        );
        assert_eq!(types(&output), vec!["appeared", "flight:started", "zone:entered"]);
        assert_eq!(output.dropped_reports, 1);
        assert_eq!(core.active_violations().len(), 1);
    }

    #[test]
    fn timeout_sweep_closes_stale_sessions() {
        let mut core = core(Vec::new());
        core.process_snapshot(&[a1()], &Enrichment::default(), t0());

        assert!(core.sweep_flight_timeouts(t0() + Duration::seconds(60)).is_empty());
        let swept = core.sweep_flight_timeouts(t0() + Duration::seconds(301));
        let [TrackEvent::FlightEnded { session }] = &swept[..] else {
            panic!("expected one flight:ended, got {:?}", swept);
        };
        assert_eq!(session.end_reason, Some(EndReason::Timeout));
    }

    #[test]
    fn frozen_reports_still_time_out() {
        let mut core = core(Vec::new());
        let mut now = t0();
        for _ in 0..81 {
            core.process_snapshot(&[a1()], &Enrichment::default(), now);
            now = now + Duration::seconds(5);
        }
        assert_eq!(core.track("A1").map(|t| t.last_update), Some(t0()));
        assert_eq!(core.open_session("A1").map(|s| s.last_update), Some(t0()));

        let swept = core.sweep_flight_timeouts(t0() + Duration::seconds(401));
        assert!(matches!(
            &swept[..],
            [TrackEvent::FlightEnded { session }] if session.end_reason == Some(EndReason::Timeout)
        ));
    }
}

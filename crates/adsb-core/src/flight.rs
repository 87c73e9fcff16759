//! Flight session lifecycle.
//!
//! Each aircraft is either GROUNDED (no open session) or AIRBORNE (exactly one
//! open session). Sessions that close before the minimum flight duration are
//! dropped without an event.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::events::TrackEvent;
use crate::models::{AircraftTrack, EndReason, FlightSession, Position};
use crate::reconcile::TrackTable;
use crate::rules::TrackingRules;

/// Airborne predicate: any one of speed, altitude or vertical rate beyond its
/// threshold. Unknown values never satisfy their condition.
pub fn is_airborne(
    ground_speed_kt: Option<f64>,
    altitude_ft: Option<f64>,
    vertical_rate_fpm: Option<f64>,
    rules: &TrackingRules,
) -> bool {
    ground_speed_kt.is_some_and(|speed| speed > rules.max_ground_speed_kt)
        || altitude_ft.is_some_and(|alt| alt > rules.min_altitude_ft)
        || vertical_rate_fpm.is_some_and(|rate| rate.abs() > rules.vertical_rate_threshold_fpm)
}

pub fn track_is_airborne(track: &AircraftTrack, rules: &TrackingRules) -> bool {
    is_airborne(
        track.velocity.ground_speed_kt,
        track.position.altitude_ft,
        track.velocity.vertical_rate_fpm,
        rules,
    )
}

/// Per-aircraft session tracker.
#[derive(Debug)]
pub struct FlightStateMachine {
    /// Open sessions keyed by aircraft id
    open: BTreeMap<String, FlightSession>,
    /// Track `last_update` at the moment a session timed out. A frozen track
    /// does not reopen a session until its data changes again.
    timed_out: BTreeMap<String, DateTime<Utc>>,
    next_session_id: u64,
}

impl Default for FlightStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightStateMachine {
    pub fn new() -> Self {
        Self {
            open: BTreeMap::new(),
            timed_out: BTreeMap::new(),
            next_session_id: 1,
        }
    }

    pub fn open_session(&self, aircraft_id: &str) -> Option<&FlightSession> {
        self.open.get(aircraft_id)
    }

    pub fn open_sessions(&self) -> impl Iterator<Item = &FlightSession> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Advance every present track and close sessions of vanished aircraft.
    ///
    /// A session's `last_update` follows the track's last field change, not
    /// the tick time, so an aircraft whose reports freeze still times out.
    pub fn process(
        &mut self,
        tracks: &TrackTable,
        disappeared: &[AircraftTrack],
        rules: &TrackingRules,
        now: DateTime<Utc>,
    ) -> Vec<TrackEvent> {
        let mut events = Vec::new();

        for track in tracks.values() {
            let airborne = track_is_airborne(track, rules);
            let has_session = self.open.contains_key(&track.id);

            match (has_session, airborne) {
                (false, true) => {
                    if self
                        .timed_out
                        .get(&track.id)
                        .is_some_and(|&at| track.last_update <= at)
                    {
                        continue;
                    }
                    self.timed_out.remove(&track.id);
                    let session = self.start(track, now);
                    info!(
                        "Flight {} started for {}",
                        session.session_id, session.aircraft_id
                    );
                    events.push(TrackEvent::FlightStarted { session });
                }
                (true, true) => {
                    if let Some(session) = self.open.get_mut(&track.id) {
                        session.last_position = track.position;
                        session.last_update = session.last_update.max(track.last_update);
                        if rules.emit_flight_updates {
                            events.push(TrackEvent::FlightUpdated {
                                session: session.clone(),
                            });
                        }
                    }
                }
                (true, false) => {
                    events.extend(self.close(
                        &track.id,
                        track.position,
                        EndReason::Landed,
                        rules,
                        now,
                    ));
                }
                (false, false) => {
                    self.timed_out.remove(&track.id);
                }
            }
        }

        for track in disappeared {
            self.timed_out.remove(&track.id);
            if self.open.contains_key(&track.id) {
                events.extend(self.close(
                    &track.id,
                    track.position,
                    EndReason::Disappeared,
                    rules,
                    now,
                ));
            }
        }

        events
    }

    /// Force-close sessions that have not been updated within the timeout.
    pub fn sweep_timeouts(
        &mut self,
        rules: &TrackingRules,
        now: DateTime<Utc>,
    ) -> Vec<TrackEvent> {
        let timeout = Duration::seconds(rules.flight_end_timeout_secs as i64);
        let stale: Vec<(String, Position, DateTime<Utc>)> = self
            .open
            .values()
            .filter(|session| now - session.last_update > timeout)
            .map(|session| {
                (
                    session.aircraft_id.clone(),
                    session.last_position,
                    session.last_update,
                )
            })
            .collect();

        let mut events = Vec::new();
        for (aircraft_id, position, last_update) in stale {
            events.extend(self.close(&aircraft_id, position, EndReason::Timeout, rules, now));
            self.timed_out.insert(aircraft_id, last_update);
        }
        events
    }

    fn start(&mut self, track: &AircraftTrack, now: DateTime<Utc>) -> FlightSession {
        let session = FlightSession {
            session_id: self.next_session_id,
            aircraft_id: track.id.clone(),
            start_time: now,
            start_position: track.position,
            last_position: track.position,
            last_update: now,
            end_time: None,
            end_position: None,
            duration_ms: None,
            end_reason: None,
        };
        self.next_session_id += 1;
        self.open.insert(track.id.clone(), session.clone());
        session
    }

    fn close(
        &mut self,
        aircraft_id: &str,
        position: Position,
        reason: EndReason,
        rules: &TrackingRules,
        now: DateTime<Utc>,
    ) -> Option<TrackEvent> {
        let Some(mut session) = self.open.remove(aircraft_id) else {
            warn!("No open flight session for {} to close ({:?})", aircraft_id, reason);
            return None;
        };

        let duration_ms = (now - session.start_time).num_milliseconds();
        if duration_ms < rules.min_flight_duration_ms() {
            debug!(
                "Discarding flight {} for {}: {} ms is below the minimum duration",
                session.session_id, aircraft_id, duration_ms
            );
            return None;
        }

        session.end_time = Some(now);
        session.end_position = Some(position);
        session.duration_ms = Some(duration_ms);
        session.end_reason = Some(reason);
        info!(
            "Flight {} ended for {} after {} s ({:?})",
            session.session_id,
            aircraft_id,
            duration_ms / 1000,
            reason
        );
        Some(TrackEvent::FlightEnded { session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Velocity;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn track(id: &str, altitude_ft: f64, speed_kt: f64, vertical_rate_fpm: f64) -> AircraftTrack {
        AircraftTrack {
            id: id.to_string(),
            callsign: None,
            position: Position {
                lat: Some(55.5),
                lon: Some(-4.59),
                altitude_ft: Some(altitude_ft),
            },
            velocity: Velocity {
                ground_speed_kt: Some(speed_kt),
                heading_deg: None,
                vertical_rate_fpm: Some(vertical_rate_fpm),
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

    #[test]
    fn airborne_predicate_uses_any_condition() {
        let rules = TrackingRules::default();
        // Speed alone is enough.
        assert!(is_airborne(Some(121.6), Some(125.0), Some(-64.0), &rules));
        assert!(is_airborne(Some(0.0), Some(501.0), Some(0.0), &rules));
        assert!(is_airborne(Some(0.0), Some(0.0), Some(-150.0), &rules));
        assert!(!is_airborne(Some(30.0), Some(500.0), Some(100.0), &rules));
        assert!(!is_airborne(None, None, None, &rules));
    }

    #[test]
    fn takeoff_then_landing_emits_start_and_end() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();

        let events = fsm.process(&table(&[track("A1", 1000.0, 150.0, 800.0)]), &[], &rules, t0());
        let [TrackEvent::FlightStarted { session }] = &events[..] else {
            panic!("expected flight start, got {:?}", events);
        };
        assert_eq!(session.session_id, 1);

        let landed_at = t0() + Duration::minutes(20);
        let events = fsm.process(&table(&[track("A1", 0.0, 10.0, 0.0)]), &[], &rules, landed_at);
        let [TrackEvent::FlightEnded { session }] = &events[..] else {
            panic!("expected flight end, got {:?}", events);
        };
        assert_eq!(session.end_reason, Some(EndReason::Landed));
        assert_eq!(session.duration_ms, Some(20 * 60 * 1000));
        assert_eq!(session.end_time, Some(landed_at));
        assert!(fsm.open_session("A1").is_none());
    }

    #[test]
    fn short_session_is_discarded_silently() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();

        fsm.process(&table(&[track("A1", 1000.0, 150.0, 0.0)]), &[], &rules, t0());
        let events = fsm.process(
            &table(&[track("A1", 0.0, 0.0, 0.0)]),
            &[],
            &rules,
            t0() + Duration::seconds(10),
        );
        assert!(events.is_empty());
        assert_eq!(fsm.open_count(), 0);

        // Disappearing early is equally silent.
        fsm.process(&table(&[track("B2", 1000.0, 150.0, 0.0)]), &[], &rules, t0());
        let gone = track("B2", 1000.0, 150.0, 0.0);
        let events = fsm.process(&TrackTable::new(), &[gone], &rules, t0() + Duration::seconds(30));
        assert!(events.is_empty());
    }

    #[test]
    fn disappearance_closes_with_reason() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        let airborne = track("A1", 125.0, 121.6, -64.0);

        fsm.process(&table(&[airborne.clone()]), &[], &rules, t0());
        let events = fsm.process(
            &TrackTable::new(),
            &[airborne],
            &rules,
            t0() + Duration::seconds(rules.min_flight_duration_secs as i64),
        );
        assert!(matches!(
            &events[..],
            [TrackEvent::FlightEnded { session }]
                if session.end_reason == Some(EndReason::Disappeared)
        ));
    }

    #[test]
    fn grounded_disappearance_emits_no_flight_event() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        let parked = track("P1", 0.0, 0.0, 0.0);

        assert!(fsm.process(&table(&[parked.clone()]), &[], &rules, t0()).is_empty());
        assert!(fsm
            .process(&TrackTable::new(), &[parked], &rules, t0() + Duration::hours(1))
            .is_empty());
    }

    #[test]
    fn sweep_closes_stale_sessions_only() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        fsm.process(
            &table(&[track("A1", 3000.0, 200.0, 0.0), track("B2", 3000.0, 200.0, 0.0)]),
            &[],
            &rules,
            t0(),
        );
        // B2 keeps changing, A1 goes quiet.
        let later = t0() + Duration::seconds(200);
        let b2 = AircraftTrack {
            last_update: later,
            ..track("B2", 3100.0, 200.0, 0.0)
        };
        fsm.process(&table(&[b2]), &[], &rules, later);

        let sweep_at = t0() + Duration::seconds(rules.flight_end_timeout_secs as i64 + 1);
        let events = fsm.sweep_timeouts(&rules, sweep_at);
        assert!(matches!(
            &events[..],
            [TrackEvent::FlightEnded { session }]
                if session.aircraft_id == "A1" && session.end_reason == Some(EndReason::Timeout)
        ));
        assert!(fsm.open_session("B2").is_some());
    }

    #[test]
    fn session_ids_are_never_reused() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        let mut now = t0();
        let mut ids = Vec::new();

        for _ in 0..3 {
            let events = fsm.process(&table(&[track("A1", 2000.0, 150.0, 0.0)]), &[], &rules, now);
            if let [TrackEvent::FlightStarted { session }] = &events[..] {
                ids.push(session.session_id);
            }
            now = now + Duration::seconds(5);
            // Too short to count, but the id is still consumed.
            fsm.process(&table(&[track("A1", 0.0, 0.0, 0.0)]), &[], &rules, now);
            now = now + Duration::seconds(5);
        }
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn periodic_updates_are_opt_in() {
        let mut rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        let flying = table(&[track("A1", 2000.0, 150.0, 0.0)]);

        fsm.process(&flying, &[], &rules, t0());
        assert!(fsm.process(&flying, &[], &rules, t0() + Duration::seconds(5)).is_empty());

        rules.emit_flight_updates = true;
        let events = fsm.process(&flying, &[], &rules, t0() + Duration::seconds(10));
        assert!(matches!(
            &events[..],
            [TrackEvent::FlightUpdated { session }]
                if session.session_id == 1 && session.last_update == t0()
        ));
    }

    #[test]
    fn frozen_airborne_track_times_out_and_stays_closed() {
        let rules = TrackingRules::default();
        let mut fsm = FlightStateMachine::new();
        let frozen = table(&[track("A1", 3000.0, 200.0, 0.0)]);

        // Still in every snapshot, but nothing about it changes.
        let mut now = t0();
        for _ in 0..81 {
            fsm.process(&frozen, &[], &rules, now);
            now = now + Duration::seconds(5);
        }
        assert_eq!(fsm.open_session("A1").map(|s| s.last_update), Some(t0()));

        let events = fsm.sweep_timeouts(&rules, t0() + Duration::seconds(401));
        assert!(matches!(
            &events[..],
            [TrackEvent::FlightEnded { session }]
                if session.end_reason == Some(EndReason::Timeout)
        ));

        // No new session while the data stays frozen.
        assert!(fsm
            .process(&frozen, &[], &rules, t0() + Duration::seconds(405))
            .is_empty());
        assert!(fsm.open_session("A1").is_none());

        // Fresh data reopens it.
        let resumed_at = t0() + Duration::seconds(410);
        let resumed = AircraftTrack {
            last_update: resumed_at,
            ..track("A1", 3200.0, 200.0, 0.0)
        };
        let events = fsm.process(&table(&[resumed]), &[], &rules, resumed_at);
        assert!(matches!(
            &events[..],
            [TrackEvent::FlightStarted { session }] if session.session_id == 2
        ));
    }
}

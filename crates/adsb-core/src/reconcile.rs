//! Snapshot reconciliation.
//!
//! Turns one poll cycle's raw reports plus the previous track table into a
//! fresh table and the presence events (appeared / updated / disappeared /
//! emergency). Pure: no clock, no globals, no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::CoreError;
use crate::events::{TrackDiff, TrackEvent};
use crate::models::{AircraftTrack, Enrichment, Position, RawReport, Velocity};
use crate::rules::TrackingRules;

/// Tracks keyed by normalized aircraft id. Ordered so every downstream pass
/// visits aircraft in the same order for the same input.
pub type TrackTable = BTreeMap<String, AircraftTrack>;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub tracks: TrackTable,
    pub events: Vec<TrackEvent>,
    /// Tracks removed this pass, with their last known state
    pub disappeared: Vec<AircraftTrack>,
    /// Reports rejected for lacking a usable id
    pub dropped_reports: usize,
}

/// A report that passed input validation.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReport {
    pub id: String,
    pub callsign: Option<String>,
    pub position: Position,
    pub velocity: Velocity,
    pub squawk: Option<String>,
    pub emergency: bool,
}

/// Validate and normalize a raw report.
///
/// The id is trimmed and uppercased; blank ids are rejected. Non-finite
/// numbers and out-of-range coordinates become `None`.
pub fn normalize_report(
    report: &RawReport,
    rules: &TrackingRules,
) -> Result<NormalizedReport, CoreError> {
    let id = report
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_uppercase)
        .ok_or_else(|| CoreError::InvalidReport("missing aircraft id".into()))?;

    let lat = finite(report.lat).filter(|lat| lat.abs() <= 90.0);
    let lon = finite(report.lon).filter(|lon| lon.abs() <= 180.0);
    let squawk = non_blank(report.squawk.as_deref());
    let emergency = report
        .emergency
        .unwrap_or_else(|| squawk.as_deref().is_some_and(|sq| rules.is_emergency_squawk(sq)));

    Ok(NormalizedReport {
        id,
        callsign: non_blank(report.callsign.as_deref()),
        position: Position {
            lat,
            lon,
            altitude_ft: finite(report.altitude_ft),
        },
        velocity: Velocity {
            ground_speed_kt: finite(report.ground_speed_kt),
            heading_deg: finite(report.heading_deg),
            vertical_rate_fpm: finite(report.vertical_rate_fpm),
        },
        squawk,
        emergency,
    })
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Reconcile a snapshot against the previous track table.
///
/// Events come out in a fixed order: appeared/updated (plus any emergency)
/// in snapshot order, then disappeared in id order.
pub fn reconcile(
    previous: &TrackTable,
    snapshot: &[RawReport],
    enrichment: &Enrichment,
    rules: &TrackingRules,
    now: DateTime<Utc>,
) -> Reconciliation {
    let mut result = Reconciliation::default();
    let mut order: Vec<String> = Vec::with_capacity(snapshot.len());

    for raw in snapshot {
        let report = match normalize_report(raw, rules) {
            Ok(report) => report,
            Err(err) => {
                debug!("Dropping report {:?}: {}", raw.id, err);
                result.dropped_reports += 1;
                continue;
            }
        };

        let track = build_track(previous.get(&report.id), report, now);
        let id = track.id.clone();
        if result.tracks.insert(id.clone(), track).is_some() {
            debug!("Duplicate report for {} in snapshot; keeping the latest", id);
        } else {
            // The table is id-ordered; events follow arrival order.
            order.push(id);
        }
    }

    for id in order {
        let Some(track) = result.tracks.get(&id) else {
            continue;
        };

        match previous.get(&id) {
            None => {
                result.events.push(TrackEvent::Appeared {
                    track: track.clone(),
                    registration: enrichment.registration(&id).cloned(),
                });
                if track.emergency {
                    result.events.push(emergency_event(track, enrichment, rules));
                }
            }
            Some(old) => {
                let diff = TrackDiff::between(old, track);
                if diff.is_empty() {
                    continue;
                }
                let emergency_raised = !old.emergency && track.emergency;
                result.events.push(TrackEvent::Updated {
                    track: track.clone(),
                    diff,
                });
                if emergency_raised {
                    result.events.push(emergency_event(track, enrichment, rules));
                }
            }
        }
    }

    for (id, old) in previous {
        if result.tracks.contains_key(id) {
            continue;
        }
        result.events.push(TrackEvent::Disappeared { track: old.clone() });
        result.disappeared.push(old.clone());
    }

    result
}

fn build_track(
    previous: Option<&AircraftTrack>,
    report: NormalizedReport,
    now: DateTime<Utc>,
) -> AircraftTrack {
    let mut track = AircraftTrack {
        id: report.id,
        callsign: report.callsign,
        position: report.position,
        velocity: report.velocity,
        squawk: report.squawk,
        emergency: report.emergency,
        first_seen: now,
        last_seen: now,
        last_update: now,
    };

    if let Some(old) = previous {
        track.first_seen = old.first_seen;
        let unchanged = old.callsign == track.callsign
            && old.position == track.position
            && old.velocity == track.velocity
            && old.squawk == track.squawk
            && old.emergency == track.emergency;
        if unchanged {
            track.last_update = old.last_update;
        }
    }

    track
}

fn emergency_event(
    track: &AircraftTrack,
    enrichment: &Enrichment,
    rules: &TrackingRules,
) -> TrackEvent {
    TrackEvent::Emergency {
        aircraft_id: track.id.clone(),
        kind: rules.classify_squawk(track.squawk.as_deref()),
        squawk: track.squawk.clone(),
        description: track
            .squawk
            .as_deref()
            .and_then(|sq| enrichment.squawk(sq))
            .map(|info| info.description.clone()),
    }
}

//! Zone containment and violation lifecycle.
//!
//! Active violations are keyed by `(zone_id, aircraft_id)`, so a pair can
//! never hold two active violations. Resolved violations move to a per-zone
//! history and are purged after the retention window.

use std::collections::{btree_map::Entry, BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::events::TrackEvent;
use crate::models::{AircraftTrack, ExitReason, ViolationStatus, Zone, ZoneViolation};
use crate::reconcile::TrackTable;

/// How long resolved violations stay queryable.
pub const RESOLVED_RETENTION_HOURS: i64 = 24;

/// Source of the zones to evaluate each tick.
pub trait ZoneRegistry: Send + Sync {
    fn list_active_zones(&self) -> Vec<Zone>;
}

/// Fixed zone list, handy for replays and tests.
impl ZoneRegistry for Vec<Zone> {
    fn list_active_zones(&self) -> Vec<Zone> {
        self.iter().filter(|zone| zone.active).cloned().collect()
    }
}

#[derive(Debug, Clone)]
struct ActiveViolation {
    zone_name: String,
    violation: ZoneViolation,
}

type PairKey = (String, String);

#[derive(Debug)]
pub struct GeofenceEngine {
    active: BTreeMap<PairKey, ActiveViolation>,
    resolved: HashMap<String, Vec<ZoneViolation>>,
    next_violation_id: u64,
}

impl Default for GeofenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GeofenceEngine {
    pub fn new() -> Self {
        Self {
            active: BTreeMap::new(),
            resolved: HashMap::new(),
            next_violation_id: 1,
        }
    }

    /// Evaluate every (active zone, positioned aircraft) pair.
    ///
    /// Aircraft without a usable position keep whatever violation they had.
    /// Vanished aircraft and zones that are no longer active resolve their
    /// open violations.
    pub fn evaluate(
        &mut self,
        zones: &[Zone],
        tracks: &TrackTable,
        disappeared: &[AircraftTrack],
        now: DateTime<Utc>,
    ) -> Vec<TrackEvent> {
        let mut events = Vec::new();
        let mut live_zones: HashSet<&str> = HashSet::new();

        for zone in zones.iter().filter(|zone| zone.active) {
            let errors = zone.validate();
            if !errors.is_empty() {
                warn!("Skipping invalid zone {}: {}", zone.id, errors.join("; "));
                continue;
            }
            live_zones.insert(zone.id.as_str());

            for track in tracks.values() {
                let Some(inside) = zone.contains(&track.position) else {
                    continue;
                };
                let key = (zone.id.clone(), track.id.clone());
                if inside {
                    if let Some(event) = self.enter(key, &zone.name, now) {
                        events.push(event);
                    }
                } else if self.active.contains_key(&key) {
                    events.extend(self.resolve(&key, ExitReason::Left, now));
                }
            }
        }

        let gone: HashSet<&str> = disappeared.iter().map(|t| t.id.as_str()).collect();
        let to_resolve: Vec<(PairKey, ExitReason)> = self
            .active
            .keys()
            .filter_map(|key| {
                if !live_zones.contains(key.0.as_str()) {
                    Some((key.clone(), ExitReason::ZoneInactive))
                } else if gone.contains(key.1.as_str()) {
                    Some((key.clone(), ExitReason::Disappeared))
                } else {
                    None
                }
            })
            .collect();
        for (key, reason) in to_resolve {
            events.extend(self.resolve(&key, reason, now));
        }

        events
    }

    fn enter(&mut self, key: PairKey, zone_name: &str, now: DateTime<Utc>) -> Option<TrackEvent> {
        let Entry::Vacant(slot) = self.active.entry(key) else {
            return None;
        };
        let (zone_id, aircraft_id) = slot.key().clone();
        let violation = ZoneViolation {
            id: self.next_violation_id,
            zone_id,
            aircraft_id,
            status: ViolationStatus::Active,
            entered_at: now,
            resolved_at: None,
        };
        self.next_violation_id += 1;
        info!(
            "{} entered zone '{}' (violation {})",
            violation.aircraft_id, zone_name, violation.id
        );
        slot.insert(ActiveViolation {
            zone_name: zone_name.to_string(),
            violation: violation.clone(),
        });
        Some(TrackEvent::ZoneEntered {
            zone_name: zone_name.to_string(),
            violation,
        })
    }

    fn resolve(
        &mut self,
        key: &PairKey,
        reason: ExitReason,
        now: DateTime<Utc>,
    ) -> Option<TrackEvent> {
        let Some(ActiveViolation {
            zone_name,
            mut violation,
        }) = self.active.remove(key)
        else {
            warn!("No active violation for {:?} to resolve", key);
            return None;
        };

        violation.status = ViolationStatus::Resolved;
        violation.resolved_at = Some(now);
        info!(
            "{} exited zone '{}' (violation {}, {:?})",
            violation.aircraft_id, zone_name, violation.id, reason
        );
        self.resolved
            .entry(violation.zone_id.clone())
            .or_default()
            .push(violation.clone());

        Some(TrackEvent::ZoneExited {
            zone_name,
            violation,
            reason,
        })
    }

    /// Drop resolved violations older than the retention window.
    /// Returns how many were removed.
    pub fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(RESOLVED_RETENTION_HOURS);
        let mut purged = 0;
        for history in self.resolved.values_mut() {
            let before = history.len();
            history.retain(|v| v.resolved_at.is_some_and(|at| at >= cutoff));
            purged += before - history.len();
        }
        self.resolved.retain(|_, history| !history.is_empty());
        if purged > 0 {
            debug!("Purged {} resolved zone violations", purged);
        }
        purged
    }

    pub fn active_violation(&self, zone_id: &str, aircraft_id: &str) -> Option<&ZoneViolation> {
        self.active
            .get(&(zone_id.to_string(), aircraft_id.to_string()))
            .map(|entry| &entry.violation)
    }

    pub fn active_violations(&self) -> Vec<ZoneViolation> {
        self.active.values().map(|entry| entry.violation.clone()).collect()
    }

    /// Resolved violations still retained for a zone, oldest first.
    pub fn resolved_violations(&self, zone_id: &str) -> &[ZoneViolation] {
        self.resolved.get(zone_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

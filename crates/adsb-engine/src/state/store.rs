//! Serialized core state plus runtime counters.
//!
//! Every mutation of domain state goes through the single core mutex: the
//! snapshot tick, the flight timeout sweep and the purge all take it, so no
//! two of them ever interleave.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use adsb_core::SurveillanceCore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct EngineStats {
    ticks: AtomicU64,
    failed_polls: AtomicU64,
    dropped_reports: AtomicU64,
    events: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub failed_polls: u64,
    pub dropped_reports: u64,
    pub events: u64,
    pub enrichment_errors: u64,
}

impl EngineStats {
    pub fn record_tick(&self, events: usize, dropped_reports: usize) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.events.fetch_add(events as u64, Ordering::SeqCst);
        self.dropped_reports
            .fetch_add(dropped_reports as u64, Ordering::SeqCst);
    }

    pub fn record_events(&self, events: usize) {
        self.events.fetch_add(events as u64, Ordering::SeqCst);
    }

    pub fn record_failed_poll(&self) {
        self.failed_polls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, enrichment_errors: u64) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::SeqCst),
            failed_polls: self.failed_polls.load(Ordering::SeqCst),
            dropped_reports: self.dropped_reports.load(Ordering::SeqCst),
            events: self.events.load(Ordering::SeqCst),
            enrichment_errors,
        }
    }
}

pub struct EngineState {
    core: Mutex<SurveillanceCore>,
    cancelled: AtomicBool,
    heartbeats: DashMap<&'static str, DateTime<Utc>>,
    pub stats: EngineStats,
}

impl EngineState {
    pub fn new(core: SurveillanceCore) -> Self {
        Self {
            core: Mutex::new(core),
            cancelled: AtomicBool::new(false),
            heartbeats: DashMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Exclusive access to the domain state.
    pub async fn lock_core(&self) -> MutexGuard<'_, SurveillanceCore> {
        self.core.lock().await
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark the engine cancelled. Waits for any in-flight tick to finish so
    /// that nothing is published once this returns.
    pub async fn cancel(&self) {
        let _core = self.core.lock().await;
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Record that a loop ran at `at`, on the engine clock's timeline.
    pub fn mark_loop_heartbeat(&self, name: &'static str, at: DateTime<Utc>) {
        self.heartbeats.insert(name, at);
    }

    pub fn loop_heartbeat(&self, name: &str) -> Option<DateTime<Utc>> {
        self.heartbeats.get(name).map(|at| *at.value())
    }
}

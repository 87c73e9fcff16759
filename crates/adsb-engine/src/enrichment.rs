//! Best-effort enrichment lookups.
//!
//! Lookups run before the core lock is taken, concurrently and each under a
//! deadline. A failed or slow lookup leaves its field empty and bumps the
//! error counter; it never fails the tick.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use adsb_core::{
    normalize_report, Enrichment, GeoPoint, RawReport, RegistrationInfo, SquawkInfo, TrackingRules,
};
use async_trait::async_trait;
use futures::future::join_all;
use tokio::time::timeout;

use crate::cache::TtlCache;

/// Aircraft registry keyed by ICAO24.
#[async_trait]
pub trait RegistrationLookup: Send + Sync {
    async fn registration(&self, aircraft_id: &str) -> anyhow::Result<Option<RegistrationInfo>>;
}

/// Names of the airspace polygons containing a position.
#[async_trait]
pub trait AirspaceLookup: Send + Sync {
    async fn containing(
        &self,
        point: GeoPoint,
        altitude_ft: Option<f64>,
    ) -> anyhow::Result<Vec<String>>;
}

/// Reference descriptions for transponder codes.
#[async_trait]
pub trait SquawkLookup: Send + Sync {
    async fn describe(&self, code: &str) -> anyhow::Result<Option<SquawkInfo>>;
}

pub struct Enricher {
    registrations: Option<Arc<dyn RegistrationLookup>>,
    airspaces: Option<Arc<dyn AirspaceLookup>>,
    squawks: Option<Arc<dyn SquawkLookup>>,
    lookup_timeout: Duration,
    registration_cache: TtlCache<String, Option<RegistrationInfo>>,
    errors: AtomicU64,
}

impl Enricher {
    pub fn new(lookup_timeout: Duration, cache_ttl: Duration, cache_max_entries: usize) -> Self {
        Self {
            registrations: None,
            airspaces: None,
            squawks: None,
            lookup_timeout,
            registration_cache: TtlCache::new(cache_ttl, cache_max_entries),
            errors: AtomicU64::new(0),
        }
    }

    /// An enricher with no collaborators; every tick gets an empty result.
    pub fn disabled() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(1), 1)
    }

    pub fn with_registrations(mut self, lookup: Arc<dyn RegistrationLookup>) -> Self {
        self.registrations = Some(lookup);
        self
    }

    pub fn with_airspaces(mut self, lookup: Arc<dyn AirspaceLookup>) -> Self {
        self.airspaces = Some(lookup);
        self
    }

    pub fn with_squawks(mut self, lookup: Arc<dyn SquawkLookup>) -> Self {
        self.squawks = Some(lookup);
        self
    }

    /// Failed or timed-out lookups since construction.
    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    /// Gather enrichment for every aircraft in a snapshot.
    pub async fn enrich(&self, snapshot: &[RawReport], rules: &TrackingRules) -> Enrichment {
        // Last report per id wins, matching reconciliation.
        let reports: BTreeMap<String, _> = snapshot
            .iter()
            .filter_map(|raw| normalize_report(raw, rules).ok())
            .map(|report| (report.id.clone(), report))
            .collect();

        let mut enrichment = Enrichment::default();
        if reports.is_empty() {
            return enrichment;
        }

        if let Some(lookup) = &self.registrations {
            let mut misses = Vec::new();
            for id in reports.keys() {
                match self.registration_cache.get(id) {
                    Some(Some(info)) => {
                        enrichment.registrations.insert(id.clone(), info);
                    }
                    Some(None) => {}
                    None => misses.push(id.clone()),
                }
            }

            let fetched = join_all(misses.into_iter().map(|id| async move {
                let result = self.guarded("registration", &id, lookup.registration(&id)).await;
                (id, result)
            }))
            .await;
            for (id, result) in fetched {
                // Only definitive answers are cached; failures retry next tick.
                let Some(info) = result else { continue };
                self.registration_cache.insert(id.clone(), info.clone());
                if let Some(info) = info {
                    enrichment.registrations.insert(id, info);
                }
            }
        }

        if let Some(lookup) = &self.airspaces {
            let positioned = reports.values().filter_map(|report| {
                report
                    .position
                    .point()
                    .map(|point| (report.id.clone(), point, report.position.altitude_ft))
            });
            let fetched = join_all(positioned.map(|(id, point, altitude_ft)| async move {
                let result = self
                    .guarded("airspace", &id, lookup.containing(point, altitude_ft))
                    .await;
                (id, result)
            }))
            .await;
            for (id, result) in fetched {
                if let Some(names) = result {
                    enrichment.airspaces.insert(id, names);
                }
            }
        }

        if let Some(lookup) = &self.squawks {
            let codes: BTreeSet<String> = reports
                .values()
                .filter(|report| report.emergency)
                .filter_map(|report| report.squawk.clone())
                .collect();
            let fetched = join_all(codes.into_iter().map(|code| async move {
                let result = self.guarded("squawk", &code, lookup.describe(&code)).await;
                (code, result)
            }))
            .await;
            for (code, result) in fetched {
                if let Some(Some(info)) = result {
                    enrichment.squawks.insert(code, info);
                }
            }
        }

        enrichment
    }

    async fn guarded<T, F>(&self, what: &str, key: &str, lookup: F) -> Option<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match timeout(self.lookup_timeout, lookup).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("{} lookup for {} failed: {}", what, key, err);
                None
            }
            Err(_) => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                tracing::warn!(
                    "{} lookup for {} timed out after {:?}",
                    what,
                    key,
                    self.lookup_timeout
                );
                None
            }
        }
    }
}

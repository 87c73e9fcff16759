//! Engine configuration from environment.

use std::env;
use std::fs;
use std::time::Duration;

use adsb_core::TrackingRules;

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct Config {
    /// How often the snapshot source is polled
    pub poll_interval: Duration,
    /// Upper bound for the poll backoff after consecutive failures
    pub poll_backoff_max: Duration,
    /// How often stale flight sessions are swept
    pub sweep_interval: Duration,
    /// How often violation history and runway usage are purged
    pub purge_interval: Duration,
    /// Per-lookup deadline for enrichment calls
    pub lookup_timeout: Duration,
    pub registration_cache_ttl: Duration,
    pub registration_cache_max_entries: usize,
    /// Capacity of the event broadcast channel
    pub event_buffer: usize,
    pub rules: TrackingRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5_000),
            poll_backoff_max: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            purge_interval: Duration::from_secs(300),
            lookup_timeout: Duration::from_millis(2_000),
            registration_cache_ttl: Duration::from_secs(3_600),
            registration_cache_max_entries: 10_000,
            event_buffer: 1_024,
            rules: TrackingRules::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Unset or unparsable values fall
    /// back to the defaults; the result is validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let millis = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(fallback)
        };
        let secs = |key: &str, fallback: Duration| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(fallback)
        };

        let mut rules = match lookup("ADSB_RULES_PATH") {
            Some(path) => {
                let json = fs::read_to_string(&path).map_err(|e| {
                    EngineError::Config(format!("cannot read rules file {}: {}", path, e))
                })?;
                TrackingRules::from_json(&json)?
            }
            None => defaults.rules.clone(),
        };
        if let Some(icao) = lookup("ADSB_HOME_AIRPORT").filter(|s| !s.trim().is_empty()) {
            rules.home_airport = Some(icao.trim().to_uppercase());
        }
        if let Some(emit) = lookup("ADSB_EMIT_FLIGHT_UPDATES").and_then(|s| s.parse().ok()) {
            rules.emit_flight_updates = emit;
        }

        let config = Self {
            poll_interval: millis("ADSB_POLL_INTERVAL_MS", defaults.poll_interval),
            poll_backoff_max: secs("ADSB_POLL_BACKOFF_MAX_SECS", defaults.poll_backoff_max),
            sweep_interval: secs("ADSB_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            purge_interval: secs("ADSB_PURGE_INTERVAL_SECS", defaults.purge_interval),
            lookup_timeout: millis("ADSB_LOOKUP_TIMEOUT_MS", defaults.lookup_timeout),
            registration_cache_ttl: secs(
                "ADSB_REGISTRATION_CACHE_TTL_SECS",
                defaults.registration_cache_ttl,
            ),
            registration_cache_max_entries: lookup("ADSB_REGISTRATION_CACHE_MAX")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.registration_cache_max_entries),
            event_buffer: lookup("ADSB_EVENT_BUFFER")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.event_buffer),
            rules,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let intervals = [
            ("poll_interval", self.poll_interval),
            ("sweep_interval", self.sweep_interval),
            ("purge_interval", self.purge_interval),
            ("lookup_timeout", self.lookup_timeout),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| value.is_zero()) {
            return Err(EngineError::Config(format!("{} must be greater than zero", name)));
        }
        if self.event_buffer == 0 {
            return Err(EngineError::Config("event_buffer must be greater than zero".into()));
        }
        self.rules.validate()?;
        Ok(())
    }
}

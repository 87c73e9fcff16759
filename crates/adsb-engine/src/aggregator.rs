//! Event fan-out.
//!
//! Wraps core events in envelopes and publishes them on a broadcast channel.
//! Slow or absent subscribers never hold up a tick: a lagging receiver skips
//! ahead and a send with no receivers is simply dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use adsb_core::{EventSource, TrackEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    /// Monotonic across the lifetime of the aggregator, starting at 1
    pub sequence: u64,
    #[serde(rename = "type")]
    pub event_type: &'static str,
    pub aircraft_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    pub payload: TrackEvent,
}

#[derive(Debug)]
pub struct EventAggregator {
    tx: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventAggregator {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Number of envelopes created so far.
    pub fn published(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Publish a tick's events in order. Returns how many were published.
    pub fn publish(&self, events: Vec<TrackEvent>, timestamp: DateTime<Utc>) -> usize {
        let count = events.len();
        for event in events {
            let envelope = EventEnvelope {
                id: Uuid::new_v4(),
                sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
                event_type: event.event_type(),
                aircraft_id: event.aircraft_id().to_string(),
                timestamp,
                source: event.source(),
                payload: event,
            };
            tracing::debug!(
                "Publishing #{} {} for {}",
                envelope.sequence,
                envelope.event_type,
                envelope.aircraft_id
            );
            // No subscribers is not an error.
            let _ = self.tx.send(envelope);
        }
        count
    }
}

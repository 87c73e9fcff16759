//! Runtime shell around the surveillance core: polling, enrichment,
//! serialized state and event fan-out.

pub mod aggregator;
pub mod backoff;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod enrichment;
pub mod error;
pub mod loops;
pub mod source;
pub mod state;
pub mod zones;

pub use aggregator::{EventAggregator, EventEnvelope};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use engine::{Engine, EngineContext};
pub use enrichment::{AirspaceLookup, Enricher, RegistrationLookup, SquawkLookup};
pub use error::EngineError;
pub use source::{PollError, ReplayFrame, ReplaySource, SnapshotSource};
pub use zones::InMemoryZoneRegistry;

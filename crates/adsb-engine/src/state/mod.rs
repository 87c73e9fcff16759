//! Engine state store.

mod store;

pub use store::{EngineState, EngineStats, StatsSnapshot};

//! Background loops driving the engine.

pub mod purge_loop;
pub mod snapshot_loop;
pub mod sweep_loop;

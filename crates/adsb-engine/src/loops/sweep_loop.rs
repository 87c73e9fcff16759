//! Flight timeout sweep.
//!
//! Closes sessions of aircraft that stopped updating without disappearing
//! from the snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::engine::EngineContext;

pub async fn run_sweep_loop(ctx: Arc<EngineContext>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(ctx.config.sweep_interval);
    ctx.mark_heartbeat("flight-sweep");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Flight sweep loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                ctx.mark_heartbeat("flight-sweep");
                match ctx.sweep().await {
                    Ok(0) => {}
                    Ok(closed) => tracing::info!("Timed out {} flight session(s)", closed),
                    Err(_) => break,
                }
            }
        }
    }
}

//! Snapshot polling loop.
//!
//! Polls the source on a fixed interval and runs each snapshot through the
//! core. Consecutive poll failures back off instead of retrying every tick.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::engine::EngineContext;
use crate::error::EngineError;

pub async fn run_snapshot_loop(ctx: Arc<EngineContext>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(ctx.config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut backoff = ctx.new_backoff();
    ctx.mark_heartbeat("snapshot");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Snapshot loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                ctx.mark_heartbeat("snapshot");
                if !backoff.ready() {
                    continue;
                }
                match ctx.tick().await {
                    Ok(published) => {
                        backoff.reset();
                        if published > 0 {
                            tracing::debug!("Tick published {} event(s)", published);
                        }
                    }
                    Err(EngineError::Stopped) => break,
                    Err(err) => {
                        let delay = backoff.fail();
                        tracing::warn!(
                            "Snapshot tick skipped: {} ({} consecutive, backing off {:?})",
                            err,
                            backoff.consecutive_failures(),
                            delay
                        );
                    }
                }
            }
        }
    }
}

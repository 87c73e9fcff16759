//! Retention loop for resolved violations and runway usage samples.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::interval;

use crate::engine::EngineContext;

pub async fn run_purge_loop(ctx: Arc<EngineContext>, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = interval(ctx.config.purge_interval);
    ctx.mark_heartbeat("purge");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Purge loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                ctx.mark_heartbeat("purge");
                match ctx.purge().await {
                    Ok(stats) => tracing::debug!(
                        "Purged {} violation(s), {} runway sample(s)",
                        stats.violations,
                        stats.runway_samples
                    ),
                    Err(_) => break,
                }
            }
        }
    }
}

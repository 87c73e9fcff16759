//! Engine lifecycle: construction, background loops and shutdown.

use std::sync::Arc;

use adsb_core::{Airport, PurgeStats, SurveillanceCore, ZoneRegistry};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::aggregator::{EventAggregator, EventEnvelope};
use crate::backoff::PollBackoff;
use crate::clock::Clock;
use crate::config::Config;
use crate::enrichment::Enricher;
use crate::error::EngineError;
use crate::loops;
use crate::source::SnapshotSource;
use crate::state::{EngineState, StatsSnapshot};

/// Everything a tick needs. Shared by the engine handle and its loops.
pub struct EngineContext {
    pub config: Config,
    pub state: Arc<EngineState>,
    pub aggregator: EventAggregator,
    source: Arc<dyn SnapshotSource>,
    enricher: Enricher,
    clock: Arc<dyn Clock>,
}

impl EngineContext {
    /// Poll, enrich and process one snapshot. Returns how many events were
    /// published.
    ///
    /// A poll failure skips the tick entirely: the track table is left as it
    /// was, so an outage never looks like every aircraft disappearing.
    pub async fn tick(&self) -> Result<usize, EngineError> {
        if self.state.is_cancelled() {
            return Err(EngineError::Stopped);
        }

        let snapshot = match self.source.poll().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.state.stats.record_failed_poll();
                return Err(err.into());
            }
        };
        let enrichment = self.enricher.enrich(&snapshot, &self.config.rules).await;

        let mut core = self.state.lock_core().await;
        if self.state.is_cancelled() {
            tracing::debug!("Dropping snapshot of {} reports after stop", snapshot.len());
            return Err(EngineError::Stopped);
        }
        let now = self.clock.now();
        let output = core.process_snapshot(&snapshot, &enrichment, now);
        let published = self.aggregator.publish(output.events, now);
        self.state.stats.record_tick(published, output.dropped_reports);
        Ok(published)
    }

    /// Close timed-out flight sessions.
    pub async fn sweep(&self) -> Result<usize, EngineError> {
        let mut core = self.state.lock_core().await;
        if self.state.is_cancelled() {
            return Err(EngineError::Stopped);
        }
        let now = self.clock.now();
        let events = core.sweep_flight_timeouts(now);
        let published = self.aggregator.publish(events, now);
        self.state.stats.record_events(published);
        Ok(published)
    }

    pub async fn purge(&self) -> Result<PurgeStats, EngineError> {
        let mut core = self.state.lock_core().await;
        if self.state.is_cancelled() {
            return Err(EngineError::Stopped);
        }
        Ok(core.purge(self.clock.now()))
    }

    pub fn mark_heartbeat(&self, loop_name: &'static str) {
        self.state.mark_loop_heartbeat(loop_name, self.clock.now());
    }

    pub fn new_backoff(&self) -> PollBackoff {
        PollBackoff::new(self.config.poll_interval, self.config.poll_backoff_max)
    }
}

pub struct Engine {
    ctx: Arc<EngineContext>,
    shutdown: broadcast::Sender<()>,
    handles: Mutex<Option<Vec<JoinHandle<()>>>>,
}

impl Engine {
    /// Validate the configuration and assemble an idle engine.
    pub fn new(
        config: Config,
        airports: Vec<Airport>,
        zones: Arc<dyn ZoneRegistry>,
        source: Arc<dyn SnapshotSource>,
        enricher: Enricher,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let core = SurveillanceCore::new(config.rules.clone(), airports, zones)?;
        let (shutdown, _) = broadcast::channel(1);

        Ok(Self {
            ctx: Arc::new(EngineContext {
                aggregator: EventAggregator::new(config.event_buffer),
                state: Arc::new(EngineState::new(core)),
                config,
                source,
                enricher,
                clock,
            }),
            shutdown,
            handles: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.ctx.aggregator.subscribe()
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.ctx.state
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx
            .state
            .stats
            .snapshot(self.ctx.enricher.error_count())
    }

    /// Spawn the snapshot, sweep and purge loops.
    pub async fn start(&self) -> Result<(), EngineError> {
        if self.ctx.state.is_cancelled() {
            return Err(EngineError::Stopped);
        }
        let mut handles = self.handles.lock().await;
        if handles.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        *handles = Some(vec![
            tokio::spawn(loops::snapshot_loop::run_snapshot_loop(
                self.ctx.clone(),
                self.shutdown.subscribe(),
            )),
            tokio::spawn(loops::sweep_loop::run_sweep_loop(
                self.ctx.clone(),
                self.shutdown.subscribe(),
            )),
            tokio::spawn(loops::purge_loop::run_purge_loop(
                self.ctx.clone(),
                self.shutdown.subscribe(),
            )),
        ]);
        tracing::info!(
            "Engine started (poll every {:?})",
            self.ctx.config.poll_interval
        );
        Ok(())
    }

    /// Stop the engine. Once this returns no further events are published,
    /// and the loops have exited.
    pub async fn stop(&self) {
        self.ctx.state.cancel().await;
        let _ = self.shutdown.send(());

        let handles = self.handles.lock().await.take().unwrap_or_default();
        for handle in handles {
            if let Err(err) = handle.await {
                tracing::warn!("Engine loop ended abnormally: {}", err);
            }
        }
        tracing::info!("Engine stopped");
    }

    /// Run a single tick outside the background loops.
    pub async fn tick(&self) -> Result<usize, EngineError> {
        self.ctx.tick().await
    }

    pub async fn sweep(&self) -> Result<usize, EngineError> {
        self.ctx.sweep().await
    }

    pub async fn purge(&self) -> Result<PurgeStats, EngineError> {
        self.ctx.purge().await
    }

    /// Replace the airport table used for inference.
    pub async fn set_airports(&self, airports: Vec<Airport>) {
        self.ctx.state.lock_core().await.set_airports(airports);
    }
}

//! adsb-replay - run recorded surveillance snapshots through the engine and
//! print the resulting events as JSON lines.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use adsb_core::{Airport, TrackingRules, Zone};
use adsb_engine::{Config, Engine, Enricher, InMemoryZoneRegistry, ManualClock, ReplaySource};

#[derive(Parser, Debug)]
#[command(name = "adsb-replay", about = "Replay recorded ADS-B snapshots through the event engine")]
struct Args {
    /// JSON array of `{ "timestamp", "reports" }` frames
    replay: PathBuf,

    /// JSON array of airports used for inference
    #[arg(long)]
    airports: Option<PathBuf>,

    /// JSON array of zones to evaluate
    #[arg(long)]
    zones: Option<PathBuf>,

    /// Tracking rules JSON (overrides ADSB_RULES_PATH)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Preferred airport ICAO code
    #[arg(long)]
    home_airport: Option<String>,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the event stream.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("adsb_engine=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = &args.rules {
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        config.rules = TrackingRules::from_json(&raw)?;
    }
    if let Some(icao) = &args.home_airport {
        config.rules.home_airport = Some(icao.to_uppercase());
    }

    let airports: Vec<Airport> = match &args.airports {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };
    let zones = Arc::new(InMemoryZoneRegistry::new());
    if let Some(path) = &args.zones {
        for zone in read_json::<Vec<Zone>>(path)? {
            zones.upsert(zone)?;
        }
    }

    let raw = fs::read_to_string(&args.replay)
        .with_context(|| format!("reading {}", args.replay.display()))?;
    let (source, timestamps) = ReplaySource::from_json(&raw)?;
    let clock = Arc::new(ManualClock::new(
        timestamps.first().copied().unwrap_or_else(Utc::now),
    ));

    tracing::info!(
        "Replaying {} frame(s) against {} airport(s)",
        timestamps.len(),
        airports.len()
    );

    let engine = Engine::new(
        config,
        airports,
        zones,
        Arc::new(source),
        Enricher::disabled(),
        clock.clone(),
    )?;
    let mut rx = engine.subscribe();

    for timestamp in timestamps {
        clock.set(timestamp);
        engine.tick().await?;
        engine.sweep().await?;

        loop {
            match rx.try_recv() {
                Ok(envelope) => println!("{}", serde_json::to_string(&envelope)?),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("Event buffer overflowed; {} event(s) lost", skipped);
                }
                Err(_) => break,
            }
        }
    }

    engine.purge().await?;
    engine.stop().await;
    let stats = engine.stats();
    tracing::info!(
        "Replay done: {} tick(s), {} event(s), {} dropped report(s)",
        stats.ticks,
        stats.events,
        stats.dropped_reports
    );

    Ok(())
}

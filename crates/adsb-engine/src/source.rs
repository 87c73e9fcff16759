//! Where snapshots come from.

use std::collections::VecDeque;

use adsb_core::RawReport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PollError {
    #[error("snapshot source unavailable: {0}")]
    Unavailable(String),

    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("snapshot source exhausted")]
    Exhausted,
}

/// Delivers one complete snapshot of all currently visible aircraft per call.
///
/// An error means "no snapshot this tick"; it must never be reported as an
/// empty snapshot, which would look like every aircraft disappearing.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn poll(&self) -> Result<Vec<RawReport>, PollError>;
}

/// One recorded snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reports: Vec<RawReport>,
}

/// Plays back recorded frames in order, then reports `Exhausted`.
#[derive(Debug, Default)]
pub struct ReplaySource {
    frames: Mutex<VecDeque<Vec<RawReport>>>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = Vec<RawReport>>) -> Self {
        Self {
            frames: Mutex::new(frames.into_iter().collect()),
        }
    }

    /// Parse a JSON array of frames. Returns the frames alongside the source
    /// so callers can drive a clock from the recorded timestamps.
    pub fn from_json(json: &str) -> Result<(Self, Vec<DateTime<Utc>>), PollError> {
        let frames: Vec<ReplayFrame> =
            serde_json::from_str(json).map_err(|e| PollError::Malformed(e.to_string()))?;
        let timestamps = frames.iter().map(|frame| frame.timestamp).collect();
        Ok((
            Self::new(frames.into_iter().map(|frame| frame.reports)),
            timestamps,
        ))
    }

    pub async fn remaining(&self) -> usize {
        self.frames.lock().await.len()
    }
}

#[async_trait]
impl SnapshotSource for ReplaySource {
    async fn poll(&self) -> Result<Vec<RawReport>, PollError> {
        self.frames.lock().await.pop_front().ok_or(PollError::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_frames_then_exhausts() {
        let json = r#"[
            {
                "timestamp": "2024-05-01T12:00:00Z",
                "reports": [ { "hex": "a1", "altitude": 125, "speed": 121.6 } ]
            },
            { "timestamp": "2024-05-01T12:01:30Z" }
        ]"#;
        let (source, timestamps) = ReplaySource::from_json(json).expect("parse frames");
        assert_eq!(timestamps.len(), 2);
        assert_eq!(source.remaining().await, 2);

        let first = source.poll().await.expect("first frame");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id.as_deref(), Some("a1"));
        assert_eq!(first[0].ground_speed_kt, Some(121.6));

        assert!(source.poll().await.expect("second frame").is_empty());
        assert!(matches!(source.poll().await, Err(PollError::Exhausted)));
    }

    #[test]
    fn malformed_replay_is_rejected() {
        assert!(matches!(
            ReplaySource::from_json("{}"),
            Err(PollError::Malformed(_))
        ));
    }
}

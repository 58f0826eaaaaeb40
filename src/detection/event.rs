use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// A template cleared the threshold while not on cooldown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub name: String,
    pub duration_seconds: f64,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl DetectionEvent {
    /// Out-of-range values saturate instead of panicking.
    pub fn duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.duration_seconds).unwrap_or(Duration::MAX)
    }
}

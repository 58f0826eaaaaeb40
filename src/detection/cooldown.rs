use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::slots::countdown::deadline_after;

/// Names that fired recently and must not fire again until their effect ends.
///
/// Owned by the detection loop alone; nothing else reads or writes it.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    expires_at: HashMap<String, Instant>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_suppressed(&self, name: &str, now: Instant) -> bool {
        self.expires_at
            .get(name)
            .is_some_and(|&expires_at| now < expires_at)
    }

    /// Starts (or restarts) the cooldown for `name`. At most one entry per name.
    pub fn arm(&mut self, name: &str, now: Instant, duration: Duration) {
        self.expires_at
            .insert(name.to_string(), deadline_after(now, duration));
    }

    pub fn sweep(&mut self, now: Instant) {
        self.expires_at.retain(|_, expires_at| now < *expires_at);
    }

    pub fn expires_at(&self, name: &str) -> Option<Instant> {
        self.expires_at.get(name).copied()
    }

    pub fn active_count(&self) -> usize {
        self.expires_at.len()
    }
}

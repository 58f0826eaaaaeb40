//! Boundary toward whatever draws the countdown widgets.
//!
//! Sink methods are invoked while the slot table is locked, so they must return
//! quickly and must not call back into the allocator.

use serde::Serialize;
use std::io::{Stdout, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum PresentationEvent {
    #[serde(rename_all = "camelCase")]
    DetectionAssigned {
        slot_index: usize,
        name: String,
        duration_seconds: f64,
    },
    #[serde(rename_all = "camelCase")]
    SlotFreed { slot_index: usize },
    #[serde(rename_all = "camelCase")]
    CountdownTick {
        slot_index: usize,
        remaining_seconds: f64,
    },
}

pub trait PresentationSink: Send + Sync {
    fn detection_assigned(&self, slot_index: usize, name: &str, duration_seconds: f64);

    fn slot_freed(&self, slot_index: usize);

    /// Remaining time of a running countdown. Never negative.
    fn countdown_tick(&self, _slot_index: usize, _remaining: Duration) {}
}

/// Writes human-readable lines through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl PresentationSink for LogSink {
    fn detection_assigned(&self, slot_index: usize, name: &str, duration_seconds: f64) {
        log::info!("Slot {slot_index}: {name} Ultimate ({duration_seconds:.1}s)");
    }

    fn slot_freed(&self, slot_index: usize) {
        log::info!("Slot {slot_index} is now free.");
    }

    fn countdown_tick(&self, slot_index: usize, remaining: Duration) {
        log::trace!("Slot {slot_index}: {:.1}s left", remaining.as_secs_f64());
    }
}

/// One JSON object per line, for an out-of-process renderer.
///
/// Countdown ticks are dropped unless enabled with [`JsonLinesSink::with_ticks`].
#[derive(Debug)]
pub struct JsonLinesSink<W = Stdout> {
    out: Mutex<W>,
    forward_ticks: bool,
}

impl JsonLinesSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            forward_ticks: false,
        }
    }

    pub fn with_ticks(mut self) -> Self {
        self.forward_ticks = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, event: &PresentationEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                log::error!("failed to serialize presentation event: {err}");
                return;
            }
        };
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            log::warn!("failed to write presentation event: {err}");
        }
    }
}

impl<W: Write + Send> PresentationSink for JsonLinesSink<W> {
    fn detection_assigned(&self, slot_index: usize, name: &str, duration_seconds: f64) {
        self.write(&PresentationEvent::DetectionAssigned {
            slot_index,
            name: name.to_string(),
            duration_seconds,
        });
    }

    fn slot_freed(&self, slot_index: usize) {
        self.write(&PresentationEvent::SlotFreed { slot_index });
    }

    fn countdown_tick(&self, slot_index: usize, remaining: Duration) {
        if self.forward_ticks {
            self.write(&PresentationEvent::CountdownTick {
                slot_index,
                remaining_seconds: remaining.as_secs_f64(),
            });
        }
    }
}

/// Forwards events into a tokio channel for embedders that render in-process.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<PresentationEvent>,
    forward_ticks: bool,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<PresentationEvent>) -> Self {
        Self {
            tx,
            forward_ticks: false,
        }
    }

    pub fn with_ticks(mut self) -> Self {
        self.forward_ticks = true;
        self
    }

    fn send(&self, event: PresentationEvent) {
        // A dropped receiver means nobody is rendering any more.
        let _ = self.tx.send(event);
    }
}

impl PresentationSink for ChannelSink {
    fn detection_assigned(&self, slot_index: usize, name: &str, duration_seconds: f64) {
        self.send(PresentationEvent::DetectionAssigned {
            slot_index,
            name: name.to_string(),
            duration_seconds,
        });
    }

    fn slot_freed(&self, slot_index: usize) {
        self.send(PresentationEvent::SlotFreed { slot_index });
    }

    fn countdown_tick(&self, slot_index: usize, remaining: Duration) {
        if self.forward_ticks {
            self.send(PresentationEvent::CountdownTick {
                slot_index,
                remaining_seconds: remaining.as_secs_f64(),
            });
        }
    }
}

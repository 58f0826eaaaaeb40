use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};

use crate::config::SlotLayout;
use crate::detection::DetectionEvent;
use crate::presentation::PresentationSink;

use super::countdown::run_countdown;
use super::state::{Slot, SlotAnchor, SlotLease, SlotTable};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// State shared by allocator handles, countdown tasks and the completion reaper.
struct SlotShared {
    table: Mutex<SlotTable>,
    anchors: Vec<SlotAnchor>,
    sink: Arc<dyn PresentationSink>,
}

impl SlotShared {
    async fn release(&self, index: usize) -> bool {
        let mut table = self.table.lock().await;
        let freed = table.release(index);
        if freed {
            log_info!("Slot {} is now free", index);
            self.sink.slot_freed(index);
        }
        freed
    }

    async fn complete(&self, lease: SlotLease) {
        let mut table = self.table.lock().await;
        if table.release_lease(lease) {
            log_info!("Slot {} countdown finished, slot is now free", lease.index);
            self.sink.slot_freed(lease.index);
        } else {
            log_debug!("Ignoring stale completion for slot {}", lease.index);
        }
    }

    /// Forwards the remaining time if the lease still holds the slot.
    async fn tick(&self, lease: SlotLease, remaining: Duration) -> bool {
        let table = self.table.lock().await;
        if !table.holds(lease) {
            return false;
        }
        self.sink.countdown_tick(lease.index, remaining);
        true
    }
}

/// Hands detections to a fixed number of display slots and frees each slot
/// when its countdown runs out.
///
/// Assignment and release both go through one lock around the slot table;
/// countdowns report completion over a channel drained by a reaper task.
#[derive(Clone)]
pub struct SlotAllocator {
    shared: Arc<SlotShared>,
    completions: mpsc::UnboundedSender<SlotLease>,
    countdown_tick: Duration,
}

impl SlotAllocator {
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        slot_count: usize,
        layout: SlotLayout,
        countdown_tick: Duration,
        sink: Arc<dyn PresentationSink>,
    ) -> Self {
        let table = SlotTable::new(slot_count, layout);
        let anchors = table.slots().iter().map(|slot| slot.anchor).collect();
        let shared = Arc::new(SlotShared {
            table: Mutex::new(table),
            anchors,
            sink,
        });

        let (completions, mut completion_rx) = mpsc::unbounded_channel::<SlotLease>();
        let reaper = Arc::clone(&shared);
        tokio::spawn(async move {
            while let Some(lease) = completion_rx.recv().await {
                reaper.complete(lease).await;
            }
        });

        Self {
            shared,
            completions,
            countdown_tick,
        }
    }

    /// Places a detection in the lowest free slot and starts its countdown.
    /// Returns `None` when every slot is busy; the detection is then not shown.
    pub async fn assign(&self, event: &DetectionEvent) -> Option<usize> {
        let lease = {
            let mut table = self.shared.table.lock().await;
            let Some(lease) = table.assign(&event.name, event.duration_seconds, Utc::now()) else {
                log_info!("No free slots available for {} timer", event.name);
                return None;
            };
            log_info!(
                "Found a free slot: {}. Placing timer for {}",
                lease.index,
                event.name
            );
            self.shared
                .sink
                .detection_assigned(lease.index, &event.name, event.duration_seconds);
            lease
        };

        let shared = Arc::clone(&self.shared);
        let completions = self.completions.clone();
        let duration = event.duration();
        let tick = self.countdown_tick;
        tokio::spawn(async move {
            let finished = run_countdown(duration, tick, |remaining| {
                let shared = Arc::clone(&shared);
                async move { shared.tick(lease, remaining).await }
            })
            .await;
            if finished {
                let _ = completions.send(lease);
            }
        });

        Some(lease.index)
    }

    /// Frees a slot immediately, e.g. when the renderer tears a widget down.
    /// Releasing a free slot is a no-op.
    pub async fn release(&self, index: usize) -> bool {
        self.shared.release(index).await
    }

    pub async fn is_occupied(&self, index: usize) -> bool {
        self.shared.table.lock().await.is_occupied(index)
    }

    pub async fn occupied_count(&self) -> usize {
        self.shared.table.lock().await.occupied_count()
    }

    pub async fn snapshot(&self) -> Vec<Slot> {
        self.shared.table.lock().await.slots().to_vec()
    }

    pub fn anchor(&self, index: usize) -> Option<SlotAnchor> {
        self.shared.anchors.get(index).copied()
    }

    pub fn capacity(&self) -> usize {
        self.shared.anchors.len()
    }
}

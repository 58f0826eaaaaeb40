use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::SlotLayout;

/// Fixed on-screen position of a slot. Set at construction and never moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAnchor {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupant {
    pub name: String,
    pub duration_seconds: f64,
    pub assigned_at: DateTime<Utc>,
}

/// Identifies one particular occupancy of a slot. A completion carrying an old
/// generation cannot free whoever holds the slot now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotLease {
    pub index: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub index: usize,
    pub anchor: SlotAnchor,
    pub occupant: Option<Occupant>,
    #[serde(skip)]
    generation: u64,
}

impl Slot {
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

/// Occupancy of the fixed set of display slots.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: Vec<Slot>,
}

impl SlotTable {
    pub fn new(slot_count: usize, layout: SlotLayout) -> Self {
        let slots = (0..slot_count)
            .map(|index| Slot {
                index,
                anchor: SlotAnchor {
                    x: layout.origin_x,
                    y: layout.origin_y + index as i32 * layout.spacing,
                },
                occupant: None,
                generation: 0,
            })
            .collect();
        Self { slots }
    }

    /// Takes the lowest-indexed free slot, or `None` when all are occupied.
    pub fn assign(
        &mut self,
        name: &str,
        duration_seconds: f64,
        now: DateTime<Utc>,
    ) -> Option<SlotLease> {
        let slot = self.slots.iter_mut().find(|slot| !slot.is_occupied())?;
        slot.generation += 1;
        slot.occupant = Some(Occupant {
            name: name.to_string(),
            duration_seconds,
            assigned_at: now,
        });
        Some(SlotLease {
            index: slot.index,
            generation: slot.generation,
        })
    }

    /// Frees a slot. Returns whether it was occupied; freeing a free or
    /// unknown slot does nothing.
    pub fn release(&mut self, index: usize) -> bool {
        self.slots
            .get_mut(index)
            .and_then(|slot| slot.occupant.take())
            .is_some()
    }

    /// Frees the slot only if it is still held under `lease`.
    pub fn release_lease(&mut self, lease: SlotLease) -> bool {
        if self.holds(lease) {
            self.release(lease.index)
        } else {
            false
        }
    }

    pub fn holds(&self, lease: SlotLease) -> bool {
        self.slots
            .get(lease.index)
            .is_some_and(|slot| slot.is_occupied() && slot.generation == lease.generation)
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        self.slots.get(index).is_some_and(Slot::is_occupied)
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_occupied()).count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }
}

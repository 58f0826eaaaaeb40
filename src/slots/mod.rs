pub mod allocator;
pub mod countdown;
pub mod state;

pub use allocator::SlotAllocator;
pub use countdown::Countdown;
pub use state::{Slot, SlotAnchor, SlotLease, SlotTable};

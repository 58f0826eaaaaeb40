pub mod controller;
pub mod cooldown;
pub mod event;
pub mod frame_source;
pub mod library;
pub mod loop_worker;
pub mod matcher;

pub use controller::DetectionController;
pub use cooldown::CooldownTracker;
pub use event::DetectionEvent;
pub use frame_source::{crop_region, load_frame, FrameSource, ImageSequenceSource};
pub use library::{TemplateEntry, TemplateLibrary};
pub use loop_worker::DetectionLoop;
pub use matcher::{match_all, MatchScore, Matcher, NccMatcher};

#[cfg(feature = "screen")]
pub use frame_source::ScreenSource;

use std::path::PathBuf;

use thiserror::Error;

/// Setup mistakes. Any of these stops the tracker before the first tick.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("match threshold must be in (0, 1), got {0}")]
    InvalidThreshold(f32),

    #[error("poll interval must be greater than zero")]
    InvalidPollInterval,

    #[error("countdown tick must be greater than zero")]
    InvalidCountdownTick,

    #[error("capture timeout must be greater than zero")]
    InvalidCaptureTimeout,

    #[error("capture region must have a non-zero width and height, got {width}x{height}")]
    InvalidRegion { width: u32, height: u32 },

    #[error("slot count must be greater than zero")]
    InvalidSlotCount,

    #[error("no templates configured")]
    EmptyLibrary,

    #[error("duplicate template key '{0}'")]
    DuplicateKey(String),

    #[error("duplicate display name '{0}'")]
    DuplicateName(String),

    #[error("template '{key}' has invalid duration {duration}s")]
    InvalidDuration { key: String, duration: f64 },

    #[error("could not load template '{key}' from {path}: {source}")]
    TemplateImage {
        key: String,
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to list frames in {path}: {source}")]
    FrameDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no image frames found in {0}")]
    NoFrames(PathBuf),

    #[error("live screen capture is not available in this build (enable the `screen` feature)")]
    ScreenUnavailable,

    #[error("template '{key}' is a flat image and cannot be correlated")]
    FlatTemplate { key: String },

    #[error(
        "template '{key}' is {template_width}x{template_height}, larger than the \
         {region_width}x{region_height} capture region"
    )]
    TemplateTooLarge {
        key: String,
        template_width: u32,
        template_height: u32,
        region_width: u32,
        region_height: u32,
    },
}

/// Frame acquisition failures. The loop logs these and retries next tick.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture backend failed: {0}")]
    Backend(String),

    #[error("no display available to capture")]
    NoDisplay,

    #[error("region {width}x{height}+{left}+{top} lies outside the {surface_width}x{surface_height} surface")]
    OutOfBounds {
        top: u32,
        left: u32,
        width: u32,
        height: u32,
        surface_width: u32,
        surface_height: u32,
    },

    #[error("frame sequence exhausted")]
    Exhausted,

    #[error("could not decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("capture timed out after {0}ms")]
    Timeout(u64),

    #[error("previous capture is still running")]
    Stalled,
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("template '{key}' ({template_width}x{template_height}) exceeds frame ({frame_width}x{frame_height})")]
    TemplateExceedsFrame {
        key: String,
        template_width: u32,
        template_height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Everything that can go wrong inside a single detection tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error("tick worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

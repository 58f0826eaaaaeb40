pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod presentation;
pub mod slots;
mod utils;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command, EventFormat, RunArgs};
use config::TrackerConfig;
use detection::{
    load_frame, match_all, DetectionController, DetectionLoop, FrameSource, ImageSequenceSource,
    NccMatcher, TemplateLibrary,
};
use presentation::{JsonLinesSink, LogSink, PresentationSink};
use slots::SlotAllocator;

pub async fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = TrackerConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or_else(|| Command::Run(RunArgs::default())) {
        Command::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Score { image } => {
            config.validate()?;
            score_screenshot(&config, &image)
        }
        Command::Run(args) => {
            config.validate()?;
            track(config, args).await
        }
    }
}

async fn track(config: TrackerConfig, args: RunArgs) -> Result<()> {
    let library = Arc::new(TemplateLibrary::load(
        &config.templates,
        config.capture_region,
    )?);

    let source: Arc<dyn FrameSource> = match &args.frames {
        Some(dir) => Arc::new(ImageSequenceSource::from_dir(dir, args.loop_frames)?),
        None => screen_source()?,
    };
    let sink: Arc<dyn PresentationSink> = match args.events {
        EventFormat::Log => Arc::new(LogSink),
        EventFormat::Json if args.ticks => Arc::new(JsonLinesSink::stdout().with_ticks()),
        EventFormat::Json => Arc::new(JsonLinesSink::stdout()),
    };

    let allocator = SlotAllocator::spawn(
        config.slot_count,
        config.slot_layout,
        config.countdown_tick(),
        sink,
    );
    let detection_loop =
        DetectionLoop::new(&config, library, source, Arc::new(NccMatcher), allocator);

    let mut controller = DetectionController::new();
    controller.start(detection_loop, config.poll_interval())?;
    log::info!("Ultimate tracker started. Looking for image matches... (Ctrl-C to quit)");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    log::info!("Shutting down");
    controller.stop().await
}

#[cfg(feature = "screen")]
fn screen_source() -> Result<Arc<dyn FrameSource>> {
    Ok(Arc::new(detection::ScreenSource))
}

#[cfg(not(feature = "screen"))]
fn screen_source() -> Result<Arc<dyn FrameSource>> {
    Err(error::ConfigError::ScreenUnavailable.into())
}

fn score_screenshot(config: &TrackerConfig, image: &Path) -> Result<()> {
    let library = TemplateLibrary::load(&config.templates, config.capture_region)?;
    let frame = load_frame(image, config.capture_region)
        .with_context(|| format!("failed to read screenshot {}", image.display()))?;
    let scores = match_all(&NccMatcher, &frame, &library, |_| true)?;

    for score in scores {
        let name = library
            .get(&score.key)
            .map(|entry| entry.display_name.as_str())
            .unwrap_or(score.key.as_str());
        println!(
            "{name:<20} {:>6.3}  {}",
            score.score,
            verdict(score.score, config.match_threshold)
        );
    }
    Ok(())
}

/// Same strict comparison the detection loop uses.
fn verdict(score: f32, threshold: f32) -> &'static str {
    if score > threshold {
        "MATCH"
    } else {
        "-"
    }
}

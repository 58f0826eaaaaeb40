use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ult-tracker", version, about = "Tracks ultimate icons on screen and shows their countdowns")]
pub struct Cli {
    /// JSON config file. Built-in defaults are used when omitted.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Watch the capture region and drive countdowns (default).
    Run(RunArgs),
    /// Print each template's best confidence against a saved screenshot.
    Score {
        /// Full-screen screenshot; the capture region is cropped out of it.
        image: PathBuf,
    },
    /// Print the effective configuration as JSON.
    PrintConfig,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Replay screenshots from this directory instead of capturing the screen.
    #[arg(long)]
    pub frames: Option<PathBuf>,

    /// Start over once the replayed frames run out.
    #[arg(long, requires = "frames")]
    pub loop_frames: bool,

    /// How presentation events are emitted.
    #[arg(long, value_enum, default_value_t = EventFormat::Log)]
    pub events: EventFormat,

    /// Also emit a countdownTick line for every running countdown (JSON events only).
    #[arg(long)]
    pub ticks: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventFormat {
    /// Human-readable log lines.
    #[default]
    Log,
    /// One JSON object per line on stdout.
    Json,
}

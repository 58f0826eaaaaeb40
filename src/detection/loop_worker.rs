use std::{collections::HashSet, sync::Arc};

use chrono::Utc;
use image::GrayImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{CaptureRegion, TrackerConfig};
use crate::error::{CaptureError, TickError};
use crate::slots::SlotAllocator;

use super::cooldown::CooldownTracker;
use super::event::DetectionEvent;
use super::frame_source::FrameSource;
use super::library::TemplateLibrary;
use super::matcher::{match_all, Matcher};

// Set to false to silence per-tick logging from this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Capture, correlate and emit, one frame per tick.
///
/// The cooldown tracker lives here and is only touched from the task running
/// the loop.
pub struct DetectionLoop {
    source: Arc<dyn FrameSource>,
    matcher: Arc<dyn Matcher>,
    library: Arc<TemplateLibrary>,
    cooldowns: CooldownTracker,
    allocator: SlotAllocator,
    region: CaptureRegion,
    threshold: f32,
    capture_timeout: Duration,
    /// A capture that outlived its timeout. No new capture starts until it returns.
    pending_capture: Option<JoinHandle<Result<GrayImage, CaptureError>>>,
}

impl DetectionLoop {
    pub fn new(
        config: &TrackerConfig,
        library: Arc<TemplateLibrary>,
        source: Arc<dyn FrameSource>,
        matcher: Arc<dyn Matcher>,
        allocator: SlotAllocator,
    ) -> Self {
        Self {
            source,
            matcher,
            library,
            cooldowns: CooldownTracker::new(),
            allocator,
            region: config.capture_region,
            threshold: config.match_threshold,
            capture_timeout: config.capture_timeout(),
            pending_capture: None,
        }
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Runs one tick at `now`. Expired cooldowns are swept whether or not the
    /// tick succeeds.
    pub async fn tick(&mut self, now: Instant) -> Result<Vec<DetectionEvent>, TickError> {
        let result = self.detect(now).await;
        self.cooldowns.sweep(now);
        result
    }

    async fn detect(&mut self, now: Instant) -> Result<Vec<DetectionEvent>, TickError> {
        let frame = self.capture().await?;

        // Suppressed entries are not correlated at all.
        let suppressed: HashSet<String> = self
            .library
            .iter()
            .filter(|entry| self.cooldowns.is_suppressed(&entry.display_name, now))
            .map(|entry| entry.display_name.clone())
            .collect();
        if suppressed.len() == self.library.len() {
            log_debug!("all templates on cooldown, skipping correlation");
            return Ok(Vec::new());
        }

        let match_start = Instant::now();
        let matcher = Arc::clone(&self.matcher);
        let library = Arc::clone(&self.library);
        let scores = tokio::task::spawn_blocking(move || {
            match_all(matcher.as_ref(), &frame, &library, |entry| {
                !suppressed.contains(&entry.display_name)
            })
        })
        .await??;
        log_debug!(
            "tick: match {}ms, {} templates scored",
            match_start.elapsed().as_millis(),
            scores.len()
        );

        let mut events = Vec::new();
        for score in scores {
            if score.score <= self.threshold {
                continue;
            }
            let Some(entry) = self.library.get(&score.key) else {
                continue;
            };

            log_info!(
                "MATCH FOUND for {} (confidence: {:.2})",
                entry.display_name,
                score.score
            );
            // Armed before anything else so the next tick already sees it.
            self.cooldowns.arm(&entry.display_name, now, entry.duration());

            let event = DetectionEvent {
                name: entry.display_name.clone(),
                duration_seconds: entry.duration_seconds,
                confidence: score.score,
                timestamp: Utc::now(),
            };
            // A full overlay drops the display, the cooldown stays armed.
            self.allocator.assign(&event).await;
            events.push(event);
        }

        Ok(events)
    }

    /// Grabs one frame on the blocking pool, bounded by the capture timeout.
    ///
    /// A timed-out capture cannot be interrupted, so its handle is kept and
    /// later ticks fail fast until that thread returns. At most one capture
    /// thread is ever in flight.
    async fn capture(&mut self) -> Result<GrayImage, TickError> {
        if let Some(pending) = self.pending_capture.take() {
            if !pending.is_finished() {
                self.pending_capture = Some(pending);
                return Err(CaptureError::Stalled.into());
            }
            // Whatever it returned is stale by now.
            log_debug!("stalled capture finished, resuming");
        }

        let capture_start = Instant::now();
        let source = Arc::clone(&self.source);
        let region = self.region;
        let mut capture = tokio::task::spawn_blocking(move || source.capture(region));
        match tokio::time::timeout(self.capture_timeout, &mut capture).await {
            Ok(joined) => {
                log_debug!("capture {}ms", capture_start.elapsed().as_millis());
                Ok(joined??)
            }
            Err(_) => {
                self.pending_capture = Some(capture);
                Err(CaptureError::Timeout(self.capture_timeout.as_millis() as u64).into())
            }
        }
    }

    /// Ticks every `poll_interval` until cancelled. A slow tick delays the next
    /// one rather than dropping it, and cancellation waits for the tick in
    /// progress.
    pub async fn run(
        mut self,
        poll_interval: Duration,
        cancel_token: CancellationToken,
        paused: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log_info!(
            "detection loop started: {} templates, threshold {:.2}, every {}ms",
            self.library.len(),
            self.threshold,
            poll_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let is_paused = *paused.borrow();
                    if !is_paused {
                        match self.tick(Instant::now()).await {
                            Ok(_) => {}
                            Err(TickError::Capture(err)) => log_warn!("frame capture failed, skipping tick: {err}"),
                            Err(err) => log_error!("detection tick failed: {err}"),
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    log_info!("detection loop shutting down");
                    break;
                }
            }
        }
    }
}

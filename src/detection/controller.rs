use anyhow::{bail, Context, Result};
use log::info;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::DetectionLoop;

/// Owns the running detection task.
pub struct DetectionController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    pause_tx: Option<watch::Sender<bool>>,
}

impl DetectionController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            pause_tx: None,
        }
    }

    pub fn start(&mut self, detection_loop: DetectionLoop, poll_interval: Duration) -> Result<()> {
        if self.handle.is_some() {
            bail!("detection already active");
        }

        let cancel_token = CancellationToken::new();
        // false = capturing, true = paused (ticks are skipped)
        let (pause_tx, pause_rx) = watch::channel(false);

        let handle = tokio::spawn(detection_loop.run(poll_interval, cancel_token.clone(), pause_rx));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.pause_tx = Some(pause_tx);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn pause(&self) {
        if let Some(tx) = &self.pause_tx {
            let _ = tx.send(true);
            info!("Detection paused");
        }
    }

    pub fn resume(&self) {
        if let Some(tx) = &self.pause_tx {
            let _ = tx.send(false);
            info!("Detection resumed");
        }
    }

    /// Cancels the loop and waits for the tick in progress to finish.
    pub async fn stop(&mut self) -> Result<()> {
        self.pause_tx = None;
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
        } else {
            Ok(())
        }
    }
}

impl Default for DetectionController {
    fn default() -> Self {
        Self::new()
    }
}

//! Clipboard-mediated capture: run a trigger, wait for the clipboard to change, read it.
//!
//! The clipboard is shared with every other process, so the engine only trusts content
//! once the clipboard's change token has advanced past the value recorded before the
//! trigger ran. When asked to preserve the user's clipboard it snapshots every item
//! beforehand and restores it on every exit path, including cancellation.
//!
//! Another process writing to the clipboard between trigger and poll (clipboard managers,
//! PopClip-style tools) can be captured instead of the trigger's content. The engine
//! guarantees "text present after the token advanced", not "text caused by this trigger".

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, SelectionError};
use crate::ports::{ClipboardClient, ClipboardSnapshot};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_RESTORE_DELAY: Duration = Duration::from_millis(50);

/// Smallest sleep between polls so a zero interval cannot spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Snapshot the clipboard first and put it back afterwards.
    pub preserve_original: bool,
    /// Wait before restoring, so a paste fed by this capture reads the new content first.
    pub restore_delay: Duration,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            preserve_original: true,
            restore_delay: DEFAULT_RESTORE_DELAY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// What a single capture observed.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The token advanced and non-empty text appeared.
    Captured(String),
    /// No readable change before the poll timeout.
    NoChange,
    /// The trigger itself failed; the clipboard was not polled.
    TriggerFailed(SelectionError),
}

impl CaptureOutcome {
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Captured(text) => Some(text),
            Self::NoChange | Self::TriggerFailed(_) => None,
        }
    }
}

/// Calls `check` every `interval` until it yields a value or `timeout` elapses.
///
/// Returns no later than `timeout + interval` after the first check.
pub async fn poll_until<T, F>(interval: Duration, timeout: Duration, mut check: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    let started = Instant::now();
    let deadline = started + timeout;
    loop {
        if let Some(value) = check() {
            debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Poll condition met");
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            debug!(timeout_ms = timeout.as_millis() as u64, "Poll timeout reached");
            return None;
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Puts a snapshot back when dropped, unless already restored.
struct RestoreGuard {
    clipboard: Arc<dyn ClipboardClient>,
    snapshot: Option<ClipboardSnapshot>,
}

impl RestoreGuard {
    fn new(clipboard: Arc<dyn ClipboardClient>, snapshot: ClipboardSnapshot) -> Self {
        Self {
            clipboard,
            snapshot: Some(snapshot),
        }
    }

    fn restore(mut self) {
        self.restore_now("completed");
    }

    fn restore_now(&mut self, reason: &'static str) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        match self.clipboard.restore(&snapshot) {
            Ok(()) => debug!(
                reason,
                items = snapshot.items.len(),
                bytes = snapshot.total_bytes(),
                "Restored original clipboard contents"
            ),
            Err(e) => warn!(reason, error = %e, "Failed to restore original clipboard contents"),
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.restore_now("early exit");
    }
}

/// Borrows the clipboard as a side channel for a triggering action.
#[derive(Clone)]
pub struct ClipboardCapture {
    clipboard: Arc<dyn ClipboardClient>,
}

impl ClipboardCapture {
    pub fn new(clipboard: Arc<dyn ClipboardClient>) -> Self {
        Self { clipboard }
    }

    /// Runs `trigger` and returns the text it put on the clipboard, if any.
    pub async fn capture<F, Fut>(&self, trigger: F, options: &CaptureOptions) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        match self.capture_outcome(trigger, options).await {
            Ok(outcome) => outcome.into_text(),
            Err(e) => {
                warn!(error = %e, "Clipboard capture failed");
                None
            }
        }
    }

    /// Like [`capture`](Self::capture) but reports why nothing was captured.
    pub async fn capture_outcome<F, Fut>(
        &self,
        trigger: F,
        options: &CaptureOptions,
    ) -> Result<CaptureOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.capture_then(trigger, |_| async { Ok(()) }, options)
            .await
    }

    /// Runs `trigger`, then `follow_up` with the captured text while it is still on the
    /// clipboard, then restores the original clipboard after `restore_delay`.
    ///
    /// `Err` means the clipboard itself could not be snapshotted or queried, or the
    /// follow-up failed; trigger failures are reported as [`CaptureOutcome::TriggerFailed`].
    pub async fn capture_then<F, Fut, G, GFut>(
        &self,
        trigger: F,
        follow_up: G,
        options: &CaptureOptions,
    ) -> Result<CaptureOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
        G: FnOnce(String) -> GFut,
        GFut: Future<Output = Result<()>>,
    {
        let guard = if options.preserve_original {
            let snapshot = self.clipboard.snapshot()?;
            debug!(
                items = snapshot.items.len(),
                bytes = snapshot.total_bytes(),
                "Saved clipboard snapshot"
            );
            Some(RestoreGuard::new(self.clipboard.clone(), snapshot))
        } else {
            None
        };

        let initial = self.clipboard.change_token()?;
        debug!(token = %initial, "Executing trigger action");

        if let Err(e) = trigger().await {
            warn!(error = %e, "Trigger action failed");
            if let Some(guard) = guard {
                guard.restore();
            }
            return Ok(CaptureOutcome::TriggerFailed(e));
        }

        let clipboard = &self.clipboard;
        let captured = poll_until(options.poll_interval, options.poll_timeout, || {
            let token = match clipboard.change_token() {
                Ok(token) => token,
                Err(e) => {
                    debug!(error = %e, "Failed to read clipboard change token");
                    return None;
                }
            };
            if !token.advanced_since(initial) {
                return None;
            }
            match clipboard.read_text() {
                Ok(Some(text)) if !text.is_empty() => Some(text),
                Ok(_) => {
                    debug!(token = %token, "Clipboard changed but no text content yet");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "Clipboard changed but is not readable yet");
                    None
                }
            }
        })
        .await;

        let follow_up_result = match &captured {
            Some(text) => {
                info!(len = text.len(), "Captured new clipboard content");
                follow_up(text.clone()).await
            }
            None => {
                debug!("Trigger produced no readable clipboard change within timeout");
                Ok(())
            }
        };

        if let Some(guard) = guard {
            if !options.restore_delay.is_zero() {
                tokio::time::sleep(options.restore_delay).await;
            }
            guard.restore();
        }

        follow_up_result?;
        Ok(match captured {
            Some(text) => CaptureOutcome::Captured(text),
            None => CaptureOutcome::NoChange,
        })
    }
}

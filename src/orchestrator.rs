//! Strategy orchestration: try each acquisition strategy in order until one yields text.
//!
//! A run is a forward-only state machine over the configured [`StrategySet`]. Each
//! attempt produces one [`AcquisitionResult`]; [`transition`] decides whether the run
//! succeeds, fails, ends empty, or moves on to a later strategy. No strategy is ever
//! evaluated twice or after a terminal state.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::alert::AlertVolume;
use crate::capture::{CaptureOptions, CaptureOutcome, ClipboardCapture};
use crate::command::{run_script, ScriptJob};
use crate::config::{FlightPolicy, Settings};
use crate::error::{ErrorKind, Result, SelectionError};
use crate::focused;
use crate::menu::{self, MenuAction, MenuItemHandle};
use crate::ports::{
    AccessibilityClient, AppInfo, ClipboardClient, CommandRunner, KeyboardInjector,
    SelectionBounds, Shortcut,
};
use crate::strategy::{AcquisitionResult, Strategy, StrategySet};

/// Next step of a run after one attempt.
#[derive(Debug)]
pub enum Transition {
    /// Evaluate the strategy at this index; always later than the current one.
    Try(usize),
    Succeeded(String),
    /// Terminal with no text.
    Finished,
    Failed(SelectionError),
}

/// Maps benign failures to `Empty`: nothing focused, nothing selected, or too slow.
pub fn classify(result: AcquisitionResult) -> AcquisitionResult {
    match result {
        AcquisitionResult::Failed(e)
            if matches!(
                e.kind(),
                ErrorKind::NoFocusTarget | ErrorKind::NoSelection | ErrorKind::Timeout
            ) =>
        {
            debug!(error = %e, "Treating failure as empty result");
            AcquisitionResult::Empty
        }
        other => other,
    }
}

/// Decides what follows the attempt of `strategies[index]`.
pub fn transition(strategies: &StrategySet, index: usize, result: AcquisitionResult) -> Transition {
    let next = index + 1;
    match result {
        AcquisitionResult::Text(text) => Transition::Succeeded(text),
        AcquisitionResult::Empty => Transition::Try(next),
        AcquisitionResult::Failed(error) => match error.kind() {
            ErrorKind::PermissionDenied => Transition::Failed(error),
            ErrorKind::NoMenuItem => match strategies.get(index) {
                Some(Strategy::MenuActionCopy) => {
                    match strategies.position(Strategy::ShortcutCopy) {
                        Some(shortcut) if shortcut > index => Transition::Try(shortcut),
                        _ => Transition::Try(next),
                    }
                }
                _ => Transition::Failed(error),
            },
            ErrorKind::DisabledMenuItem => Transition::Finished,
            ErrorKind::NoFocusTarget | ErrorKind::NoSelection | ErrorKind::Timeout => {
                Transition::Try(next)
            }
            ErrorKind::ExecutionFailed | ErrorKind::Busy | ErrorKind::System => {
                Transition::Failed(error)
            }
        },
    }
}

/// Selection retrieval over injected OS collaborators.
pub struct SelectionService<A: AccessibilityClient> {
    ax: Arc<A>,
    clipboard: Arc<dyn ClipboardClient>,
    keyboard: Arc<dyn KeyboardInjector>,
    runner: Arc<dyn CommandRunner>,
    capture: ClipboardCapture,
    alert: AlertVolume,
    settings: Settings,
    flight: Mutex<()>,
}

impl<A: AccessibilityClient> SelectionService<A> {
    pub fn new(
        ax: Arc<A>,
        clipboard: Arc<dyn ClipboardClient>,
        keyboard: Arc<dyn KeyboardInjector>,
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
    ) -> Self {
        Self {
            capture: ClipboardCapture::new(clipboard.clone()),
            alert: AlertVolume::new(runner.clone()),
            ax,
            clipboard,
            keyboard,
            runner,
            settings,
            flight: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn accessibility(&self) -> &A {
        &self.ax
    }

    /// Tries `strategies` in order. `Ok(None)` when none produced text.
    pub async fn get_selected_text(&self, strategies: &StrategySet) -> Result<Option<String>> {
        info!(strategies = %strategies, "Getting selected text");
        let mut flight = None;
        let mut index = 0;

        while let Some(strategy) = strategies.get(index) {
            let result = if strategy.touches_clipboard() && flight.is_none() {
                match self.enter_flight().await {
                    Ok(guard) => {
                        flight = Some(guard);
                        self.attempt(strategy).await
                    }
                    Err(e) => AcquisitionResult::Failed(e),
                }
            } else {
                self.attempt(strategy).await
            };
            let result = classify(result);
            debug!(%strategy, result = result.label(), "Strategy attempt finished");

            match transition(strategies, index, result) {
                Transition::Try(next) => index = next,
                Transition::Succeeded(text) => {
                    info!(%strategy, len = text.len(), "Got selected text");
                    return Ok(Some(text));
                }
                Transition::Finished => {
                    info!(%strategy, "Selection unavailable, stopping");
                    return Ok(None);
                }
                Transition::Failed(error) => {
                    warn!(%strategy, error = %error, "Strategy failed, stopping");
                    return Err(error);
                }
            }
        }

        info!("No strategy produced selected text");
        Ok(None)
    }

    /// Configured strategies, plus script-copy when the frontmost app has a script.
    pub async fn get_selected_text_auto(&self) -> Result<Option<String>> {
        let strategies = self.effective_strategies();
        self.get_selected_text(&strategies).await
    }

    pub fn effective_strategies(&self) -> StrategySet {
        let mut strategies = self.settings.strategies.clone();
        if self.frontmost_script().is_some() {
            strategies.push(Strategy::ScriptCopy);
        }
        strategies
    }

    pub fn find_menu_item(
        &self,
        action: MenuAction,
        require_enabled: bool,
    ) -> Result<MenuItemHandle<A::Element>> {
        menu::find_menu_item(self.ax.as_ref(), action, require_enabled)
    }

    pub fn has_menu_item(&self, action: MenuAction) -> bool {
        menu::has_menu_item(self.ax.as_ref(), action)
    }

    pub fn selection_bounds(&self) -> Result<Option<SelectionBounds>> {
        focused::selection_bounds(self.ax.as_ref())
    }

    /// Runs `trigger` through the capture engine under the single-flight policy.
    pub async fn capture_clipboard<F, Fut>(
        &self,
        trigger: F,
        options: &CaptureOptions,
    ) -> Result<Option<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let _flight = self.enter_flight().await?;
        Ok(self.capture.capture(trigger, options).await)
    }

    /// Puts `text` on the clipboard, pastes it into the focused app, then restores
    /// the previous clipboard when `preserve_clipboard` is set.
    pub async fn copy_then_paste(&self, text: &str, preserve_clipboard: bool) -> Result<()> {
        if text.is_empty() {
            debug!("Nothing to paste");
            return Ok(());
        }
        let _flight = self.enter_flight().await?;
        let options = CaptureOptions {
            preserve_original: preserve_clipboard,
            ..self.settings.capture
        };

        let outcome = self
            .capture
            .capture_then(
                || async { self.clipboard.write_text(text) },
                |_| self.keyboard.send(Shortcut::Paste),
                &options,
            )
            .await?;

        match outcome {
            CaptureOutcome::Captured(_) => {
                info!(len = text.len(), "Pasted text");
                Ok(())
            }
            CaptureOutcome::NoChange => Err(SelectionError::system(
                "Failed to paste text",
                "clipboard did not change after writing",
            )),
            CaptureOutcome::TriggerFailed(e) => Err(e),
        }
    }

    /// Runs an ad-hoc script through the configured interpreter.
    pub async fn run_script(&self, job: &ScriptJob) -> Result<String> {
        run_script(self.runner.as_ref(), &self.settings.script_interpreter, job).await
    }

    async fn enter_flight(&self) -> Result<MutexGuard<'_, ()>> {
        match self.settings.flight_policy {
            FlightPolicy::Queue => Ok(self.flight.lock().await),
            FlightPolicy::Reject => self.flight.try_lock().map_err(|_| {
                warn!("Clipboard operation already in flight, rejecting");
                SelectionError::Busy
            }),
        }
    }

    fn frontmost_script(&self) -> Option<(AppInfo, ScriptJob)> {
        if self.settings.app_scripts.is_empty() {
            return None;
        }
        let app = match self.ax.frontmost_app() {
            Ok(Some(app)) => app,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Failed to query frontmost app");
                return None;
            }
        };
        let (key, script) = self
            .settings
            .app_scripts
            .iter()
            .find(|(key, _)| app.matches(key))?;
        let job = script.to_job(key);
        Some((app, job))
    }

    async fn attempt(&self, strategy: Strategy) -> AcquisitionResult {
        debug!(%strategy, "Trying strategy");
        match strategy {
            Strategy::DirectRead => match focused::read_selection(self.ax.as_ref()) {
                Ok(text) => AcquisitionResult::from_text(Some(text)),
                Err(e) => AcquisitionResult::Failed(e),
            },
            Strategy::MenuActionCopy => {
                let handle = match self.find_menu_item(MenuAction::Copy, true) {
                    Ok(handle) => handle,
                    Err(e) => return AcquisitionResult::Failed(e),
                };
                let ax = self.ax.as_ref();
                let element = handle.element;
                self.capture_text(async move { ax.press(&element) }.boxed())
                    .await
            }
            Strategy::ShortcutCopy => {
                let copy = self.capture_text(self.keyboard.send(Shortcut::Copy));
                if self.settings.mute_alert_volume {
                    match self.alert.with_muted(|| copy.map(Ok)).await {
                        Ok(result) => result,
                        Err(e) => AcquisitionResult::Failed(e),
                    }
                } else {
                    copy.await
                }
            }
            Strategy::ScriptCopy => {
                let Some((app, job)) = self.frontmost_script() else {
                    debug!("No copy script configured for frontmost app");
                    return AcquisitionResult::Empty;
                };
                debug!(app = %app, script = %job.label(), "Running app copy script");
                let runner = self.runner.as_ref();
                let interpreter = &self.settings.script_interpreter;
                self.capture_text(
                    async move { run_script(runner, interpreter, &job).await.map(|_| ()) }.boxed(),
                )
                .await
            }
        }
    }

    async fn capture_text(&self, trigger: BoxFuture<'_, Result<()>>) -> AcquisitionResult {
        match self
            .capture
            .capture_outcome(|| trigger, &self.settings.capture)
            .await
        {
            Ok(CaptureOutcome::Captured(text)) => AcquisitionResult::from_text(Some(text)),
            Ok(CaptureOutcome::NoChange) => AcquisitionResult::Empty,
            Ok(CaptureOutcome::TriggerFailed(e)) | Err(e) => AcquisitionResult::Failed(e),
        }
    }
}

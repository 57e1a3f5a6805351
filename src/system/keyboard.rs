//! Synthetic copy/paste shortcuts.
//!
//! - macOS: AppleScript `System Events` keystroke (the process needs accessibility
//!   permission for System Events to post it).
//! - Windows: `enigo` key events on a blocking thread.
//! - Linux and others: `xdotool`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::command::{run_script, ScriptInterpreter, ScriptJob};
use crate::error::Result;
use crate::ports::{CommandRunner, KeyboardInjector, Shortcut};

/// Delay in AppleScript to allow focus to settle before sending keystroke.
const APPLESCRIPT_FOCUS_DELAY: f64 = 0.05;

/// The platform's keyboard injector.
pub fn system_keyboard(
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
) -> Arc<dyn KeyboardInjector> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(AppleScriptKeyboard::new(runner, timeout))
    }

    #[cfg(target_os = "windows")]
    {
        let _ = (runner, timeout);
        Arc::new(EnigoKeyboard)
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        Arc::new(XdotoolKeyboard::new(runner, timeout))
    }
}

fn keystroke_script(shortcut: Shortcut) -> String {
    format!(
        r#"tell application "System Events"
    delay {APPLESCRIPT_FOCUS_DELAY}
    keystroke "{}" using command down
end tell"#,
        shortcut.key()
    )
}

/// Sends Cmd+<key> to the frontmost application via `osascript`.
pub struct AppleScriptKeyboard {
    runner: Arc<dyn CommandRunner>,
    interpreter: ScriptInterpreter,
    timeout: Duration,
}

impl AppleScriptKeyboard {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self {
            runner,
            interpreter: ScriptInterpreter::apple_script(),
            timeout,
        }
    }
}

#[async_trait]
impl KeyboardInjector for AppleScriptKeyboard {
    async fn send(&self, shortcut: Shortcut) -> Result<()> {
        debug!(key = %shortcut.key(), "Simulating Cmd shortcut via AppleScript");
        let job = ScriptJob::new(keystroke_script(shortcut))
            .named(format!("keystroke cmd+{}", shortcut.key()))
            .with_timeout(self.timeout);
        run_script(self.runner.as_ref(), &self.interpreter, &job).await?;
        Ok(())
    }
}

/// Sends Ctrl+<key> to the focused X11 window via `xdotool`.
pub struct XdotoolKeyboard {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl XdotoolKeyboard {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl KeyboardInjector for XdotoolKeyboard {
    async fn send(&self, shortcut: Shortcut) -> Result<()> {
        debug!(key = %shortcut.key(), "Simulating Ctrl shortcut via xdotool");
        let args = vec![
            "key".to_string(),
            "--clearmodifiers".to_string(),
            format!("ctrl+{}", shortcut.key()),
        ];
        self.runner.run("xdotool", &args, self.timeout).await?;
        Ok(())
    }
}

/// Sends Ctrl+<key> to the foreground window with `enigo`.
#[cfg(target_os = "windows")]
pub struct EnigoKeyboard;

#[cfg(target_os = "windows")]
#[async_trait]
impl KeyboardInjector for EnigoKeyboard {
    async fn send(&self, shortcut: Shortcut) -> Result<()> {
        use crate::error::SelectionError;
        use enigo::{Direction, Enigo, Key, Keyboard, Settings};

        debug!(key = %shortcut.key(), "Simulating Ctrl shortcut via enigo");
        let key = shortcut.key();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let failed =
                |e: enigo::InputError| SelectionError::system("Failed to send key event", e);
            let mut enigo = Enigo::new(&Settings::default())
                .map_err(|e| SelectionError::system("Failed to initialize enigo", e))?;
            enigo.key(Key::Control, Direction::Press).map_err(failed)?;
            enigo.key(Key::Unicode(key), Direction::Click).map_err(failed)?;
            enigo.key(Key::Control, Direction::Release).map_err(failed)?;
            Ok(())
        })
        .await
        .map_err(|e| SelectionError::system("Key event task failed", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    #[tokio::test]
    async fn test_applescript_keystroke() {
        let runner = Arc::new(FakeRunner::new());
        let keyboard = AppleScriptKeyboard::new(runner.clone(), Duration::from_secs(2));
        keyboard.send(Shortcut::Paste).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].program, "osascript");
        assert_eq!(calls[0].args[0], "-e");
        assert!(calls[0].args[1].contains(r#"keystroke "v" using command down"#));
        assert_eq!(calls[0].timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_xdotool_arguments() {
        let runner = Arc::new(FakeRunner::new());
        let keyboard = XdotoolKeyboard::new(runner.clone(), Duration::from_millis(500));
        keyboard.send(Shortcut::Copy).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].program, "xdotool");
        assert_eq!(calls[0].args, vec!["key", "--clearmodifiers", "ctrl+c"]);
    }

    #[tokio::test]
    async fn test_keystroke_failure_propagates() {
        let runner = Arc::new(FakeRunner::new().respond(Err(
            crate::error::SelectionError::ExecutionFailed {
                exit_code: 1,
                output: "not allowed to send keystrokes".into(),
            },
        )));
        let keyboard = AppleScriptKeyboard::new(runner, Duration::from_secs(1));
        assert!(keyboard.send(Shortcut::Copy).await.is_err());
    }
}

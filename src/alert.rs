//! System alert volume control through System Events.
//!
//! Synthetic copy shortcuts make the frontmost app beep when nothing is selected.
//! Muting the alert volume around the shortcut keeps that quiet.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::command::{run_script, ScriptInterpreter, ScriptJob};
use crate::error::{Result, SelectionError};
use crate::ports::CommandRunner;

const VOLUME_SCRIPT_TIMEOUT: Duration = Duration::from_secs(2);

fn system_events(commands: &str) -> String {
    format!("tell application \"System Events\"\n{commands}\nend tell")
}

#[derive(Clone)]
pub struct AlertVolume {
    runner: Arc<dyn CommandRunner>,
    interpreter: ScriptInterpreter,
}

impl AlertVolume {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            interpreter: ScriptInterpreter::apple_script(),
        }
    }

    async fn run(&self, name: &str, commands: &str) -> Result<String> {
        let job = ScriptJob::new(system_events(commands))
            .named(name)
            .with_timeout(VOLUME_SCRIPT_TIMEOUT);
        run_script(self.runner.as_ref(), &self.interpreter, &job).await
    }

    /// Current alert volume (0-100), `None` if the output is not a number.
    pub async fn current(&self) -> Result<Option<u8>> {
        let output = self
            .run("get alert volume", "get alert volume of (get volume settings)")
            .await?;
        Ok(output.trim().parse().ok())
    }

    /// Sets the alert volume, clamped to 0-100.
    pub async fn set(&self, volume: i64) -> Result<()> {
        let volume = volume.clamp(0, 100);
        self.run("set alert volume", &format!("set volume alert volume {volume}"))
            .await?;
        debug!(volume, "Set alert volume");
        Ok(())
    }

    /// Mutes the alert volume and returns the previous level.
    pub async fn mute(&self) -> Result<u8> {
        let output = self
            .run(
                "mute alert volume",
                "set originalVolume to alert volume of (get volume settings)\n\
                 set volume alert volume 0\n\
                 return originalVolume",
            )
            .await?;
        output.trim().parse().map_err(|e| {
            SelectionError::system(format!("Unexpected alert volume output '{output}'"), e)
        })
    }

    /// Runs `operation` with the alert volume muted and restores it on every outcome.
    ///
    /// If muting fails the operation still runs, unmuted.
    pub async fn with_muted<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let original = match self.mute().await {
            Ok(volume) => Some(volume),
            Err(e) => {
                warn!(error = %e, "Failed to mute alert volume");
                None
            }
        };

        let result = operation().await;

        if let Some(volume) = original {
            if let Err(e) = self.set(i64::from(volume)).await {
                warn!(volume, error = %e, "Failed to restore alert volume");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;

    fn script_of(call: &crate::testing::RunCall) -> &str {
        &call.args[1]
    }

    #[tokio::test]
    async fn test_with_muted_restores_after_success() {
        let runner = Arc::new(FakeRunner::new().respond(Ok("75".into())));
        let alert = AlertVolume::new(runner.clone());

        let value = alert.with_muted(|| async { Ok(5) }).await.unwrap();

        assert_eq!(value, 5);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].program, "osascript");
        assert!(script_of(&calls[0]).contains("set volume alert volume 0"));
        assert!(script_of(&calls[1]).contains("set volume alert volume 75"));
        assert_eq!(calls[1].timeout, VOLUME_SCRIPT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_with_muted_restores_after_failure() {
        let runner = Arc::new(FakeRunner::new().respond(Ok("40".into())));
        let alert = AlertVolume::new(runner.clone());

        let err = alert
            .with_muted(|| async { Err::<(), _>(SelectionError::NoSelection) })
            .await
            .unwrap_err();

        assert!(matches!(err, SelectionError::NoSelection));
        assert!(script_of(&runner.calls()[1]).contains("set volume alert volume 40"));
    }

    #[tokio::test]
    async fn test_mute_failure_still_runs_operation() {
        let runner = Arc::new(FakeRunner::new().respond(Err(SelectionError::ExecutionFailed {
            exit_code: 1,
            output: "System Events got an error".into(),
        })));
        let alert = AlertVolume::new(runner.clone());

        let value = alert.with_muted(|| async { Ok("ran") }).await.unwrap();

        assert_eq!(value, "ran");
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_set_clamps_and_current_parses() {
        let runner = Arc::new(
            FakeRunner::new()
                .respond(Ok(String::new()))
                .respond(Ok("n/a".into())),
        );
        let alert = AlertVolume::new(runner.clone());

        alert.set(250).await.unwrap();
        assert!(script_of(&runner.calls()[0]).contains("set volume alert volume 100"));
        assert_eq!(alert.current().await.unwrap(), None);
    }
}

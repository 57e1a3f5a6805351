//! Timeout-bounded execution of external automation commands.
//!
//! Automation engines (`osascript`, `xdotool`, shell scripts) can hang when the target
//! application is busy. Every run races the child process against a timer; whichever
//! finishes first wins and the loser is dropped, which kills a still-running child.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, SelectionError};
use crate::ports::CommandRunner;

/// Default timeout for a [`ScriptJob`] when none is configured.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Awaits `future` for at most `duration`.
///
/// On expiry the future is dropped (cancelling whatever it owned) and
/// `Timeout { operation, duration }` is returned.
pub async fn with_timeout<T, F>(operation: &str, duration: Duration, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        result = future => result,
        _ = tokio::time::sleep(duration) => {
            warn!(operation, timeout_ms = duration.as_millis() as u64, "Operation timed out");
            Err(SelectionError::timeout(operation, duration))
        }
    }
}

/// Spawns real child processes through tokio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String> {
        debug!(
            program,
            args = args.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Running command"
        );

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SelectionError::system(format!("Failed to execute {program}"), e))?;

        let output = with_timeout(program, timeout, async move {
            child
                .wait_with_output()
                .await
                .map_err(|e| SelectionError::system(format!("{program} process failed"), e))
        })
        .await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let combined = combined.trim().to_string();

        if output.status.success() {
            debug!(program, output_len = combined.len(), "Command succeeded");
            Ok(combined)
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(program, exit_code, "Command failed");
            Err(SelectionError::ExecutionFailed {
                exit_code,
                output: combined,
            })
        }
    }
}

/// Program and flag used to evaluate script source, e.g. `osascript -e <source>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInterpreter {
    pub program: String,
    pub flag: String,
}

impl ScriptInterpreter {
    pub fn apple_script() -> Self {
        Self {
            program: "osascript".to_string(),
            flag: "-e".to_string(),
        }
    }

    pub fn shell() -> Self {
        Self {
            program: "sh".to_string(),
            flag: "-c".to_string(),
        }
    }
}

impl Default for ScriptInterpreter {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::apple_script()
        } else {
            Self::shell()
        }
    }
}

/// A script to run through the [`ScriptInterpreter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptJob {
    pub source: String,
    pub timeout: Duration,
    pub name: Option<String>,
}

impl ScriptJob {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            name: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name for logs; falls back to the first line of the source.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .source
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or("script")
                .chars()
                .take(40)
                .collect(),
        }
    }
}

/// Runs `job` through `interpreter`; a timeout is reported under the job's label.
pub async fn run_script(
    runner: &dyn CommandRunner,
    interpreter: &ScriptInterpreter,
    job: &ScriptJob,
) -> Result<String> {
    let label = job.label();
    debug!(script = %label, timeout_ms = job.timeout.as_millis() as u64, "Running script");
    let args = vec![interpreter.flag.clone(), job.source.clone()];
    match runner.run(&interpreter.program, &args, job.timeout).await {
        Err(SelectionError::Timeout { duration, .. }) => {
            Err(SelectionError::timeout(format!("script '{label}'"), duration))
        }
        other => other,
    }
}

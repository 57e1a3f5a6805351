//! Error taxonomy shared by every acquisition strategy.
//!
//! Each failure carries enough context for diagnostics, while [`ErrorKind`] is the
//! fieldless classification the orchestrator matches on.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::menu::MenuAction;

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(
        "Accessibility permission denied - enable in System Settings > Privacy & Security > Accessibility"
    )]
    PermissionDenied,
    #[error("No focused application or UI element")]
    NoFocusTarget,
    #[error("Focused element exposes no selected text")]
    NoSelection,
    #[error("No {0} menu item in the frontmost application")]
    NoMenuItem(MenuAction),
    #[error("{0} menu item is disabled")]
    DisabledMenuItem(MenuAction),
    #[error("{operation} timed out after {}ms", duration.as_millis())]
    Timeout {
        operation: String,
        duration: Duration,
    },
    #[error("Command failed with exit code {exit_code}: {output}")]
    ExecutionFailed { exit_code: i32, output: String },
    #[error("Another clipboard operation is already in flight")]
    Busy,
    #[error("{context}: {source}")]
    System {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Fieldless classification of [`SelectionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    NoFocusTarget,
    NoSelection,
    NoMenuItem,
    DisabledMenuItem,
    Timeout,
    ExecutionFailed,
    Busy,
    System,
}

impl SelectionError {
    /// Wraps an unexpected OS-level failure.
    pub fn system<E>(context: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::System {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PermissionDenied => ErrorKind::PermissionDenied,
            Self::NoFocusTarget => ErrorKind::NoFocusTarget,
            Self::NoSelection => ErrorKind::NoSelection,
            Self::NoMenuItem(_) => ErrorKind::NoMenuItem,
            Self::DisabledMenuItem(_) => ErrorKind::DisabledMenuItem,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            Self::Busy => ErrorKind::Busy,
            Self::System { .. } => ErrorKind::System,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Whether the user (or a later retry) can do something about it.
    pub fn is_recoverable(&self) -> bool {
        match self.kind() {
            ErrorKind::PermissionDenied
            | ErrorKind::Timeout
            | ErrorKind::Busy
            | ErrorKind::NoFocusTarget
            | ErrorKind::NoSelection => true,
            ErrorKind::NoMenuItem
            | ErrorKind::DisabledMenuItem
            | ErrorKind::ExecutionFailed
            | ErrorKind::System => false,
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoFocusTarget => "no_focus_target",
            Self::NoSelection => "no_selection",
            Self::NoMenuItem => "no_menu_item",
            Self::DisabledMenuItem => "disabled_menu_item",
            Self::Timeout => "timeout",
            Self::ExecutionFailed => "execution_failed",
            Self::Busy => "busy",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T, E = SelectionError> = std::result::Result<T, E>;

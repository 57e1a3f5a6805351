//! System interactions (clipboard, accessibility, synthetic keys).

pub mod accessibility;
pub mod clipboard;
pub mod keyboard;

use std::sync::Arc;

use crate::command::ProcessRunner;
use crate::config::Settings;
use crate::error::Result;
use crate::orchestrator::SelectionService;
use crate::ports::CommandRunner;

pub use accessibility::{system_accessibility, PlatformAccessibility};
pub use clipboard::system_clipboard;
pub use keyboard::system_keyboard;

/// A [`SelectionService`] wired to this platform's adapters.
pub fn default_service(settings: Settings) -> Result<SelectionService<PlatformAccessibility>> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
    let clipboard = system_clipboard()?;
    let keyboard = system_keyboard(runner.clone(), settings.command_timeout);
    let ax = Arc::new(system_accessibility());
    Ok(SelectionService::new(ax, clipboard, keyboard, runner, settings))
}

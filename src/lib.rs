//! Reads the text selected in whatever desktop application has focus.
//!
//! No single OS mechanism works in every application, so [`SelectionService`] tries a
//! configurable chain of strategies: a side-effect-free accessibility read, the app's
//! own Copy menu item, the global copy shortcut and per-app scripts. The clipboard-based
//! strategies borrow the system clipboard and put the user's content back afterwards.

pub mod alert;
pub mod capture;
pub mod command;
pub mod config;
pub mod error;
pub mod focused;
pub mod menu;
pub mod orchestrator;
pub mod ports;
pub mod strategy;
pub mod system;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::EnvFilter;

pub use capture::{CaptureOptions, ClipboardCapture};
pub use config::{load_settings, LogLevel, Settings};
pub use error::{ErrorKind, Result, SelectionError};
pub use menu::MenuAction;
pub use orchestrator::SelectionService;
pub use strategy::{AcquisitionResult, Strategy, StrategySet};

/// Installs the global `tracing` subscriber on stderr. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

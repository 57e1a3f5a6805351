//! Linux selection reading through the PRIMARY selection.
//!
//! X11 and Wayland (with data-control) keep the most recent mouse selection in
//! PRIMARY, which is as close to "the focused element's selected text" as the desktop
//! offers without AT-SPI.

use arboard::{Clipboard, GetExtLinux, LinuxClipboardKind};
use tracing::debug;

use crate::error::{Result, SelectionError};
use crate::ports::{AccessibilityClient, AppInfo, MenuItemInfo, SelectionBounds};

/// The PRIMARY selection; the single "element" is the selection itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrimarySelection;

impl AccessibilityClient for PrimarySelection {
    type Element = ();

    fn is_trusted(&self, _prompt: bool) -> bool {
        true
    }

    fn focused_element(&self) -> Result<Option<()>> {
        Ok(Some(()))
    }

    fn selected_text(&self, _element: &()) -> Result<Option<String>> {
        let mut clipboard = Clipboard::new()
            .map_err(|e| SelectionError::system("Failed to initialize clipboard", e))?;
        match clipboard
            .get()
            .clipboard(LinuxClipboardKind::Primary)
            .text()
        {
            Ok(text) if !text.is_empty() => {
                debug!(len = text.len(), "Read PRIMARY selection");
                Ok(Some(text))
            }
            Ok(_) | Err(arboard::Error::ContentNotAvailable) => {
                debug!("PRIMARY selection is empty");
                Ok(None)
            }
            Err(e) => {
                debug!(error = %e, "PRIMARY selection unavailable");
                Ok(None)
            }
        }
    }

    fn selection_bounds(&self, _element: &()) -> Result<Option<SelectionBounds>> {
        Ok(None)
    }

    fn frontmost_app(&self) -> Result<Option<AppInfo>> {
        Ok(None)
    }

    fn menu_bar(&self) -> Result<Option<()>> {
        Ok(None)
    }

    fn children(&self, _element: &()) -> Result<Vec<()>> {
        Ok(Vec::new())
    }

    fn menu_item_info(&self, _element: &()) -> Result<MenuItemInfo> {
        Ok(MenuItemInfo::default())
    }

    fn press(&self, _element: &()) -> Result<()> {
        Err(SelectionError::system(
            "Failed to press menu item",
            "menu introspection is not supported on Linux",
        ))
    }
}

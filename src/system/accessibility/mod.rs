//! Accessibility adapters.
//!
//! - macOS: the AX API (focused element, selected text, menu bar).
//! - Linux: the PRIMARY selection stands in for the focused element's selection;
//!   there is no menu introspection.
//! - Others: nothing is focused and there is no menu bar.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
pub use linux::PrimarySelection;
#[cfg(target_os = "macos")]
pub use macos::{AxElement, MacAccessibility};

use crate::error::{Result, SelectionError};
use crate::ports::{AccessibilityClient, AppInfo, MenuItemInfo, SelectionBounds};

#[cfg(target_os = "macos")]
pub type PlatformAccessibility = MacAccessibility;
#[cfg(target_os = "linux")]
pub type PlatformAccessibility = PrimarySelection;
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
pub type PlatformAccessibility = NullAccessibility;

pub fn system_accessibility() -> PlatformAccessibility {
    PlatformAccessibility::default()
}

/// Accessibility for platforms without an introspection API.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAccessibility;

impl AccessibilityClient for NullAccessibility {
    type Element = ();

    fn is_trusted(&self, _prompt: bool) -> bool {
        true
    }

    fn focused_element(&self) -> Result<Option<()>> {
        Ok(None)
    }

    fn selected_text(&self, _element: &()) -> Result<Option<String>> {
        Ok(None)
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
            "menu introspection is not supported on this platform",
        ))
    }
}

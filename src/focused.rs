//! Direct read of the focused element's selection through accessibility.
//!
//! This is the only strategy without side effects: nothing is pressed, typed or
//! copied, so it is always worth trying first.

use tracing::{debug, info, warn};

use crate::error::{Result, SelectionError};
use crate::ports::{AccessibilityClient, SelectionBounds};

/// Selected text of the focused UI element, verbatim.
pub fn read_selection<A>(ax: &A) -> Result<String>
where
    A: AccessibilityClient + ?Sized,
{
    if !ax.is_trusted(false) {
        warn!("Cannot read selection: accessibility permissions required");
        return Err(SelectionError::PermissionDenied);
    }

    let element = ax.focused_element()?.ok_or_else(|| {
        debug!("No focused UI element");
        SelectionError::NoFocusTarget
    })?;

    let text = ax.selected_text(&element)?.ok_or_else(|| {
        debug!("Focused element has no selected text attribute");
        SelectionError::NoSelection
    })?;

    info!(len = text.len(), "Read selected text via accessibility");
    Ok(text)
}

/// Screen rectangle of the focused element's selected range, when the element reports one.
pub fn selection_bounds<A>(ax: &A) -> Result<Option<SelectionBounds>>
where
    A: AccessibilityClient + ?Sized,
{
    if !ax.is_trusted(false) {
        return Err(SelectionError::PermissionDenied);
    }
    match ax.focused_element()? {
        Some(element) => ax.selection_bounds(&element),
        None => Ok(None),
    }
}

//! Collaborator traits for the OS surfaces the capture core depends on.
//!
//! The orchestrator never talks to the OS directly: accessibility, clipboard, external
//! commands and synthetic key events are injected through these traits so platform
//! adapters (see `system`) and test doubles are interchangeable.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

// --- Clipboard ---

/// Snapshot of the clipboard's generation counter.
///
/// Tokens only ever grow; content is trusted only after the token strictly advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeToken(pub u64);

impl ChangeToken {
    pub fn advanced_since(&self, earlier: ChangeToken) -> bool {
        self.0 > earlier.0
    }
}

impl fmt::Display for ChangeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One clipboard item: payloads keyed by type identifier, in the order the owner offered them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardItem {
    pub payloads: Vec<(String, Vec<u8>)>,
}

impl ClipboardItem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payload(mut self, type_id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(type_id, bytes);
        self
    }

    /// Sets the payload for `type_id`, replacing an existing one in place.
    pub fn insert(&mut self, type_id: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let type_id = type_id.into();
        let bytes = bytes.into();
        match self.payloads.iter_mut().find(|(t, _)| *t == type_id) {
            Some(slot) => slot.1 = bytes,
            None => self.payloads.push((type_id, bytes)),
        }
    }

    pub fn get(&self, type_id: &str) -> Option<&[u8]> {
        self.payloads
            .iter()
            .find(|(t, _)| t == type_id)
            .map(|(_, bytes)| bytes.as_slice())
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.payloads.iter().map(|(t, _)| t.as_str())
    }
}

/// Every item and every typed payload on the clipboard at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    pub items: Vec<ClipboardItem>,
}

impl ClipboardSnapshot {
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|item| item.payloads.is_empty())
    }

    pub fn total_bytes(&self) -> usize {
        self.items
            .iter()
            .flat_map(|item| item.payloads.iter())
            .map(|(_, bytes)| bytes.len())
            .sum()
    }
}

/// The shared system clipboard.
pub trait ClipboardClient: Send + Sync {
    fn change_token(&self) -> Result<ChangeToken>;

    /// Plain-text content, `None` when the clipboard holds no text.
    fn read_text(&self) -> Result<Option<String>>;

    /// Replaces the clipboard with `text`.
    fn write_text(&self, text: &str) -> Result<()>;

    fn snapshot(&self) -> Result<ClipboardSnapshot>;

    /// Replaces whatever is on the clipboard with `snapshot`. An empty snapshot clears it.
    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<()>;
}

// --- Accessibility ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub bundle_id: Option<String>,
    pub pid: Option<i32>,
}

impl AppInfo {
    /// Whether `key` names this application, by bundle id or by display name.
    pub fn matches(&self, key: &str) -> bool {
        self.bundle_id.as_deref() == Some(key) || self.name.eq_ignore_ascii_case(key)
    }
}

impl fmt::Display for AppInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bundle_id {
            Some(bundle_id) => write!(f, "{} ({})", self.name, bundle_id),
            None => f.write_str(&self.name),
        }
    }
}

/// Attributes of a menu element relevant to locating copy/paste.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuItemInfo {
    /// Action identifier, e.g. `copy:`.
    pub identifier: Option<String>,
    pub title: Option<String>,
    /// Key equivalent character, e.g. `C`.
    pub shortcut_char: Option<String>,
    pub enabled: bool,
}

/// Screen rectangle in points, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Read access to the OS accessibility tree.
///
/// `Element` handles are only meaningful while the same application stays frontmost;
/// callers must not keep them across requests.
pub trait AccessibilityClient: Send + Sync {
    type Element: Clone + Send + Sync;

    /// Whether this process may use accessibility. `prompt` asks the OS to show its dialog.
    fn is_trusted(&self, prompt: bool) -> bool;

    fn focused_element(&self) -> Result<Option<Self::Element>>;

    fn selected_text(&self, element: &Self::Element) -> Result<Option<String>>;

    fn selection_bounds(&self, element: &Self::Element) -> Result<Option<SelectionBounds>>;

    fn frontmost_app(&self) -> Result<Option<AppInfo>>;

    /// Menu bar of the frontmost application, `None` when it has none.
    fn menu_bar(&self) -> Result<Option<Self::Element>>;

    fn children(&self, element: &Self::Element) -> Result<Vec<Self::Element>>;

    fn menu_item_info(&self, element: &Self::Element) -> Result<MenuItemInfo>;

    fn press(&self, element: &Self::Element) -> Result<()>;
}

// --- External commands ---

/// Runs external programs with a hard timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Trimmed combined output of a successful run.
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String>;
}

// --- Synthetic input ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Copy,
    Paste,
}

impl Shortcut {
    pub fn key(&self) -> char {
        match self {
            Self::Copy => 'c',
            Self::Paste => 'v',
        }
    }
}

/// Posts global modifier+key combinations to the focused application.
#[async_trait]
pub trait KeyboardInjector: Send + Sync {
    async fn send(&self, shortcut: Shortcut) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_insert_replaces_in_place() {
        let mut item = ClipboardItem::new()
            .with_payload("public.utf8-plain-text", "a")
            .with_payload("public.html", "<b>a</b>");
        item.insert("public.utf8-plain-text", "b");
        let types: Vec<&str> = item.types().collect();
        assert_eq!(types, vec!["public.utf8-plain-text", "public.html"]);
        assert_eq!(item.get("public.utf8-plain-text"), Some(&b"b"[..]));
    }

    #[test]
    fn test_snapshot_emptiness_and_size() {
        assert!(ClipboardSnapshot::default().is_empty());
        let snapshot = ClipboardSnapshot {
            items: vec![ClipboardItem::new(), ClipboardItem::new().with_payload("t", "abc")],
        };
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.total_bytes(), 3);
    }

    #[test]
    fn test_app_matches_bundle_id_or_name() {
        let app = AppInfo {
            name: "Safari".into(),
            bundle_id: Some("com.apple.Safari".into()),
            pid: Some(42),
        };
        assert!(app.matches("com.apple.Safari"));
        assert!(app.matches("safari"));
        assert!(!app.matches("com.google.Chrome"));
        assert_eq!(app.to_string(), "Safari (com.apple.Safari)");
    }

    #[test]
    fn test_change_token_strict_advance() {
        assert!(ChangeToken(3).advanced_since(ChangeToken(2)));
        assert!(!ChangeToken(2).advanced_since(ChangeToken(2)));
    }
}

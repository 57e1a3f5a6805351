//! Locating the frontmost application's Copy/Paste menu items.
//!
//! Applications localize menu labels but rarely their menu-bar structure, and the Edit
//! menu conventionally sits fourth from the left. The search therefore starts at that
//! position and widens alternately left and right before falling back to a full walk
//! of the menu bar. An item matches on its action identifier (`copy:`) or, for apps
//! without one, on a localized title combined with its shortcut character.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SelectionError};
use crate::ports::{AccessibilityClient, MenuItemInfo};

/// Top-level menu index tried first; the fourth menu is usually "Edit".
pub const EDIT_MENU_INDEX: usize = 3;

/// Nesting bound for the depth-first walk.
const MAX_MENU_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuAction {
    Copy,
    Paste,
}

impl MenuAction {
    /// Native action selector.
    pub fn selector(&self) -> &'static str {
        match self {
            Self::Copy => "copy:",
            Self::Paste => "paste:",
        }
    }

    /// Key equivalent expected next to a localized title.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Copy => "C",
            Self::Paste => "V",
        }
    }

    pub fn titles(&self) -> &'static [&'static str] {
        match self {
            Self::Copy => COPY_TITLES,
            Self::Paste => PASTE_TITLES,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "copy" => Some(Self::Copy),
            "paste" => Some(Self::Paste),
            _ => None,
        }
    }

    /// Whether `info` describes this action.
    pub fn matches(&self, info: &MenuItemInfo) -> bool {
        if info.identifier.as_deref() == Some(self.selector()) {
            return true;
        }
        let title_matches = info
            .title
            .as_deref()
            .map(str::trim)
            .is_some_and(|title| self.titles().contains(&title));
        let shortcut_matches = info
            .shortcut_char
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(self.mnemonic()));
        title_matches && shortcut_matches
    }
}

impl fmt::Display for MenuAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy => f.write_str("Copy"),
            Self::Paste => f.write_str("Paste"),
        }
    }
}

/// A located menu item. Only valid while the same application stays frontmost.
#[derive(Debug)]
pub struct MenuItemHandle<E> {
    pub element: E,
    pub action: MenuAction,
    pub title: Option<String>,
    pub enabled: bool,
}

/// Top-level indices in visiting order: `start`, then alternately left and right.
///
/// With 7 menus and `start = 3` this is `[3, 2, 4, 1, 5, 0, 6]`. Empty when `start`
/// is out of range, which sends the caller straight to the full walk.
pub fn search_order(total: usize, start: usize) -> Vec<usize> {
    if start >= total {
        return Vec::new();
    }
    let mut order = Vec::with_capacity(total);
    order.push(start);
    for offset in 1..total {
        let left = start.checked_sub(offset);
        let right = start + offset;
        if let Some(left) = left {
            order.push(left);
        }
        if right < total {
            order.push(right);
        }
        if left.is_none() && right >= total {
            break;
        }
    }
    order
}

/// Finds the `action` menu item of the frontmost application.
///
/// With `require_enabled`, a found-but-disabled item is `DisabledMenuItem`.
pub fn find_menu_item<A>(
    ax: &A,
    action: MenuAction,
    require_enabled: bool,
) -> Result<MenuItemHandle<A::Element>>
where
    A: AccessibilityClient + ?Sized,
{
    if !ax.is_trusted(true) {
        warn!("Process is not trusted for accessibility");
        return Err(SelectionError::PermissionDenied);
    }

    let app = ax.frontmost_app()?.ok_or(SelectionError::NoFocusTarget)?;
    info!(app = %app, %action, "Looking up menu item in frontmost app");

    let menu_bar = ax.menu_bar()?.ok_or(SelectionError::NoMenuItem(action))?;
    let (element, info) = locate(ax, &menu_bar, action)?.ok_or_else(|| {
        debug!(%action, "Menu item not found");
        SelectionError::NoMenuItem(action)
    })?;

    if require_enabled && !info.enabled {
        warn!(%action, "Menu item is disabled");
        return Err(SelectionError::DisabledMenuItem(action));
    }

    Ok(MenuItemHandle {
        element,
        action,
        title: info.title,
        enabled: info.enabled,
    })
}

/// Whether the frontmost application exposes an `action` menu item, enabled or not.
pub fn has_menu_item<A>(ax: &A, action: MenuAction) -> bool
where
    A: AccessibilityClient + ?Sized,
{
    find_menu_item(ax, action, false).is_ok()
}

fn locate<A>(
    ax: &A,
    menu_bar: &A::Element,
    action: MenuAction,
) -> Result<Option<(A::Element, MenuItemInfo)>>
where
    A: AccessibilityClient + ?Sized,
{
    let menus = ax.children(menu_bar)?;
    for index in search_order(menus.len(), EDIT_MENU_INDEX) {
        debug!(index, "Checking top-level menu");
        if let Some(found) = depth_first(ax, &menus[index], action, 0)? {
            debug!(index, "Found menu item near Edit menu position");
            return Ok(Some(found));
        }
    }

    debug!(%action, "Not found in top-level menus, searching entire menu bar");
    depth_first(ax, menu_bar, action, 0)
}

fn depth_first<A>(
    ax: &A,
    element: &A::Element,
    action: MenuAction,
    depth: usize,
) -> Result<Option<(A::Element, MenuItemInfo)>>
where
    A: AccessibilityClient + ?Sized,
{
    let info = ax.menu_item_info(element)?;
    if action.matches(&info) {
        debug!(
            identifier = info.identifier.as_deref().unwrap_or(""),
            title = info.title.as_deref().unwrap_or(""),
            "Matched menu item"
        );
        return Ok(Some((element.clone(), info)));
    }
    if depth >= MAX_MENU_DEPTH {
        return Ok(None);
    }
    for child in ax.children(element)? {
        if let Some(found) = depth_first(ax, &child, action, depth + 1)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Menu-bar "Copy" in the languages macOS ships.
const COPY_TITLES: &[&str] = &[
    "Copy",
    "拷贝",
    "复制",
    "拷貝",
    "複製",
    "コピー",
    "복사",
    "Copier",
    "Copiar",
    "Copia",
    "Kopieren",
    "Копировать",
    "Kopiëren",
    "Kopiér",
    "Kopiera",
    "Kopioi",
    "Αντιγραφή",
    "Kopyala",
    "Salin",
    "Sao chép",
    "คัดลอก",
    "Копіювати",
    "Kopiuj",
    "Másolás",
    "Kopírovat",
    "Kopírovať",
    "Kopiraj",
    "Копирај",
    "Копиране",
    "Kopēt",
    "Kopijuoti",
    "Copiază",
    "העתק",
    "نسخ",
    "کپی",
];

/// Menu-bar "Paste" in the same languages.
const PASTE_TITLES: &[&str] = &[
    "Paste",
    "粘贴",
    "貼上",
    "ペースト",
    "貼り付け",
    "붙여넣기",
    "Coller",
    "Pegar",
    "Colar",
    "Incolla",
    "Einfügen",
    "Вставить",
    "Plakken",
    "Indsæt",
    "Klistra in",
    "Liitä",
    "Επικόλληση",
    "Yapıştır",
    "Tempel",
    "Dán",
    "วาง",
    "Вставити",
    "Wklej",
    "Beillesztés",
    "Vložit",
    "Vložiť",
    "Zalijepi",
    "Налепи",
    "Поставяне",
    "Ielīmēt",
    "Įklijuoti",
    "Lipește",
    "הדבק",
    "لصق",
    "چسباندن",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAccessibility, MenuNode};

    fn item(identifier: &str, title: &str, shortcut: &str, enabled: bool) -> MenuNode {
        MenuNode::item(identifier, title, shortcut, enabled)
    }

    fn standard_menu_bar(copy_enabled: bool) -> MenuNode {
        MenuNode::menu(
            "",
            vec![
                MenuNode::menu("Apple", vec![item("about:", "About", "", true)]),
                MenuNode::menu("App", vec![item("hide:", "Hide", "H", true)]),
                MenuNode::menu("File", vec![item("newDocument:", "New", "N", true)]),
                MenuNode::menu(
                    "Edit",
                    vec![MenuNode::menu(
                        "",
                        vec![
                            item("undo:", "Undo", "Z", true),
                            item("copy:", "Copy", "C", copy_enabled),
                            item("paste:", "Paste", "V", true),
                        ],
                    )],
                ),
                MenuNode::menu("View", vec![]),
                MenuNode::menu("Window", vec![]),
                MenuNode::menu("Help", vec![]),
            ],
        )
    }

    #[test]
    fn test_search_order_for_seven_menus() {
        assert_eq!(search_order(7, 3), vec![3, 2, 4, 1, 5, 0, 6]);
    }

    #[test]
    fn test_search_order_uneven_and_short_bars() {
        assert_eq!(search_order(5, 3), vec![3, 2, 4, 1, 0]);
        assert_eq!(search_order(9, 3), vec![3, 2, 4, 1, 5, 0, 6, 7, 8]);
        assert_eq!(search_order(4, 3), vec![3, 2, 1, 0]);
        assert!(search_order(3, 3).is_empty());
        assert!(search_order(0, 3).is_empty());
    }

    #[test]
    fn test_match_by_identifier() {
        let info = MenuItemInfo {
            identifier: Some("copy:".into()),
            title: Some("Duplicate".into()),
            shortcut_char: None,
            enabled: true,
        };
        assert!(MenuAction::Copy.matches(&info));
        assert!(!MenuAction::Paste.matches(&info));
    }

    #[test]
    fn test_localized_title_needs_mnemonic() {
        let mut info = MenuItemInfo {
            identifier: Some("_custom".into()),
            title: Some("Kopieren".into()),
            shortcut_char: Some("C".into()),
            enabled: true,
        };
        assert!(MenuAction::Copy.matches(&info));
        info.shortcut_char = Some("K".into());
        assert!(!MenuAction::Copy.matches(&info));
        info.title = Some("Einfügen".into());
        info.shortcut_char = Some("v".into());
        assert!(MenuAction::Paste.matches(&info));
    }

    #[test]
    fn test_finds_copy_in_edit_menu() {
        let ax = FakeAccessibility::new().with_menu_bar(standard_menu_bar(true));
        let handle = find_menu_item(&ax, MenuAction::Copy, true).unwrap();
        assert_eq!(handle.title.as_deref(), Some("Copy"));
        assert!(handle.enabled);
        // Only the Edit menu subtree is visited when the heuristic hits first.
        assert_eq!(ax.visited_top_level(), vec!["Edit"]);
    }

    #[test]
    fn test_disabled_copy_reported_when_required() {
        let ax = FakeAccessibility::new().with_menu_bar(standard_menu_bar(false));
        let err = find_menu_item(&ax, MenuAction::Copy, true).unwrap_err();
        assert!(matches!(err, SelectionError::DisabledMenuItem(MenuAction::Copy)));

        let handle = find_menu_item(&ax, MenuAction::Copy, false).unwrap();
        assert!(!handle.enabled);
    }

    #[test]
    fn test_falls_back_to_full_walk_on_short_bar() {
        let bar = MenuNode::menu(
            "",
            vec![
                MenuNode::menu("App", vec![]),
                MenuNode::menu("Edit", vec![item("", "复制", "C", true)]),
            ],
        );
        let ax = FakeAccessibility::new().with_menu_bar(bar);
        let handle = find_menu_item(&ax, MenuAction::Copy, true).unwrap();
        assert_eq!(handle.title.as_deref(), Some("复制"));
        assert_eq!(ax.visited_top_level(), vec!["App", "Edit"]);
    }

    #[test]
    fn test_missing_item_and_missing_app() {
        let bar = MenuNode::menu("", vec![MenuNode::menu("File", vec![])]);
        let ax = FakeAccessibility::new().with_menu_bar(bar);
        assert!(matches!(
            find_menu_item(&ax, MenuAction::Paste, false),
            Err(SelectionError::NoMenuItem(MenuAction::Paste))
        ));
        assert!(!has_menu_item(&ax, MenuAction::Paste));

        let ax = FakeAccessibility::new().without_frontmost_app();
        assert!(matches!(
            find_menu_item(&ax, MenuAction::Copy, true),
            Err(SelectionError::NoFocusTarget)
        ));
    }

    #[test]
    fn test_untrusted_process_is_denied() {
        let ax = FakeAccessibility::new()
            .with_menu_bar(standard_menu_bar(true))
            .untrusted();
        assert!(matches!(
            find_menu_item(&ax, MenuAction::Copy, true),
            Err(SelectionError::PermissionDenied)
        ));
    }
}

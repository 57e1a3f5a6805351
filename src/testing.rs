//! In-memory doubles for the OS ports.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SelectionError};
use crate::menu::MenuAction;
use crate::ports::{
    AccessibilityClient, AppInfo, ChangeToken, ClipboardClient, ClipboardItem, ClipboardSnapshot,
    CommandRunner, KeyboardInjector, MenuItemInfo, SelectionBounds, Shortcut,
};

pub const TEXT_TYPE: &str = "public.utf8-plain-text";

// --- Clipboard ---

#[derive(Default)]
struct ClipboardState {
    items: Vec<ClipboardItem>,
    token: u64,
}

/// Clipboard with a counter token that advances on every write.
#[derive(Default)]
pub struct FakeClipboard {
    state: Mutex<ClipboardState>,
    token_reads: AtomicUsize,
    writes: AtomicUsize,
    restores: AtomicUsize,
}

impl FakeClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::new();
        clipboard.set_items(vec![ClipboardItem::new().with_payload(TEXT_TYPE, text)]);
        clipboard
    }

    pub fn set_items(&self, items: Vec<ClipboardItem>) {
        let mut state = self.state.lock().unwrap();
        state.items = items;
        state.token += 1;
    }

    pub fn clear(&self) {
        self.set_items(Vec::new());
    }

    pub fn token_reads(&self) -> usize {
        self.token_reads.load(Ordering::SeqCst)
    }

    /// Writes plus restores; zero means the clipboard was never touched.
    pub fn mutations(&self) -> usize {
        self.writes.load(Ordering::SeqCst) + self.restores.load(Ordering::SeqCst)
    }

    pub fn current_text(&self) -> Option<String> {
        self.read_text().unwrap()
    }
}

impl ClipboardClient for FakeClipboard {
    fn change_token(&self) -> Result<ChangeToken> {
        self.token_reads.fetch_add(1, Ordering::SeqCst);
        Ok(ChangeToken(self.state.lock().unwrap().token))
    }

    fn read_text(&self) -> Result<Option<String>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .items
            .iter()
            .find_map(|item| item.get(TEXT_TYPE))
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.set_items(vec![ClipboardItem::new().with_payload(TEXT_TYPE, text)]);
        Ok(())
    }

    fn snapshot(&self) -> Result<ClipboardSnapshot> {
        Ok(ClipboardSnapshot {
            items: self.state.lock().unwrap().items.clone(),
        })
    }

    fn restore(&self, snapshot: &ClipboardSnapshot) -> Result<()> {
        self.restores.fetch_add(1, Ordering::SeqCst);
        self.set_items(snapshot.items.clone());
        Ok(())
    }
}

// --- Accessibility ---

/// A node of a fake menu tree.
#[derive(Debug, Clone)]
pub struct MenuNode {
    pub info: MenuItemInfo,
    pub children: Vec<MenuNode>,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl MenuNode {
    /// A leaf item; empty strings mean "attribute missing".
    pub fn item(identifier: &str, title: &str, shortcut: &str, enabled: bool) -> Self {
        Self {
            info: MenuItemInfo {
                identifier: non_empty(identifier),
                title: non_empty(title),
                shortcut_char: non_empty(shortcut),
                enabled,
            },
            children: Vec::new(),
        }
    }

    pub fn menu(title: &str, children: Vec<MenuNode>) -> Self {
        Self {
            info: MenuItemInfo {
                identifier: None,
                title: non_empty(title),
                shortcut_char: None,
                enabled: true,
            },
            children,
        }
    }
}

struct ArenaNode {
    info: MenuItemInfo,
    children: Vec<usize>,
    top_level: bool,
}

const FOCUSED: usize = usize::MAX;

/// Accessibility tree backed by an arena of menu nodes; elements are arena indices.
pub struct FakeAccessibility {
    trusted: bool,
    frontmost: Option<AppInfo>,
    focused: Option<Option<String>>,
    bounds: Option<SelectionBounds>,
    nodes: Vec<ArenaNode>,
    copy_into: Option<(Arc<FakeClipboard>, String)>,
    visited: Mutex<Vec<String>>,
    pressed: Mutex<Vec<String>>,
    selection_reads: AtomicUsize,
}

impl FakeAccessibility {
    /// Trusted, with a frontmost app, no focused element and no menu bar.
    pub fn new() -> Self {
        Self {
            trusted: true,
            frontmost: Some(AppInfo {
                name: "TextEdit".into(),
                bundle_id: Some("com.apple.TextEdit".into()),
                pid: Some(501),
            }),
            focused: None,
            bounds: None,
            nodes: Vec::new(),
            copy_into: None,
            visited: Mutex::new(Vec::new()),
            pressed: Mutex::new(Vec::new()),
            selection_reads: AtomicUsize::new(0),
        }
    }

    pub fn untrusted(mut self) -> Self {
        self.trusted = false;
        self
    }

    pub fn without_frontmost_app(mut self) -> Self {
        self.frontmost = None;
        self
    }

    pub fn with_frontmost_app(mut self, name: &str, bundle_id: &str) -> Self {
        self.frontmost = Some(AppInfo {
            name: name.into(),
            bundle_id: non_empty(bundle_id),
            pid: Some(502),
        });
        self
    }

    /// A focused element exists; `selection` is its selected-text attribute.
    pub fn with_focused_selection(mut self, selection: Option<&str>) -> Self {
        self.focused = Some(selection.map(str::to_string));
        self
    }

    pub fn with_selection_bounds(mut self, bounds: SelectionBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Installs `root` as the menu bar; its direct children are the top-level menus.
    pub fn with_menu_bar(mut self, root: MenuNode) -> Self {
        self.nodes.clear();
        let root_index = self.push_node(root);
        let top: Vec<usize> = self.nodes[root_index].children.clone();
        for index in top {
            self.nodes[index].top_level = true;
        }
        self
    }

    /// Pressing a copy item writes `text` to `clipboard`.
    pub fn copies_into(mut self, clipboard: Arc<FakeClipboard>, text: &str) -> Self {
        self.copy_into = Some((clipboard, text.to_string()));
        self
    }

    fn push_node(&mut self, node: MenuNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(ArenaNode {
            info: node.info,
            children: Vec::new(),
            top_level: false,
        });
        let children: Vec<usize> = node
            .children
            .into_iter()
            .map(|child| self.push_node(child))
            .collect();
        self.nodes[index].children = children;
        index
    }

    /// Titles of top-level menus whose attributes were read, in order.
    pub fn visited_top_level(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    /// Titles of pressed menu items, in order.
    pub fn pressed(&self) -> Vec<String> {
        self.pressed.lock().unwrap().clone()
    }

    pub fn selection_reads(&self) -> usize {
        self.selection_reads.load(Ordering::SeqCst)
    }

    fn node(&self, element: &usize) -> Result<&ArenaNode> {
        self.nodes
            .get(*element)
            .ok_or_else(|| SelectionError::system("fake element", "stale element"))
    }
}

impl Default for FakeAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessibilityClient for FakeAccessibility {
    type Element = usize;

    fn is_trusted(&self, _prompt: bool) -> bool {
        self.trusted
    }

    fn focused_element(&self) -> Result<Option<usize>> {
        Ok(self.focused.as_ref().map(|_| FOCUSED))
    }

    fn selected_text(&self, element: &usize) -> Result<Option<String>> {
        self.selection_reads.fetch_add(1, Ordering::SeqCst);
        if *element != FOCUSED {
            return Ok(None);
        }
        Ok(self.focused.clone().flatten())
    }

    fn selection_bounds(&self, element: &usize) -> Result<Option<SelectionBounds>> {
        Ok(if *element == FOCUSED { self.bounds } else { None })
    }

    fn frontmost_app(&self) -> Result<Option<AppInfo>> {
        Ok(self.frontmost.clone())
    }

    fn menu_bar(&self) -> Result<Option<usize>> {
        Ok((!self.nodes.is_empty()).then_some(0))
    }

    fn children(&self, element: &usize) -> Result<Vec<usize>> {
        Ok(self.node(element)?.children.clone())
    }

    fn menu_item_info(&self, element: &usize) -> Result<MenuItemInfo> {
        let node = self.node(element)?;
        if node.top_level {
            self.visited
                .lock()
                .unwrap()
                .push(node.info.title.clone().unwrap_or_default());
        }
        Ok(node.info.clone())
    }

    fn press(&self, element: &usize) -> Result<()> {
        let node = self.node(element)?;
        self.pressed
            .lock()
            .unwrap()
            .push(node.info.title.clone().unwrap_or_default());
        if MenuAction::Copy.matches(&node.info) && node.info.enabled {
            if let Some((clipboard, text)) = &self.copy_into {
                clipboard.write_text(text)?;
            }
        }
        Ok(())
    }
}

// --- Keyboard ---

/// Records shortcuts; copy writes a configured selection, paste records what it would paste.
pub struct FakeKeyboard {
    clipboard: Arc<FakeClipboard>,
    selection: Option<String>,
    failure: Option<fn() -> SelectionError>,
    sent: Mutex<Vec<Shortcut>>,
    pasted: Mutex<Vec<Option<String>>>,
}

impl FakeKeyboard {
    pub fn new(clipboard: Arc<FakeClipboard>) -> Self {
        Self {
            clipboard,
            selection: None,
            failure: None,
            sent: Mutex::new(Vec::new()),
            pasted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_selection(mut self, text: &str) -> Self {
        self.selection = Some(text.to_string());
        self
    }

    pub fn failing(mut self, error: fn() -> SelectionError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn sent(&self) -> Vec<Shortcut> {
        self.sent.lock().unwrap().clone()
    }

    pub fn pasted(&self) -> Vec<Option<String>> {
        self.pasted.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyboardInjector for FakeKeyboard {
    async fn send(&self, shortcut: Shortcut) -> Result<()> {
        self.sent.lock().unwrap().push(shortcut);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        match shortcut {
            Shortcut::Copy => {
                if let Some(text) = &self.selection {
                    self.clipboard.write_text(text)?;
                }
            }
            Shortcut::Paste => {
                let text = self.clipboard.read_text()?;
                self.pasted.lock().unwrap().push(text);
            }
        }
        Ok(())
    }
}

// --- Commands ---

/// One recorded `CommandRunner::run` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCall {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

/// Replays queued results (default `Ok("")`) and records every call.
#[derive(Default)]
pub struct FakeRunner {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<RunCall>>,
    copy_into: Option<(Arc<FakeClipboard>, String)>,
    delay: Option<Duration>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, result: Result<String>) -> Self {
        self.responses.lock().unwrap().push_back(result);
        self
    }

    /// Every successful run writes `text` to `clipboard`, like a copying script would.
    pub fn copies_into(mut self, clipboard: Arc<FakeClipboard>, text: &str) -> Self {
        self.copy_into = Some((clipboard, text.to_string()));
        self
    }

    /// Each run sleeps first, then honours `timeout` like a real runner.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RunCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> Result<String> {
        self.calls.lock().unwrap().push(RunCall {
            program: program.to_string(),
            args: args.to_vec(),
            timeout,
        });
        if let Some(delay) = self.delay {
            if delay > timeout {
                tokio::time::sleep(timeout).await;
                return Err(SelectionError::timeout(program, timeout));
            }
            tokio::time::sleep(delay).await;
        }
        let result = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()));
        if result.is_ok() {
            if let Some((clipboard, text)) = &self.copy_into {
                clipboard.write_text(text)?;
            }
        }
        result
    }
}

//! Acquisition strategies and their per-attempt results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// One self-contained way of obtaining the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Read the focused element's selected text through accessibility. No side effects.
    DirectRead,
    /// Press the application's own Copy menu item and read the clipboard.
    MenuActionCopy,
    /// Send the global copy shortcut and read the clipboard.
    ShortcutCopy,
    /// Run a per-application automation script and read the clipboard.
    ScriptCopy,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [
        Strategy::DirectRead,
        Strategy::MenuActionCopy,
        Strategy::ShortcutCopy,
        Strategy::ScriptCopy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectRead => "direct-read",
            Self::MenuActionCopy => "menu-action-copy",
            Self::ShortcutCopy => "shortcut-copy",
            Self::ScriptCopy => "script-copy",
        }
    }

    /// Whether the strategy borrows the clipboard.
    pub fn touches_clipboard(&self) -> bool {
        !matches!(self, Self::DirectRead)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "direct-read" | "ax" | "direct" => Ok(Self::DirectRead),
            "menu-action-copy" | "menu" => Ok(Self::MenuActionCopy),
            "shortcut-copy" | "shortcut" => Ok(Self::ShortcutCopy),
            "script-copy" | "script" => Ok(Self::ScriptCopy),
            other => {
                let known: Vec<&str> = Self::ALL.iter().map(Strategy::as_str).collect();
                Err(format!(
                    "Unknown strategy: {other} (expected one of {})",
                    known.join(", ")
                ))
            }
        }
    }
}

/// Ordered, deduplicated sequence of strategies. Order is fallback priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Strategy>", into = "Vec<Strategy>")]
pub struct StrategySet {
    strategies: Vec<Strategy>,
}

impl StrategySet {
    pub fn new(strategies: impl IntoIterator<Item = Strategy>) -> Self {
        let mut set = Self {
            strategies: Vec::new(),
        };
        for strategy in strategies {
            set.push(strategy);
        }
        set
    }

    /// Appends `strategy` unless it is already present.
    pub fn push(&mut self, strategy: Strategy) {
        if !self.contains(strategy) {
            self.strategies.push(strategy);
        }
    }

    pub fn contains(&self, strategy: Strategy) -> bool {
        self.strategies.contains(&strategy)
    }

    pub fn position(&self, strategy: Strategy) -> Option<usize> {
        self.strategies.iter().position(|s| *s == strategy)
    }

    pub fn get(&self, index: usize) -> Option<Strategy> {
        self.strategies.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Strategy> + '_ {
        self.strategies.iter().copied()
    }

    /// Parses names such as `"direct-read"`; duplicates are dropped.
    pub fn parse<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, String> {
        names
            .into_iter()
            .map(Strategy::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::new([
            Strategy::DirectRead,
            Strategy::MenuActionCopy,
            Strategy::ShortcutCopy,
        ])
    }
}

impl From<Vec<Strategy>> for StrategySet {
    fn from(strategies: Vec<Strategy>) -> Self {
        Self::new(strategies)
    }
}

impl From<StrategySet> for Vec<Strategy> {
    fn from(set: StrategySet) -> Self {
        set.strategies
    }
}

impl fmt::Display for StrategySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(Strategy::as_str).collect();
        f.write_str(&names.join(" -> "))
    }
}

/// Outcome of one strategy attempt.
#[derive(Debug)]
pub enum AcquisitionResult {
    /// Non-empty selected text.
    Text(String),
    Empty,
    Failed(SelectionError),
}

impl AcquisitionResult {
    /// Builds `Text` for non-empty input and `Empty` otherwise. The text is kept verbatim,
    /// whitespace included.
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            Some(text) if !text.is_empty() => Self::Text(text),
            _ => Self::Empty,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order() {
        let set = StrategySet::default();
        let order: Vec<Strategy> = set.iter().collect();
        assert_eq!(
            order,
            vec![
                Strategy::DirectRead,
                Strategy::MenuActionCopy,
                Strategy::ShortcutCopy
            ]
        );
        assert!(!set.contains(Strategy::ScriptCopy));
    }

    #[test]
    fn test_set_dedups_preserving_first_position() {
        let set = StrategySet::new([
            Strategy::ShortcutCopy,
            Strategy::DirectRead,
            Strategy::ShortcutCopy,
            Strategy::DirectRead,
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some(Strategy::ShortcutCopy));
        assert_eq!(set.position(Strategy::DirectRead), Some(1));
    }

    #[test]
    fn test_parse_names_and_aliases() {
        let set = StrategySet::parse(["direct_read", "MENU", "script-copy"]).unwrap();
        assert_eq!(set.to_string(), "direct-read -> menu-action-copy -> script-copy");
        let err = StrategySet::parse(["telepathy"]).unwrap_err();
        assert!(err.contains("telepathy"));
        assert!(err.contains("script-copy"));
    }

    #[test]
    fn test_serde_uses_kebab_case_list() {
        let json = serde_json::to_string(&StrategySet::default()).unwrap();
        assert_eq!(json, r#"["direct-read","menu-action-copy","shortcut-copy"]"#);
        let parsed: StrategySet =
            serde_json::from_str(r#"["shortcut-copy","shortcut-copy"]"#).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_only_empty_text_is_empty() {
        assert!(matches!(
            AcquisitionResult::from_text(Some(String::new())),
            AcquisitionResult::Empty
        ));
        match AcquisitionResult::from_text(Some("  \n".into())) {
            AcquisitionResult::Text(text) => assert_eq!(text, "  \n"),
            other => panic!("unexpected {}", other.label()),
        }
        assert!(matches!(
            AcquisitionResult::from_text(None),
            AcquisitionResult::Empty
        ));
        match AcquisitionResult::from_text(Some(" hi ".into())) {
            AcquisitionResult::Text(text) => assert_eq!(text, " hi "),
            other => panic!("unexpected {}", other.label()),
        }
    }
}

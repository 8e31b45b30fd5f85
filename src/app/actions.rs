use crate::error::TreeError;
use crate::protocol::DocumentLocator;
use std::fmt;
use std::str::FromStr;

/// Action triggered from inside a tree panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeAction {
    ToggleNode,
    ForceChildrenReload,
    ParentNode,
    FirstSibling,
    LastSibling,
    PrevSibling,
    NextSibling,
    ExecuteCommand,
    ExecuteCommandAndOpenSplit,
    ExecuteCommandAndOpenVSplit,
    ExecuteCommandAndOpenTab,
}

impl TreeAction {
    pub const ALL: [TreeAction; 11] = [
        TreeAction::ToggleNode,
        TreeAction::ForceChildrenReload,
        TreeAction::ParentNode,
        TreeAction::FirstSibling,
        TreeAction::LastSibling,
        TreeAction::PrevSibling,
        TreeAction::NextSibling,
        TreeAction::ExecuteCommand,
        TreeAction::ExecuteCommandAndOpenSplit,
        TreeAction::ExecuteCommandAndOpenVSplit,
        TreeAction::ExecuteCommandAndOpenTab,
    ];

    /// Name used in key bindings and command arguments
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToggleNode => "ToggleNode",
            Self::ForceChildrenReload => "ForceChildrenReload",
            Self::ParentNode => "ParentNode",
            Self::FirstSibling => "FirstSibling",
            Self::LastSibling => "LastSibling",
            Self::PrevSibling => "PrevSibling",
            Self::NextSibling => "NextSibling",
            Self::ExecuteCommand => "ExecuteCommand",
            Self::ExecuteCommandAndOpenSplit => "ExecuteCommandAndOpenSplit",
            Self::ExecuteCommandAndOpenVSplit => "ExecuteCommandAndOpenVSplit",
            Self::ExecuteCommandAndOpenTab => "ExecuteCommandAndOpenTab",
        }
    }

    /// Human-readable description shown in the action picker
    pub fn title(self) -> &'static str {
        match self {
            Self::ToggleNode => "Expand/Collapse tree node",
            Self::ForceChildrenReload => "Force the reloading of the children of this node.",
            Self::ParentNode => "Go to parent node",
            Self::FirstSibling => "Go to first child",
            Self::LastSibling => "Go to last child",
            Self::PrevSibling => "Go to prev sibling",
            Self::NextSibling => "Go to next sibling",
            Self::ExecuteCommand => "Execute command for node",
            Self::ExecuteCommandAndOpenSplit => {
                "Execute command and open node under cursor in horizontal split"
            }
            Self::ExecuteCommandAndOpenVSplit => {
                "Execute command and open node under cursor in vertical split"
            }
            Self::ExecuteCommandAndOpenTab => "Execute command and open node under cursor in tab",
        }
    }

    /// Placement directive recorded by command-executing actions
    pub fn window_prop(self) -> Option<WindowProp> {
        match self {
            Self::ExecuteCommand => Some(WindowProp::Default),
            Self::ExecuteCommandAndOpenSplit => Some(WindowProp::HSplit),
            Self::ExecuteCommandAndOpenVSplit => Some(WindowProp::VSplit),
            Self::ExecuteCommandAndOpenTab => Some(WindowProp::Tab),
            _ => None,
        }
    }
}

impl fmt::Display for TreeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeAction {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TreeAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s.trim())
            .ok_or_else(|| TreeError::InvalidCommand(s.to_string()))
    }
}

/// Where a "jump to location" opens its target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowProp {
    /// First non-tree window of the current tab
    #[default]
    Default,
    HSplit,
    VSplit,
    Tab,
}

/// Top-level commands routed by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum TreeViewCommand {
    /// Close every open panel, or open the configured layout
    ToggleAll,
    /// Open or close a single panel
    Toggle(String),
    /// Apply an action to the tree shown in the current window
    View(TreeAction),
    /// Ask the user which action to apply
    Pick,
    /// The host stopped showing the named tree
    Hidden(String),
    /// Reveal a document position in the named tree
    Reveal {
        view: String,
        locator: DocumentLocator,
    },
}

impl TreeViewCommand {
    /// Parse a view sub-command (`ToggleNode`, `Hidden <view>`, ...); unknown
    /// names fall back to the picker
    pub fn parse_view_command(action: &str, view_id: Option<&str>) -> Self {
        match (action.trim(), view_id) {
            ("Hidden", Some(view)) => TreeViewCommand::Hidden(view.to_string()),
            (name, _) => name
                .parse::<TreeAction>()
                .map(TreeViewCommand::View)
                .unwrap_or(TreeViewCommand::Pick),
        }
    }
}

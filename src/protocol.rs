//! Wire-level types exchanged with the tree view collaborator.
//!
//! These mirror the JSON shapes of the tree view protocol extension, so they
//! serialize in camelCase and skip absent optional fields.

use serde::{Deserialize, Serialize};

/// Collapse state advertised by the data source for a node with children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseState {
    Collapsed,
    Expanded,
}

/// A command attached to a node, executed when the user activates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCommand {
    /// Title shown to the user, if any
    #[serde(default)]
    pub title: String,
    /// Command identifier
    pub command: String,
    /// Arguments forwarded verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<serde_json::Value>,
}

/// One node as delivered by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewNode {
    /// The tree this node belongs to
    pub view_id: String,
    /// Identifier of the node; absent only for the root of a tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_uri: Option<String>,
    /// Text displayed for the node
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<NodeCommand>,
    /// Icon name, also used to pick the row highlight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// `None` means the node has no children
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapse_state: Option<CollapseState>,
}

impl TreeViewNode {
    /// Create a leaf node
    pub fn leaf(view_id: impl Into<String>, node_uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            view_id: view_id.into(),
            node_uri: Some(node_uri.into()),
            label: label.into(),
            command: None,
            icon: None,
            tooltip: None,
            collapse_state: None,
        }
    }

    /// Create a node that has children, initially collapsed
    pub fn branch(
        view_id: impl Into<String>,
        node_uri: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            collapse_state: Some(CollapseState::Collapsed),
            ..Self::leaf(view_id, node_uri, label)
        }
    }

    /// The synthetic root of a tree: no identifier, labelled with the tree id
    pub fn root(view_id: impl Into<String>) -> Self {
        let view_id = view_id.into();
        Self {
            label: view_id.clone(),
            view_id,
            node_uri: None,
            command: None,
            icon: None,
            tooltip: None,
            collapse_state: Some(CollapseState::Expanded),
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_command(mut self, command: NodeCommand) -> Self {
        self.command = Some(command);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A text document position for which the data source resolves a reveal path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLocator {
    pub uri: String,
    pub line: u32,
    pub character: u32,
}

/// Result of a reveal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeRevealResult {
    pub view_id: String,
    /// Node to reveal at index 0, then its parent, up to the outermost ancestor
    pub uri_chain: Vec<String>,
}

/// Change notification pushed by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeViewDidChangeParams {
    pub nodes: Vec<TreeViewNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewChildrenParams {
    pub view_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewVisibilityDidChangeParams {
    pub view_id: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewNodeCollapseDidChangeParams {
    pub view_id: String,
    pub node_uri: String,
    pub collapsed: bool,
}

//! Data source capability consumed by the tree engine.
//!
//! The engine only needs children listings, reveal paths and two
//! fire-and-forget notifications. A language client implements
//! [`TreeViewProvider`] over the wire; [`StaticTreeProvider`] serves trees
//! held in memory (fixtures, the dump tool, tests).

use crate::error::{Result, TreeError};
use crate::protocol::{
    DocumentLocator, TreeRevealResult, TreeViewChildrenParams, TreeViewNode,
    TreeViewNodeCollapseDidChangeParams, TreeViewVisibilityDidChangeParams,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// Key used for the children of a tree's root
pub const ROOT_KEY: &str = "";

#[async_trait(?Send)]
pub trait TreeViewProvider {
    /// Immediate children of `parent` (`None` for the root of the tree).
    ///
    /// Must be safe to call repeatedly.
    async fn load_children(&self, view_id: &str, parent: Option<&str>) -> Result<Vec<TreeViewNode>>;

    /// Chain of ids from the node holding `locator` up to the outermost ancestor
    async fn load_reveal_path(&self, view_id: &str, locator: &DocumentLocator) -> Result<TreeRevealResult>;

    /// Whether any window currently shows the tree
    fn notify_visibility(&self, view_id: &str, visible: bool);

    /// A node was expanded (`collapsed == false`) or collapsed
    fn notify_collapse(&self, view_id: &str, node_id: &str, collapsed: bool);
}

/// Notification sent from the engine back to the data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderNotification {
    Visibility { view_id: String, visible: bool },
    Collapse { view_id: String, node_id: String, collapsed: bool },
}

impl ProviderNotification {
    /// Protocol method carrying this notification
    pub fn method(&self) -> &'static str {
        match self {
            Self::Visibility { .. } => "metals/treeViewVisibilityDidChange",
            Self::Collapse { .. } => "metals/treeViewNodeCollapseDidChange",
        }
    }

    /// Wire payload of this notification
    pub fn params(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Visibility { view_id, visible } => {
                serde_json::to_value(TreeViewVisibilityDidChangeParams {
                    view_id: view_id.clone(),
                    visible: *visible,
                })
            }
            Self::Collapse {
                view_id,
                node_id,
                collapsed,
            } => serde_json::to_value(TreeViewNodeCollapseDidChangeParams {
                view_id: view_id.clone(),
                node_uri: node_id.clone(),
                collapsed: *collapsed,
            }),
        }
    }
}

/// Fixture format: tree id -> parent id (`""` for the root) -> children
pub type TreeFixture = HashMap<String, HashMap<String, Vec<TreeViewNode>>>;

/// In-memory data source.
///
/// Records every children request and notification so callers can check how
/// much traffic the engine generated.
#[derive(Default)]
pub struct StaticTreeProvider {
    trees: RefCell<TreeFixture>,
    reveal_paths: RefCell<HashMap<String, Vec<String>>>,
    failing: RefCell<HashSet<(String, String)>>,
    requests: RefCell<Vec<TreeViewChildrenParams>>,
    notifications: RefCell<Vec<ProviderNotification>>,
    fetch_count: Cell<usize>,
}

impl fmt::Debug for StaticTreeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTreeProvider")
            .field("trees", &self.trees.borrow().len())
            .field("fetch_count", &self.fetch_count.get())
            .finish()
    }
}

#[derive(Deserialize)]
struct FixtureFile {
    trees: TreeFixture,
    #[serde(default)]
    reveal: HashMap<String, Vec<String>>,
}

impl StaticTreeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a fixture of the form `{ "trees": {..}, "reveal": { uri: [chain] } }`
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let file: FixtureFile = serde_json::from_str(json)?;
        let provider = Self::new();
        *provider.trees.borrow_mut() = file.trees;
        *provider.reveal_paths.borrow_mut() = file.reveal;
        Ok(provider)
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Ids of all trees in the fixture, sorted
    pub fn view_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.trees.borrow().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Replace the children of `parent` (`None` for the root)
    pub fn set_children(&self, view_id: &str, parent: Option<&str>, children: Vec<TreeViewNode>) {
        self.trees
            .borrow_mut()
            .entry(view_id.to_string())
            .or_default()
            .insert(parent.unwrap_or(ROOT_KEY).to_string(), children);
    }

    /// Register the reveal chain (leaf first) for a document uri
    pub fn set_reveal_path(&self, uri: &str, chain: Vec<String>) {
        self.reveal_paths.borrow_mut().insert(uri.to_string(), chain);
    }

    /// Make requests for the children of `parent` fail until cleared
    pub fn set_failing(&self, view_id: &str, parent: Option<&str>, failing: bool) {
        let key = (view_id.to_string(), parent.unwrap_or(ROOT_KEY).to_string());
        if failing {
            self.failing.borrow_mut().insert(key);
        } else {
            self.failing.borrow_mut().remove(&key);
        }
    }

    /// Number of children requests served (including failed ones)
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.get()
    }

    /// Every children request in order
    pub fn requests(&self) -> Vec<TreeViewChildrenParams> {
        self.requests.borrow().clone()
    }

    pub fn notifications(&self) -> Vec<ProviderNotification> {
        self.notifications.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.requests.borrow_mut().clear();
        self.notifications.borrow_mut().clear();
        self.fetch_count.set(0);
    }
}

#[async_trait(?Send)]
impl TreeViewProvider for StaticTreeProvider {
    async fn load_children(&self, view_id: &str, parent: Option<&str>) -> Result<Vec<TreeViewNode>> {
        self.fetch_count.set(self.fetch_count.get() + 1);
        self.requests.borrow_mut().push(TreeViewChildrenParams {
            view_id: view_id.to_string(),
            node_uri: parent.map(str::to_string),
        });

        let key = parent.unwrap_or(ROOT_KEY);
        if self
            .failing
            .borrow()
            .contains(&(view_id.to_string(), key.to_string()))
        {
            return Err(TreeError::fetch(parent, "request rejected"));
        }

        Ok(self
            .trees
            .borrow()
            .get(view_id)
            .and_then(|tree| tree.get(key))
            .cloned()
            .unwrap_or_default())
    }

    async fn load_reveal_path(&self, view_id: &str, locator: &DocumentLocator) -> Result<TreeRevealResult> {
        let chain = self
            .reveal_paths
            .borrow()
            .get(&locator.uri)
            .cloned()
            .ok_or_else(|| TreeError::Reveal(format!("{} is not part of {}", locator.uri, view_id)))?;
        Ok(TreeRevealResult {
            view_id: view_id.to_string(),
            uri_chain: chain,
        })
    }

    fn notify_visibility(&self, view_id: &str, visible: bool) {
        self.notifications
            .borrow_mut()
            .push(ProviderNotification::Visibility {
                view_id: view_id.to_string(),
                visible,
            });
    }

    fn notify_collapse(&self, view_id: &str, node_id: &str, collapsed: bool) {
        self.notifications
            .borrow_mut()
            .push(ProviderNotification::Collapse {
                view_id: view_id.to_string(),
                node_id: node_id.to_string(),
                collapsed,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_serves_children() {
        let provider = StaticTreeProvider::new();
        provider.set_children("v", None, vec![TreeViewNode::branch("v", "a", "A")]);
        provider.set_children("v", Some("a"), vec![TreeViewNode::leaf("v", "a1", "A1")]);

        let roots = provider.load_children("v", None).await.unwrap();
        assert_eq!(roots.len(), 1);
        let children = provider.load_children("v", Some("a")).await.unwrap();
        assert_eq!(children[0].label, "A1");
        assert!(provider.load_children("v", Some("missing")).await.unwrap().is_empty());

        assert_eq!(provider.fetch_count(), 3);
        assert_eq!(provider.requests()[1].node_uri.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_static_provider_failures() {
        let provider = StaticTreeProvider::new();
        provider.set_failing("v", Some("a"), true);
        assert!(provider.load_children("v", Some("a")).await.is_err());

        provider.set_failing("v", Some("a"), false);
        assert!(provider.load_children("v", Some("a")).await.is_ok());
    }

    #[test]
    fn test_fixture_from_json() {
        let json = r#"{
            "trees": {
                "metalsBuild": {
                    "": [{ "viewId": "metalsBuild", "nodeUri": "cmd", "label": "Import build" }]
                }
            },
            "reveal": { "file:///A.scala": ["cls", "pkg"] }
        }"#;
        let provider = StaticTreeProvider::from_json(json).unwrap();
        assert_eq!(provider.view_ids(), vec!["metalsBuild".to_string()]);
    }

    #[tokio::test]
    async fn test_reveal_path_lookup() {
        let provider = StaticTreeProvider::new();
        provider.set_reveal_path("file:///A.scala", vec!["cls".into(), "pkg".into()]);
        let locator = DocumentLocator {
            uri: "file:///A.scala".into(),
            line: 3,
            character: 0,
        };
        let result = provider.load_reveal_path("v", &locator).await.unwrap();
        assert_eq!(result.uri_chain, vec!["cls", "pkg"]);

        let missing = DocumentLocator {
            uri: "file:///B.scala".into(),
            ..locator
        };
        assert!(provider.load_reveal_path("v", &missing).await.is_err());
    }

    #[test]
    fn test_notification_wire_shape() {
        let collapse = ProviderNotification::Collapse {
            view_id: "metalsPackages".into(),
            node_id: "projects:a".into(),
            collapsed: true,
        };
        assert_eq!(collapse.method(), "metals/treeViewNodeCollapseDidChange");
        assert_eq!(
            collapse.params().unwrap(),
            serde_json::json!({
                "viewId": "metalsPackages",
                "nodeUri": "projects:a",
                "collapsed": true
            })
        );
    }
}

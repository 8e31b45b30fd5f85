use super::node::{Node, NodeView, TreeContext};
use crate::error::Result;
use crate::protocol::{DocumentLocator, TreeViewNode};
use crate::services::provider::TreeViewProvider;
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::debug;

/// A change to the visible rows of a tree.
///
/// The rows of `old_nodes`, starting at the row of `root`, are replaced by
/// `new_nodes`. Focus events carry no rows and only move cursors to `root`.
///
/// `offset` is the position of `root` in the visible order at emission time,
/// filled in by the tree; `None` if `root` was not visible. Updates must be
/// applied in emission order for it to hold.
#[derive(Debug, Clone)]
pub struct TreeModelUpdate {
    pub root: NodeView,
    pub offset: Option<usize>,
    pub old_nodes: Vec<NodeView>,
    pub new_nodes: Vec<NodeView>,
    pub focus_event: bool,
}

/// Strip the rows shared at the start and end of an update.
///
/// Returns `None` when nothing changed. When only removals remain there is
/// no row left to anchor the trimmed event, so the untrimmed update is
/// returned instead.
pub fn optimize_update(update: TreeModelUpdate) -> Option<TreeModelUpdate> {
    let old = &update.old_nodes;
    let new = &update.new_nodes;

    let mut start = 0;
    while start < old.len() && start < new.len() && old[start].same_row(&new[start]) {
        start += 1;
    }
    let mut end = 0;
    while start + end < old.len()
        && start + end < new.len()
        && old[old.len() - end - 1].same_row(&new[new.len() - end - 1])
    {
        end += 1;
    }

    let old_nodes = old[start..old.len() - end].to_vec();
    let new_nodes = new[start..new.len() - end].to_vec();
    if old_nodes.is_empty() && new_nodes.is_empty() {
        None
    } else if let Some(first) = new_nodes.first() {
        Some(TreeModelUpdate {
            root: first.clone(),
            offset: None,
            old_nodes,
            new_nodes,
            focus_event: false,
        })
    } else {
        Some(update)
    }
}

/// State of one tree: its synthetic root, visibility and update stream.
pub struct TreeModel {
    ctx: Rc<TreeContext>,
    root: Node,
    visible: Cell<bool>,
}

impl TreeModel {
    pub fn new(view_id: impl Into<String>, provider: Rc<dyn TreeViewProvider>, auto_expand: bool) -> Self {
        let view_id = view_id.into();
        let ctx = Rc::new(TreeContext::new(view_id.clone(), provider, auto_expand));
        let root = Node::new(TreeViewNode::root(view_id), 0, ctx.clone());
        ctx.attach_root(&root);
        Self {
            ctx,
            root,
            visible: Cell::new(false),
        }
    }

    pub fn view_id(&self) -> &str {
        &self.ctx.view_id
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Receive every update emitted from now on
    pub fn subscribe(&self) -> UnboundedReceiver<TreeModelUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.ctx.subscribe(tx);
        rx
    }

    pub fn is_visible(&self) -> bool {
        self.visible.get()
    }

    /// Mark the tree as displayed; notifies the provider on change only
    pub fn show(&self) {
        if !self.visible.replace(true) {
            self.ctx.provider.notify_visibility(&self.ctx.view_id, true);
        }
    }

    pub fn hide(&self) {
        if self.visible.replace(false) {
            self.ctx.provider.notify_visibility(&self.ctx.view_id, false);
        }
    }

    /// Node at a row offset of the visible order (the root is offset 0)
    pub async fn find_node_with_offset(&self, offset: usize) -> Result<Option<Node>> {
        let mut node = self.root.clone();
        let mut offset = offset;
        loop {
            if offset == 0 {
                return Ok(Some(node));
            }
            if !node.is_expanded() {
                return Ok(None);
            }
            offset -= 1;

            let mut next = None;
            for child in node.children().await? {
                let height = child.height().await?;
                if offset < height {
                    next = Some(child);
                    break;
                }
                offset -= height;
            }
            match next {
                Some(child) => node = child,
                None => return Ok(None),
            }
        }
    }

    /// Offset of the visible node with the same id as `view`
    pub async fn find_node_offset(&self, view: &NodeView) -> Result<Option<usize>> {
        let target = view.id();
        let mut offset = 0;
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if node.id().as_deref() == target {
                return Ok(Some(offset));
            }
            offset += 1;
            if node.is_expanded() {
                stack.extend(node.children().await?.into_iter().rev());
            }
        }
        Ok(None)
    }

    /// Visible parent of `node`, `None` for the root or unreachable nodes
    pub async fn find_parent_node(&self, node: &Node) -> Result<Option<Node>> {
        let Some(target) = node.id() else {
            return Ok(None);
        };
        let mut stack = vec![self.root.clone()];
        while let Some(parent) = stack.pop() {
            if !parent.is_expanded() {
                continue;
            }
            let children = parent.children().await?;
            if children.iter().any(|c| c.id().as_deref() == Some(target.as_str())) {
                return Ok(Some(parent));
            }
            stack.extend(children.into_iter().rev());
        }
        Ok(None)
    }

    /// Visible node with the given id
    pub async fn find_node_by_id(&self, id: &str) -> Result<Option<Node>> {
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if node.id().as_deref() == Some(id) {
                return Ok(Some(node));
            }
            if node.is_expanded() {
                stack.extend(node.children().await?.into_iter().rev());
            }
        }
        Ok(None)
    }

    /// Expand every ancestor along `chain` (outermost first) and return the
    /// node the chain ends at. `None` if a step cannot be followed.
    pub async fn reveal_by_parents(&self, chain: &[String]) -> Result<Option<Node>> {
        let mut node = self.root.clone();
        for id in chain {
            if !node.is_expanded() && !node.expand().await? {
                debug!(view = %self.ctx.view_id, node = ?node.id(), "Reveal stopped at unexpandable node");
                return Ok(None);
            }
            let children = node.children().await?;
            match children.into_iter().find(|c| c.id().as_deref() == Some(id.as_str())) {
                Some(child) => node = child,
                None => {
                    debug!(view = %self.ctx.view_id, missing = %id, "Reveal path not found");
                    return Ok(None);
                }
            }
        }
        Ok(Some(node))
    }

    /// Reveal the node holding a document position and move focus to it
    pub async fn reveal_document(&self, locator: &DocumentLocator) -> Result<Option<Node>> {
        let reveal = self
            .ctx
            .provider
            .load_reveal_path(&self.ctx.view_id, locator)
            .await?;
        let mut chain = reveal.uri_chain;
        chain.reverse();

        let result = self.reveal_by_parents(&chain).await?;
        if let Some(node) = &result {
            self.ctx.emit(TreeModelUpdate {
                root: node.make_view(),
                offset: None,
                old_nodes: Vec::new(),
                new_nodes: Vec::new(),
                focus_event: true,
            });
        }
        Ok(result)
    }

    /// Apply a change notification: a node with an id refreshes that node's
    /// subtree if it is reachable, a node without one refreshes the whole tree
    pub async fn handle_change(&self, data: TreeViewNode) -> Result<bool> {
        match data.node_uri.clone() {
            Some(id) => match self.find_node_by_id(&id).await? {
                Some(node) => node.refresh_subtree(Some(data)).await,
                None => {
                    debug!(view = %self.ctx.view_id, node = %id, "Change for unreachable node ignored");
                    Ok(false)
                }
            },
            None => self.root.refresh_subtree(None).await,
        }
    }
}

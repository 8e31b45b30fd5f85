use super::model::{optimize_update, TreeModelUpdate};
use crate::error::Result;
use crate::protocol::TreeViewNode;
use crate::services::provider::TreeViewProvider;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::OnceCell;
use tracing::debug;

/// State shared by every node of one tree
pub(crate) struct TreeContext {
    pub(crate) view_id: String,
    pub(crate) provider: Rc<dyn TreeViewProvider>,
    pub(crate) auto_expand: bool,
    clock: Cell<u64>,
    root: RefCell<Weak<NodeInner>>,
    subscribers: RefCell<Vec<UnboundedSender<TreeModelUpdate>>>,
}

impl TreeContext {
    pub(crate) fn new(view_id: String, provider: Rc<dyn TreeViewProvider>, auto_expand: bool) -> Self {
        Self {
            view_id,
            provider,
            auto_expand,
            clock: Cell::new(0),
            root: RefCell::new(Weak::new()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Next staleness token; strictly increasing
    fn next_token(&self) -> u64 {
        let token = self.clock.get() + 1;
        self.clock.set(token);
        token
    }

    pub(crate) fn attach_root(&self, root: &Node) {
        *self.root.borrow_mut() = Rc::downgrade(&root.inner);
    }

    /// Offset of the first visible node with id `target` (the root is offset 0)
    fn offset_of(&self, target: Option<&str>) -> Option<usize> {
        let root = Node {
            inner: self.root.borrow().upgrade()?,
        };
        let mut offset = 0;
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.id().as_deref() == target {
                return Some(offset);
            }
            offset += 1;
            if node.is_expanded() {
                stack.extend(node.loaded_children().unwrap_or_default().into_iter().rev());
            }
        }
        None
    }

    pub(crate) fn subscribe(&self, sender: UnboundedSender<TreeModelUpdate>) {
        self.subscribers.borrow_mut().push(sender);
    }

    /// Send `update` to every subscriber, stamped with the current offset of
    /// its root. Callers mutate and emit without awaiting in between.
    pub(crate) fn emit(&self, mut update: TreeModelUpdate) {
        update.offset = self.offset_of(update.root.id());
        debug!(
            view = %self.view_id,
            root = ?update.root.id(),
            offset = ?update.offset,
            old = update.old_nodes.len(),
            new = update.new_nodes.len(),
            focus = update.focus_event,
            "Emitting update"
        );
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.send(update.clone()).is_ok());
    }
}

/// The only expandable node among `children`, if there is exactly one
fn sole_expandable(children: &[Node]) -> Option<&Node> {
    let mut expandable = children.iter().filter(|c| c.expandable());
    match (expandable.next(), expandable.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

/// Immutable snapshot of a node's rendering state
#[derive(Debug, Clone)]
pub struct NodeView {
    pub data: Rc<TreeViewNode>,
    pub level: usize,
    pub expandable: bool,
    pub expanded: bool,
}

impl NodeView {
    pub fn id(&self) -> Option<&str> {
        self.data.node_uri.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.data.label
    }

    pub fn icon(&self) -> Option<&str> {
        self.data.icon.as_deref()
    }

    /// Whether both snapshots render as the same row
    pub fn same_row(&self, other: &NodeView) -> bool {
        self.expanded == other.expanded
            && self.level == other.level
            && self.expandable == other.expandable
            && self.data.node_uri == other.data.node_uri
            && self.data.view_id == other.data.view_id
            && self.data.label == other.data.label
    }
}

struct NodeInner {
    data: RefCell<Rc<TreeViewNode>>,
    level: usize,
    expanded: Cell<bool>,
    /// Swapped for a fresh cell when the subtree is reloaded
    children: RefCell<Rc<OnceCell<Vec<Node>>>>,
    last_touch: Cell<u64>,
    defunct: Cell<bool>,
    ctx: Rc<TreeContext>,
}

/// One entry of a lazily populated tree.
///
/// Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Node {
    inner: Rc<NodeInner>,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("level", &self.inner.level)
            .field("expanded", &self.inner.expanded.get())
            .field("defunct", &self.inner.defunct.get())
            .finish()
    }
}

impl Node {
    pub(crate) fn new(data: TreeViewNode, level: usize, ctx: Rc<TreeContext>) -> Self {
        Self {
            inner: Rc::new(NodeInner {
                data: RefCell::new(Rc::new(data)),
                level,
                expanded: Cell::new(false),
                children: RefCell::new(Rc::new(OnceCell::new())),
                last_touch: Cell::new(0),
                defunct: Cell::new(false),
                ctx,
            }),
        }
    }

    /// Identifier, `None` only for the synthetic root
    pub fn id(&self) -> Option<String> {
        self.inner.data.borrow().node_uri.clone()
    }

    pub fn data(&self) -> Rc<TreeViewNode> {
        self.inner.data.borrow().clone()
    }

    pub fn label(&self) -> String {
        self.inner.data.borrow().label.clone()
    }

    pub fn level(&self) -> usize {
        self.inner.level
    }

    pub fn expandable(&self) -> bool {
        self.inner.data.borrow().collapse_state.is_some()
    }

    pub fn is_expanded(&self) -> bool {
        self.inner.expanded.get()
    }

    pub fn is_defunct(&self) -> bool {
        self.inner.defunct.get()
    }

    /// Whether both handles point at the same node
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn make_view(&self) -> NodeView {
        NodeView {
            data: self.data(),
            level: self.inner.level,
            expandable: self.expandable(),
            expanded: self.is_expanded(),
        }
    }

    /// Children if they have already been fetched
    pub fn loaded_children(&self) -> Option<Vec<Node>> {
        self.inner.children.borrow().get().cloned()
    }

    /// Children of this node, fetched on first access.
    ///
    /// Concurrent callers share a single in-flight request. A failed fetch
    /// leaves nothing cached, so the next call asks again.
    pub async fn children(&self) -> Result<Vec<Node>> {
        let cell = self.inner.children.borrow().clone();
        let children = cell.get_or_try_init(|| self.fetch_children()).await?;
        Ok(children.clone())
    }

    /// Fetch children from the provider without caching them
    async fn fetch_children(&self) -> Result<Vec<Node>> {
        let id = self.id();
        let ctx = &self.inner.ctx;
        debug!(view = %ctx.view_id, node = ?id, "Loading children");
        let nodes = ctx.provider.load_children(&ctx.view_id, id.as_deref()).await?;
        Ok(nodes
            .into_iter()
            .map(|data| Node::new(data, self.inner.level + 1, ctx.clone()))
            .collect())
    }

    /// Swap in a new children cache, returning the previously loaded children
    fn replace_children(&self, children: Option<Vec<Node>>) -> Option<Vec<Node>> {
        let fresh = Rc::new(OnceCell::new_with(children));
        let old = self.inner.children.replace(fresh);
        old.get().cloned()
    }

    /// Number of visible rows this subtree occupies
    pub async fn height(&self) -> Result<usize> {
        let mut height = 0;
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            height += 1;
            if node.is_expanded() {
                stack.extend(node.children().await?);
            }
        }
        Ok(height)
    }

    /// Snapshots of this node and every visible descendant, in row order.
    ///
    /// Never fetches: an expanded node always has its children loaded.
    pub fn visible_nodes(&self) -> Vec<NodeView> {
        let mut acc = Vec::new();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            acc.push(node.make_view());
            if node.is_expanded() {
                stack.extend(node.loaded_children().unwrap_or_default().into_iter().rev());
            }
        }
        acc
    }

    /// Stamp this node and its visible loaded descendants with a new token.
    ///
    /// Operations that captured an older token on any of them will discard
    /// their result.
    fn touch(&self) -> u64 {
        let token = self.inner.ctx.next_token();
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            node.inner.last_touch.set(token);
            if node.is_expanded() {
                stack.extend(node.loaded_children().unwrap_or_default());
            }
        }
        token
    }

    fn still_current(&self, token: u64) -> bool {
        self.inner.last_touch.get() == token && !self.is_defunct()
    }

    /// Mark this node and every loaded descendant as discarded
    pub(crate) fn mark_defunct(&self) {
        let mut stack = vec![self.clone()];
        while let Some(node) = stack.pop() {
            node.inner.defunct.set(true);
            stack.extend(node.loaded_children().unwrap_or_default());
        }
    }

    /// Expand this node, following single expandable children when the tree
    /// auto-expands.
    ///
    /// Returns `Ok(false)` when nothing was applied: the node is defunct, not
    /// expandable, already expanded, or was touched by a newer operation
    /// while children were loading. Children of the whole chain are loaded
    /// first; nodes are only marked expanded once all of them are in, so a
    /// failure or a stale result leaves the tree untouched.
    pub async fn expand(&self) -> Result<bool> {
        if self.is_defunct() || !self.expandable() || self.is_expanded() {
            return Ok(false);
        }

        let ctx = self.inner.ctx.clone();
        let before = self.make_view();
        let token = self.touch();

        let mut chain = Vec::new();
        let mut current = self.clone();
        loop {
            if let Some(id) = current.id() {
                ctx.provider.notify_collapse(&ctx.view_id, &id, false);
            }
            let children = current.children().await?;
            if !self.still_current(token) {
                debug!(view = %ctx.view_id, node = ?self.id(), "Discarding stale expand");
                return Ok(false);
            }
            chain.push(current);
            match sole_expandable(&children) {
                Some(only) if ctx.auto_expand => current = only.clone(),
                _ => break,
            }
        }

        for node in &chain {
            node.inner.expanded.set(true);
        }
        ctx.emit(TreeModelUpdate {
            root: self.make_view(),
            offset: None,
            old_nodes: vec![before],
            new_nodes: self.visible_nodes(),
            focus_event: false,
        });
        Ok(true)
    }

    /// Collapse this node. `Ok(false)` when defunct or not expanded.
    ///
    /// Never suspends, so it cannot go stale itself. Touching the subtree
    /// discards expands and refreshes still pending inside it.
    pub async fn collapse(&self) -> Result<bool> {
        if self.is_defunct() || !self.is_expanded() {
            return Ok(false);
        }

        let ctx = self.inner.ctx.clone();
        self.touch();
        let old_nodes = self.visible_nodes();
        if let Some(id) = self.id() {
            ctx.provider.notify_collapse(&ctx.view_id, &id, true);
        }
        self.inner.expanded.set(false);
        ctx.emit(TreeModelUpdate {
            root: self.make_view(),
            offset: None,
            old_nodes,
            new_nodes: vec![self.make_view()],
            focus_event: false,
        });
        Ok(true)
    }

    /// Id paths, relative to this node, of every expanded node in the subtree.
    ///
    /// An expanded node contributes the path leading to it, so this node
    /// itself shows up as the empty path when expanded.
    async fn find_open_paths(&self) -> Result<Vec<Vec<String>>> {
        let mut acc = Vec::new();
        let mut stack = vec![(self.clone(), Vec::new())];
        while let Some((node, path)) = stack.pop() {
            if !node.is_expanded() {
                continue;
            }
            let children = node.children().await?;
            for child in children.into_iter().rev() {
                let child_path = match child.id() {
                    Some(id) => {
                        let mut p: Vec<String> = path.clone();
                        p.push(id);
                        p
                    }
                    None => path.clone(),
                };
                stack.push((child, child_path));
            }
            acc.push(path);
        }
        Ok(acc)
    }

    /// Expand freshly fetched children along the recorded open paths.
    ///
    /// Only the new nodes are touched; they are not attached to the tree yet.
    async fn reload_open_paths(&self, fresh: Vec<Node>, open_paths: Vec<Vec<String>>) -> Result<()> {
        let auto_expand = self.inner.ctx.auto_expand;
        let mut work = vec![(fresh, open_paths)];
        while let Some((children, paths)) = work.pop() {
            let mut groups: HashMap<String, Vec<Vec<String>>> = HashMap::new();
            for mut path in paths.into_iter().filter(|p| !p.is_empty()) {
                let first = path.remove(0);
                groups.entry(first).or_default().push(path);
            }

            if groups.is_empty() && auto_expand {
                if let Some(id) = sole_expandable(&children).and_then(Node::id) {
                    groups.insert(id, vec![Vec::new()]);
                }
            }

            for child in children {
                let Some(rest) = child.id().and_then(|id| groups.remove(&id)) else {
                    continue;
                };
                if !child.expandable() {
                    continue;
                }
                child.inner.expanded.set(true);
                let grandchildren = child.children().await?;
                work.push((grandchildren, rest));
            }
        }
        Ok(())
    }

    /// Re-synchronize this subtree with the provider.
    ///
    /// Every node expanded before the refresh is expanded again if its id is
    /// still present. New children are only attached once the whole reload
    /// succeeded; the replaced nodes become defunct. `new_data`, if given,
    /// replaces this node's own data. Returns whether an update was emitted.
    pub async fn refresh_subtree(&self, new_data: Option<TreeViewNode>) -> Result<bool> {
        if self.is_defunct() {
            return Ok(false);
        }

        let ctx = self.inner.ctx.clone();
        let token = self.touch();
        let open_paths = self.find_open_paths().await?;

        let fresh = if open_paths.is_empty() {
            None
        } else {
            let fresh = self.fetch_children().await?;
            self.reload_open_paths(fresh.clone(), open_paths).await?;
            Some(fresh)
        };

        if !self.still_current(token) {
            debug!(view = %ctx.view_id, node = ?self.id(), "Discarding stale refresh");
            return Ok(false);
        }
        let old_nodes = self.visible_nodes();

        for child in self.replace_children(fresh).unwrap_or_default() {
            child.mark_defunct();
        }
        if let Some(data) = new_data {
            *self.inner.data.borrow_mut() = Rc::new(data);
            if !self.expandable() {
                self.inner.expanded.set(false);
            }
        }

        let update = TreeModelUpdate {
            root: self.make_view(),
            offset: None,
            old_nodes,
            new_nodes: self.visible_nodes(),
            focus_event: false,
        };
        match optimize_update(update) {
            Some(update) => {
                ctx.emit(update);
                Ok(true)
            }
            None => {
                debug!(view = %ctx.view_id, node = ?self.id(), "Refresh produced no changes");
                Ok(false)
            }
        }
    }
}

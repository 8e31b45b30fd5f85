use super::decorations::{render_row, NodeCategory};
use super::model::{TreeModel, TreeModelUpdate};
use super::node::{Node, NodeView};
use crate::config::TreeViewsConfig;
use crate::error::Result;
use crate::host::{Host, SurfaceId, WindowId};
use crate::protocol::DocumentLocator;
use std::cell::Cell;
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lifecycle of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Uninitialized,
    Ready,
    Disposed,
}

/// Saved position of a window around a surface edit
#[derive(Debug, Clone, Copy)]
struct WindowOffsets {
    window: WindowId,
    cursor: usize,
    top_row: usize,
}

/// Move a row across an edit that replaced `removed` rows at `at` with
/// `inserted` rows.
///
/// Rows above the edit stay, rows below shift by the size change, and rows
/// inside the replaced span stay inside the new one.
pub fn adjust_row(row: usize, at: usize, removed: usize, inserted: usize) -> usize {
    if row < at {
        row
    } else if row >= at + removed {
        row - removed + inserted
    } else {
        at + (row - at).min(inserted.saturating_sub(1))
    }
}

/// Drop the synthetic root row from an update; it is never rendered
fn hide_root(mut update: TreeModelUpdate) -> TreeModelUpdate {
    if update.root.id().is_some() {
        return update;
    }
    let skip = |nodes: &mut Vec<NodeView>| {
        if !nodes.is_empty() {
            nodes.remove(0);
        }
    };
    skip(&mut update.old_nodes);
    skip(&mut update.new_nodes);
    update
}

/// Binds one tree model to one text surface.
///
/// Updates emitted by the model are queued and applied in order by
/// [`TreeView::pump`]; only one pump runs at a time.
pub struct TreeView {
    model: Rc<TreeModel>,
    host: Rc<dyn Host>,
    config: Rc<TreeViewsConfig>,
    surface: SurfaceId,
    updates: Mutex<Option<UnboundedReceiver<TreeModelUpdate>>>,
    first_update: Cell<bool>,
    state: Cell<ViewState>,
}

impl TreeView {
    /// Create the surface for `model` and start listening to its updates.
    ///
    /// The surface gets the configured key bindings, is made read-only and
    /// the row highlight groups get their default links.
    pub async fn create(
        model: Rc<TreeModel>,
        host: Rc<dyn Host>,
        config: Rc<TreeViewsConfig>,
    ) -> Result<Self> {
        let surface = host.create_surface(model.view_id()).await?;
        for (key, action) in config.keys.bindings() {
            host.bind_key(surface, key, action).await?;
        }
        host.set_modifiable(surface, false).await?;
        for category in NodeCategory::ALL {
            host.default_highlight_link(category.highlight_group(), category.default_link())
                .await?;
        }
        let updates = model.subscribe();
        Ok(Self {
            model,
            host,
            config,
            surface,
            updates: Mutex::new(Some(updates)),
            first_update: Cell::new(true),
            state: Cell::new(ViewState::Uninitialized),
        })
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn model(&self) -> &Rc<TreeModel> {
        &self.model
    }

    pub fn state(&self) -> ViewState {
        self.state.get()
    }

    /// Render the first level of the tree.
    ///
    /// Paths configured as initially expanded for this tree are revealed and
    /// expanded, and the cursor lands on the first of them. The view only
    /// becomes ready once the root is loaded; after a failed root fetch the
    /// next call tries again.
    pub async fn init(&self) -> Result<()> {
        if self.state.get() != ViewState::Uninitialized {
            return Ok(());
        }

        let root = self.model.root();
        if !root.expand().await? && root.is_expanded() {
            self.redraw().await?;
        }
        self.state.set(ViewState::Ready);

        let mut focus = None;
        if let Some(desc) = self.config.description(self.model.view_id()) {
            for path in &desc.expanded {
                if let Some(node) = self.model.reveal_by_parents(path).await? {
                    node.expand().await?;
                    if focus.is_none() {
                        focus = Some(node);
                    }
                }
            }
        }
        self.pump().await?;

        let row = match focus {
            Some(node) => self.row_of(&node).await?.unwrap_or(0),
            None => 0,
        };
        for window in self.host.windows_showing(self.surface).await? {
            self.host.set_cursor(window, row).await?;
        }
        Ok(())
    }

    /// Replace the surface with the rows currently visible in the model,
    /// discarding queued updates the snapshot already contains
    async fn redraw(&self) -> Result<()> {
        let mut guard = self.updates.lock().await;
        if let Some(updates) = guard.as_mut() {
            while updates.try_recv().is_ok() {}
        }
        let root = self.model.root();
        let old_rows = self.host.line_count(self.surface).await?;
        let new_nodes = root.visible_nodes();
        debug!(view = %self.model.view_id(), rows = new_nodes.len(), "Redrawing surface");

        self.host.set_modifiable(self.surface, true).await?;
        let edited = async {
            self.host.remove_lines(self.surface, 0, old_rows).await?;
            match new_nodes.get(1..) {
                Some(rows) if !rows.is_empty() => {
                    self.first_update.set(false);
                    self.replace_rows(0, &[], rows).await.map(|_| ())
                }
                _ => self.host.insert_lines(self.surface, 0, vec![String::new()]).await,
            }
        }
        .await;
        self.host.set_modifiable(self.surface, false).await?;
        edited?;

        for window in self.host.windows_showing(self.surface).await? {
            self.host.set_top_row(window, 0).await?;
            self.host.set_cursor(window, 0).await?;
        }
        Ok(())
    }

    /// Apply every queued update, in emission order.
    ///
    /// Returns how many updates were taken off the queue. A failing update is
    /// logged and skipped.
    pub async fn pump(&self) -> Result<usize> {
        let mut guard = self.updates.lock().await;
        let Some(updates) = guard.as_mut() else {
            return Ok(0);
        };

        let mut applied = 0;
        while let Ok(update) = updates.try_recv() {
            applied += 1;
            if let Err(e) = self.apply_update(update).await {
                warn!(view = %self.model.view_id(), "Failed to apply update: {}", e);
            }
        }
        Ok(applied)
    }

    /// Apply one update at the row its root had when it was emitted
    async fn apply_update(&self, update: TreeModelUpdate) -> Result<()> {
        let Some(offset) = update.offset else {
            debug!(view = %self.model.view_id(), root = ?update.root.id(), "Dropping update for unreachable node");
            return Ok(());
        };
        let anchor = update.root.id().map(str::to_string);
        // The synthetic root has no row; its first child sits on row 0
        let row = if anchor.is_some() { offset.saturating_sub(1) } else { 0 };
        let update = hide_root(update);
        let windows = self.host.windows_showing(self.surface).await?;

        if update.focus_event {
            debug!(view = %self.model.view_id(), root = ?anchor, row, "Focus event");
            for window in windows {
                self.host.set_cursor(window, row).await?;
            }
            return Ok(());
        }

        debug!(
            view = %self.model.view_id(),
            root = ?anchor,
            row,
            length = update.old_nodes.len(),
            payload = %update.new_nodes.iter().filter_map(|n| n.id()).collect::<Vec<_>>().join(","),
            "Update event"
        );

        let mut offsets = Vec::with_capacity(windows.len());
        for window in windows {
            offsets.push(WindowOffsets {
                window,
                cursor: self.host.cursor(window).await?,
                top_row: self.host.top_row(window).await?,
            });
        }

        self.host.set_modifiable(self.surface, true).await?;
        let edited = self.replace_rows(row, &update.old_nodes, &update.new_nodes).await;
        self.host.set_modifiable(self.surface, false).await?;
        let placeholder = edited?;

        let removed = update.old_nodes.len();
        let inserted = update.new_nodes.len();
        for saved in offsets {
            let mut cursor = adjust_row(saved.cursor, row, removed, inserted);
            let mut top_row = adjust_row(saved.top_row, row, removed, inserted);
            if let Some(line) = placeholder {
                cursor = adjust_row(cursor, line, 1, 0);
                top_row = adjust_row(top_row, line, 1, 0);
            }
            self.host.set_top_row(saved.window, top_row).await?;
            self.host.set_cursor(saved.window, cursor).await?;
        }
        Ok(())
    }

    /// Replace the rows of `old` at `row` with rows for `new`.
    ///
    /// Returns the row of the initial placeholder if this edit removed it.
    async fn replace_rows(&self, row: usize, old: &[NodeView], new: &[NodeView]) -> Result<Option<usize>> {
        if !old.is_empty() {
            self.host.remove_lines(self.surface, row, old.len()).await?;
        }
        let lines = new.iter().map(|n| render_row(n, &self.config.glyphs)).collect();
        self.host.insert_lines(self.surface, row, lines).await?;
        for (idx, node) in new.iter().enumerate() {
            let group = NodeCategory::from_icon(node.icon()).highlight_group();
            self.host.annotate_line(self.surface, row + idx, group).await?;
        }

        if self.first_update.replace(false) {
            let line = new.len();
            if line < self.host.line_count(self.surface).await? {
                self.host.remove_lines(self.surface, line, 1).await?;
                return Ok(Some(line));
            }
        }
        Ok(None)
    }

    /// Rendered row of a visible node
    async fn row_of(&self, node: &Node) -> Result<Option<usize>> {
        Ok(self
            .model
            .find_node_offset(&node.make_view())
            .await?
            .and_then(|offset| offset.checked_sub(1)))
    }

    async fn current_window(&self) -> Result<Option<WindowId>> {
        let window = self.host.current_window().await?;
        if self.host.window_surface(window).await? == self.surface {
            Ok(Some(window))
        } else {
            Ok(None)
        }
    }

    /// Node on the cursor row of the current window
    pub async fn node_under_cursor(&self) -> Result<Option<Node>> {
        if self.state.get() != ViewState::Ready {
            return Ok(None);
        }
        let Some(window) = self.current_window().await? else {
            return Ok(None);
        };
        let row = self.host.cursor(window).await?;
        self.model.find_node_with_offset(row + 1).await
    }

    async fn jump_to(&self, node: &Node) -> Result<bool> {
        let (Some(window), Some(row)) = (self.current_window().await?, self.row_of(node).await?) else {
            return Ok(false);
        };
        self.host.set_cursor(window, row).await?;
        Ok(true)
    }

    pub async fn toggle_node(&self) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        if !node.expandable() {
            return Ok(false);
        }
        let applied = if node.is_expanded() {
            node.collapse().await?
        } else {
            node.expand().await?
        };
        self.pump().await?;
        Ok(applied)
    }

    /// Expand the node under the cursor if needed, then reload its subtree
    pub async fn force_children_reload(&self) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        if !node.expandable() {
            return Ok(false);
        }
        if !node.is_expanded() {
            node.expand().await?;
            self.pump().await?;
        }
        let applied = node.refresh_subtree(None).await?;
        self.pump().await?;
        Ok(applied)
    }

    pub async fn goto_parent_node(&self) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        match self.model.find_parent_node(&node).await? {
            Some(parent) => self.jump_to(&parent).await,
            None => Ok(false),
        }
    }

    /// Jump to the first (or last) child of the parent of the node under the cursor
    pub async fn goto_edge_node(&self, first: bool) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        let Some(parent) = self.model.find_parent_node(&node).await? else {
            return Ok(false);
        };
        let children = parent.children().await?;
        let target = if first { children.first() } else { children.last() };
        match target {
            Some(target) => self.jump_to(target).await,
            None => Ok(false),
        }
    }

    pub async fn goto_neighboring_sibling(&self, prev: bool) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        let Some(parent) = self.model.find_parent_node(&node).await? else {
            return Ok(false);
        };
        let children = parent.children().await?;
        let Some(idx) = children.iter().position(|c| c.id() == node.id()) else {
            return Ok(false);
        };
        let target = if prev {
            idx.checked_sub(1).and_then(|i| children.get(i))
        } else {
            children.get(idx + 1)
        };
        match target {
            Some(target) => self.jump_to(target).await,
            None => Ok(false),
        }
    }

    /// Run the command attached to the node under the cursor
    pub async fn execute_command(&self) -> Result<bool> {
        let Some(node) = self.node_under_cursor().await? else {
            return Ok(false);
        };
        let data = node.data();
        let Some(command) = &data.command else {
            return Ok(false);
        };
        debug!(view = %self.model.view_id(), command = %command.command, "Executing node command");
        self.host.execute_command(command).await?;
        Ok(true)
    }

    /// Reveal a document position and move the cursor to its node
    pub async fn reveal_document(&self, locator: &DocumentLocator) -> Result<Option<Node>> {
        let node = self.model.reveal_document(locator).await?;
        self.pump().await?;
        Ok(node)
    }

    /// Stop rendering and close the surface
    pub async fn dispose(&self) -> Result<()> {
        if self.state.replace(ViewState::Disposed) == ViewState::Disposed {
            return Ok(());
        }
        self.updates.lock().await.take();
        self.host.close_surface(self.surface).await
    }
}

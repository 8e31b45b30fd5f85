//! Panel layout for tree views.
//!
//! The manager owns every registered tree model, the views bound to them and
//! the windows (panels) showing those views in the current tab. Layout
//! changes are serialized so concurrent commands never interleave window
//! operations.

use super::actions::{TreeAction, WindowProp};
use crate::config::TreeViewsConfig;
use crate::error::{Result, TreeError};
use crate::host::{Host, MessageLevel, PanelPlacement, SplitDirection, WindowId};
use crate::protocol::DocumentLocator;
use crate::services::time_source::{SharedTimeSource, TimeSource};
use crate::tree::{Node, TreeModel, TreeView};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Open panel: tree name and the window showing it
type Panel = (String, WindowId);

pub struct TreeViewsManager {
    host: Rc<dyn Host>,
    config: Rc<TreeViewsConfig>,
    time_source: SharedTimeSource,
    models: RefCell<BTreeMap<String, Rc<TreeModel>>>,
    views: RefCell<BTreeMap<String, Rc<TreeView>>>,
    panels: RefCell<BTreeMap<String, WindowId>>,
    last_window_prop: Cell<Option<(WindowProp, Instant)>>,
    layout: Mutex<()>,
}

impl TreeViewsManager {
    pub fn new(host: Rc<dyn Host>, config: Rc<TreeViewsConfig>, time_source: SharedTimeSource) -> Self {
        Self {
            host,
            config,
            time_source,
            models: RefCell::new(BTreeMap::new()),
            views: RefCell::new(BTreeMap::new()),
            panels: RefCell::new(BTreeMap::new()),
            last_window_prop: Cell::new(None),
            layout: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Rc<TreeViewsConfig> {
        &self.config
    }

    pub fn add_tree_model(&self, model: Rc<TreeModel>) {
        info!(view = %model.view_id(), "Tree view registered");
        self.models
            .borrow_mut()
            .insert(model.view_id().to_string(), model);
    }

    pub fn dispose_tree_model(&self, name: &str) {
        self.models.borrow_mut().remove(name);
    }

    pub fn model(&self, name: &str) -> Option<Rc<TreeModel>> {
        self.models.borrow().get(name).cloned()
    }

    pub fn view(&self, name: &str) -> Option<Rc<TreeView>> {
        self.views.borrow().get(name).cloned()
    }

    /// Names of all registered trees, sorted
    pub fn tree_names(&self) -> Vec<String> {
        self.models.borrow().keys().cloned().collect()
    }

    fn check_availability(&self) -> Result<()> {
        if self.models.borrow().is_empty() {
            let err = TreeError::NotLoaded;
            warn!("{}", err);
            self.host.show_message(&err.to_string(), MessageLevel::Warning);
            return Err(err);
        }
        Ok(())
    }

    fn check_existence(&self, name: &str) -> Result<Rc<TreeModel>> {
        let models = self.models.borrow();
        match models.get(name) {
            Some(model) => Ok(model.clone()),
            None => {
                let err = TreeError::unknown_view(name, models.keys().map(String::as_str));
                warn!("{}", err);
                self.host.show_message(&err.to_string(), MessageLevel::Error);
                Err(err)
            }
        }
    }

    /// Position in the panel column: configured order first, then by name
    fn layout_key(&self, name: &str) -> (usize, String) {
        (
            self.config.layout_index(name).unwrap_or(usize::MAX),
            name.to_string(),
        )
    }

    /// Panels still open in the current tab, top to bottom
    pub async fn open_panels(&self) -> Result<Vec<Panel>> {
        let windows = self.host.windows().await?;
        let mut panels: Vec<Panel> = self
            .panels
            .borrow()
            .iter()
            .filter(|(_, window)| windows.contains(*window))
            .map(|(name, window)| (name.clone(), *window))
            .collect();
        panels.sort_by_key(|(name, _)| self.layout_key(name));
        Ok(panels)
    }

    /// Close every open panel, or open every configured one if none is open
    pub async fn toggle_all(&self) -> Result<()> {
        self.check_availability()?;
        let _layout = self.layout.lock().await;

        let open = self.open_panels().await?;
        if !open.is_empty() {
            for (name, window) in open {
                self.close_panel(&name, window).await?;
            }
            return Ok(());
        }

        let mut names: Vec<String> = self
            .tree_names()
            .into_iter()
            .filter(|name| self.config.description(name).is_some())
            .collect();
        names.sort_by_key(|name| self.layout_key(name));

        let mut opened: Vec<Panel> = Vec::new();
        for name in names {
            let placement = match opened.last() {
                Some((_, above)) => PanelPlacement::Below(*above),
                None => self.edge_placement(),
            };
            let window = self.open_panel(&name, placement).await?;
            opened.push((name, window));
        }
        self.align_windows(&opened).await
    }

    /// Open the named panel, or close it if it is already open
    pub async fn toggle_one(&self, name: &str) -> Result<()> {
        self.check_availability()?;
        self.check_existence(name)?;
        let _layout = self.layout.lock().await;
        self.toggle_internal(name, false).await
    }

    /// Make sure the named panel is open and reveal a document position in it
    pub async fn reveal_in_tree(&self, name: &str, locator: &DocumentLocator) -> Result<Option<Node>> {
        self.check_availability()?;
        self.check_existence(name)?;
        {
            let _layout = self.layout.lock().await;
            self.toggle_internal(name, true).await?;
        }
        match self.view(name) {
            Some(view) => view.reveal_document(locator).await,
            None => Ok(None),
        }
    }

    async fn toggle_internal(&self, name: &str, only_open: bool) -> Result<()> {
        let open = self.open_panels().await?;
        if let Some((_, window)) = open.iter().find(|(n, _)| n == name) {
            if !only_open {
                self.close_panel(name, *window).await?;
            } else if let Some(view) = self.view(name) {
                // No-op unless the first root fetch failed
                view.init().await?;
            }
            return Ok(());
        }

        let placement = match open.first() {
            Some((_, first)) => PanelPlacement::Below(*first),
            None => self.edge_placement(),
        };
        let window = self.open_panel(name, placement).await?;
        let mut panels = open;
        panels.push((name.to_string(), window));
        panels.sort_by_key(|(name, _)| self.layout_key(name));
        self.align_windows(&panels).await
    }

    fn edge_placement(&self) -> PanelPlacement {
        PanelPlacement::Edge {
            alignment: self.config.alignment,
            width: self.config.initial_width,
        }
    }

    /// Open a window for `name`, creating and initializing its view on first use
    async fn open_panel(&self, name: &str, placement: PanelPlacement) -> Result<WindowId> {
        let model = self
            .model(name)
            .ok_or_else(|| TreeError::unknown_view(name, self.tree_names().iter().map(String::as_str)))?;

        let view = match self.view(name) {
            Some(view) => view,
            None => {
                let view = Rc::new(TreeView::create(model.clone(), self.host.clone(), self.config.clone()).await?);
                self.views.borrow_mut().insert(name.to_string(), view.clone());
                view
            }
        };

        let window = self.host.open_window(view.surface(), placement).await?;
        self.panels.borrow_mut().insert(name.to_string(), window);
        model.show();
        view.init().await?;
        info!(view = %name, %window, "Panel opened");
        Ok(window)
    }

    async fn close_panel(&self, name: &str, window: WindowId) -> Result<()> {
        self.host.close_window(window).await?;
        self.panels.borrow_mut().remove(name);
        if let Some(model) = self.model(name) {
            model.hide();
        }
        info!(view = %name, %window, "Panel closed");
        Ok(())
    }

    /// Share the combined height of `panels` in proportion to their weights
    async fn align_windows(&self, panels: &[Panel]) -> Result<()> {
        let mut total = 0;
        for (_, window) in panels {
            total += self.host.height(*window).await?;
        }
        let weights: Vec<u32> = panels
            .iter()
            .map(|(name, _)| self.config.weight_for(name))
            .collect();
        let parts: u64 = weights.iter().map(|w| u64::from(*w)).sum();
        if parts == 0 {
            return Ok(());
        }

        for ((name, window), weight) in panels.iter().zip(weights) {
            let height = (u64::from(weight) * total as u64 / parts) as usize;
            debug!(view = %name, %window, height, "Aligning panel");
            self.host.set_height(*window, height).await?;
        }
        Ok(())
    }

    /// The host reports the named tree is no longer displayed
    pub fn view_hidden(&self, name: &str) {
        if let Some(model) = self.model(name) {
            model.hide();
        }
    }

    /// View whose surface is shown in the current window
    pub async fn active_tree(&self) -> Result<Option<Rc<TreeView>>> {
        let window = self.host.current_window().await?;
        let surface = self.host.window_surface(window).await?;
        Ok(self
            .views
            .borrow()
            .values()
            .find(|view| view.surface() == surface)
            .cloned())
    }

    /// Apply a panel action to the tree in the current window
    pub async fn apply_action(&self, action: TreeAction) -> Result<bool> {
        let Some(view) = self.active_tree().await? else {
            self.host.show_message("no active tree view", MessageLevel::Info);
            return Err(TreeError::NoActiveTree);
        };
        debug!(view = %view.model().view_id(), %action, "Applying tree action");

        match action {
            TreeAction::ToggleNode => view.toggle_node().await,
            TreeAction::ForceChildrenReload => view.force_children_reload().await,
            TreeAction::ParentNode => view.goto_parent_node().await,
            TreeAction::FirstSibling => view.goto_edge_node(true).await,
            TreeAction::LastSibling => view.goto_edge_node(false).await,
            TreeAction::PrevSibling => view.goto_neighboring_sibling(true).await,
            TreeAction::NextSibling => view.goto_neighboring_sibling(false).await,
            TreeAction::ExecuteCommand
            | TreeAction::ExecuteCommandAndOpenSplit
            | TreeAction::ExecuteCommandAndOpenVSplit
            | TreeAction::ExecuteCommandAndOpenTab => {
                let prop = action.window_prop().unwrap_or_default();
                self.last_window_prop
                    .set(Some((prop, self.time_source.now())));
                view.execute_command().await
            }
        }
    }

    /// Placement directive still within its validity window
    pub fn current_window_prop(&self) -> WindowProp {
        let recency = Duration::from_millis(self.config.goto_recency_ms);
        match self.last_window_prop.get() {
            Some((prop, at)) if self.time_source.elapsed_since(at) < recency => prop,
            _ => WindowProp::Default,
        }
    }

    /// Pick or create the window a "jump to location" should open in, and
    /// focus it
    pub async fn prepare_window_for_goto(&self) -> Result<WindowId> {
        let prop = self.current_window_prop();
        if prop == WindowProp::Tab {
            return self.host.open_tab().await;
        }

        let mut windows = self.host.windows().await?;
        windows.sort();
        let tree_windows: Vec<WindowId> = self.panels.borrow().values().copied().collect();
        let target = windows.iter().find(|w| !tree_windows.contains(*w)).copied();

        match target {
            Some(window) => {
                self.host.focus_window(window).await?;
                match prop {
                    WindowProp::HSplit => self.host.split_window(window, SplitDirection::Horizontal).await,
                    WindowProp::VSplit => self.host.split_window(window, SplitDirection::Vertical).await,
                    _ => Ok(window),
                }
            }
            None => {
                let width = match windows.first() {
                    Some(first) => Some(
                        self.host
                            .width(*first)
                            .await?
                            .saturating_sub(self.config.initial_width),
                    ),
                    None => None,
                };
                self.host
                    .open_edge_window(self.config.alignment.opposite(), width)
                    .await
            }
        }
    }

    /// Dispose every view, closing their surfaces
    pub async fn dispose(&self) -> Result<()> {
        let views: Vec<Rc<TreeView>> = std::mem::take(&mut *self.views.borrow_mut()).into_values().collect();
        for view in views {
            view.dispose().await?;
        }
        self.panels.borrow_mut().clear();
        Ok(())
    }
}

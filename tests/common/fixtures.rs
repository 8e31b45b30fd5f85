//! Tree fixtures and a headless editor harness.

use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tokio::sync::Semaphore;
use tvp::app::{TreeViewController, TreeViewsManager};
use tvp::config::{TreeViewDescription, TreeViewsConfig};
use tvp::host::{Host, MemoryHost, WindowId};
use tvp::protocol::{DocumentLocator, TreeRevealResult, TreeViewDidChangeParams, TreeViewNode};
use tvp::services::provider::{StaticTreeProvider, TreeViewProvider, ROOT_KEY};
use tvp::services::time_source::TestTimeSource;
use tvp::tree::{TreeModel, TreeView};
use tvp::Result;

/// Provider that can hold children requests until released.
///
/// Held requests wait on a closed-on-release semaphore, so any number of
/// waiters go through at once.
pub struct GatedProvider {
    inner: Rc<StaticTreeProvider>,
    gates: RefCell<HashMap<(String, String), Rc<Semaphore>>>,
}

impl GatedProvider {
    pub fn new(inner: Rc<StaticTreeProvider>) -> Self {
        Self {
            inner,
            gates: RefCell::new(HashMap::new()),
        }
    }

    fn key(view_id: &str, parent: Option<&str>) -> (String, String) {
        (view_id.to_string(), parent.unwrap_or(ROOT_KEY).to_string())
    }

    /// Hold every children request for `parent` until `release` is called
    pub fn hold(&self, view_id: &str, parent: Option<&str>) {
        self.gates
            .borrow_mut()
            .insert(Self::key(view_id, parent), Rc::new(Semaphore::new(0)));
    }

    pub fn release(&self, view_id: &str, parent: Option<&str>) {
        if let Some(gate) = self.gates.borrow_mut().remove(&Self::key(view_id, parent)) {
            gate.close();
        }
    }
}

#[async_trait(?Send)]
impl TreeViewProvider for GatedProvider {
    async fn load_children(&self, view_id: &str, parent: Option<&str>) -> Result<Vec<TreeViewNode>> {
        let gate = self.gates.borrow().get(&Self::key(view_id, parent)).cloned();
        if let Some(gate) = gate {
            // Only ever fails once the gate is closed, which is the release
            let _ = gate.acquire().await;
        }
        self.inner.load_children(view_id, parent).await
    }

    async fn load_reveal_path(&self, view_id: &str, locator: &DocumentLocator) -> Result<TreeRevealResult> {
        self.inner.load_reveal_path(view_id, locator).await
    }

    fn notify_visibility(&self, view_id: &str, visible: bool) {
        self.inner.notify_visibility(view_id, visible);
    }

    fn notify_collapse(&self, view_id: &str, node_id: &str, collapsed: bool) {
        self.inner.notify_collapse(view_id, node_id, collapsed);
    }
}

/// Layout with the given (name, weight) panels
pub fn layout(views: &[(&str, u32)]) -> TreeViewsConfig {
    TreeViewsConfig {
        initial_views: views
            .iter()
            .map(|(name, size)| TreeViewDescription {
                name: name.to_string(),
                size: *size,
                expanded: Vec::new(),
            })
            .collect(),
        ..TreeViewsConfig::default()
    }
}

/// `n` leaves `{prefix}0..{prefix}n` of `view`
pub fn leaves(view: &str, prefix: &str, n: usize) -> Vec<TreeViewNode> {
    (0..n)
        .map(|i| TreeViewNode::leaf(view, format!("{}{}", prefix, i), format!("{}{}", prefix, i)))
        .collect()
}

/// Everything needed to drive trees through the controller on a headless host
pub struct Harness {
    pub host: Rc<MemoryHost>,
    pub data: Rc<StaticTreeProvider>,
    pub provider: Rc<GatedProvider>,
    pub time: std::sync::Arc<TestTimeSource>,
    pub manager: Rc<TreeViewsManager>,
    pub controller: TreeViewController,
}

impl Harness {
    pub fn new(config: TreeViewsConfig) -> Self {
        super::tracing::init_tracing_from_env();

        let host = Rc::new(MemoryHost::new(120, 30));
        let data = Rc::new(StaticTreeProvider::new());
        let provider = Rc::new(GatedProvider::new(data.clone()));
        let time = TestTimeSource::shared();
        let manager = Rc::new(TreeViewsManager::new(host.clone(), Rc::new(config), time.clone()));
        let controller = TreeViewController::new(manager.clone(), provider.clone(), host.clone());
        Self {
            host,
            data,
            provider,
            time,
            manager,
            controller,
        }
    }

    /// Announce trees the way the data source does on startup
    pub async fn register(&self, views: &[&str]) {
        let nodes = views.iter().map(|v| TreeViewNode::root(*v)).collect();
        self.controller
            .handle_did_change(TreeViewDidChangeParams { nodes })
            .await
            .unwrap();
    }

    /// Register `view` and open its panel
    pub async fn open(&self, view: &str) -> WindowId {
        self.register(&[view]).await;
        self.manager.toggle_one(view).await.unwrap();
        self.panel(view).await
    }

    pub async fn panel(&self, view: &str) -> WindowId {
        self.manager
            .open_panels()
            .await
            .unwrap()
            .into_iter()
            .find(|(name, _)| name == view)
            .map(|(_, window)| window)
            .unwrap()
    }

    pub fn model(&self, view: &str) -> Rc<TreeModel> {
        self.manager.model(view).unwrap()
    }

    pub fn view(&self, view: &str) -> Rc<TreeView> {
        self.manager.view(view).unwrap()
    }

    /// Rendered rows of the view's surface
    pub async fn rows(&self, view: &str) -> Vec<String> {
        self.host.lines(self.view(view).surface()).await.unwrap()
    }

    /// Label of the row under the cursor of `window`, trimmed of glyphs
    pub async fn label_at_cursor(&self, window: WindowId) -> String {
        let surface = self.host.window_surface(window).await.unwrap();
        let row = self.host.cursor(window).await.unwrap();
        let lines = self.host.lines(surface).await.unwrap();
        lines[row]
            .trim_start()
            .trim_start_matches(&['▾', '▸'][..])
            .trim_start()
            .to_string()
    }
}

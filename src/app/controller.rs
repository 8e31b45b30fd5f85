//! Entry point for the tree view extension.
//!
//! Routes change notifications from the data source into tree models and
//! user commands into the panel manager.

use super::actions::{TreeAction, TreeViewCommand};
use super::tree_views::TreeViewsManager;
use crate::error::Result;
use crate::host::{Host, WindowId};
use crate::protocol::TreeViewDidChangeParams;
use crate::services::provider::TreeViewProvider;
use crate::tree::{TreeModel, ViewState};
use std::rc::Rc;
use tracing::debug;

pub struct TreeViewController {
    manager: Rc<TreeViewsManager>,
    provider: Rc<dyn TreeViewProvider>,
    host: Rc<dyn Host>,
}

impl TreeViewController {
    pub fn new(manager: Rc<TreeViewsManager>, provider: Rc<dyn TreeViewProvider>, host: Rc<dyn Host>) -> Self {
        Self {
            manager,
            provider,
            host,
        }
    }

    pub fn manager(&self) -> &Rc<TreeViewsManager> {
        &self.manager
    }

    /// Handle a change notification.
    ///
    /// The first node naming an unknown tree registers that tree. Later
    /// nodes refresh the matching subtree (or the whole tree when they carry
    /// no id) and the bound view, if any, renders the result.
    pub async fn handle_did_change(&self, params: TreeViewDidChangeParams) -> Result<()> {
        for node in params.nodes {
            let view_id = node.view_id.clone();
            let Some(model) = self.manager.model(&view_id) else {
                let auto_expand = self.manager.config().auto_expand_single_child;
                self.manager.add_tree_model(Rc::new(TreeModel::new(
                    view_id,
                    self.provider.clone(),
                    auto_expand,
                )));
                continue;
            };

            model.handle_change(node).await?;
            if let Some(view) = self.manager.view(&view_id) {
                if view.state() == ViewState::Uninitialized && model.is_visible() {
                    // Shown panel whose first root fetch failed
                    view.init().await?;
                }
                view.pump().await?;
            }
        }
        Ok(())
    }

    /// Run a top-level command
    pub async fn execute(&self, command: TreeViewCommand) -> Result<()> {
        debug!(?command, "Executing tree view command");
        match command {
            TreeViewCommand::ToggleAll => self.manager.toggle_all().await,
            TreeViewCommand::Toggle(name) => self.manager.toggle_one(&name).await,
            TreeViewCommand::View(action) => self.manager.apply_action(action).await.map(|_| ()),
            TreeViewCommand::Pick => {
                let titles = TreeAction::ALL.iter().map(|a| a.title().to_string()).collect();
                match self.host.quick_pick(titles).await? {
                    Some(idx) => match TreeAction::ALL.get(idx) {
                        Some(action) => self.manager.apply_action(*action).await.map(|_| ()),
                        None => Ok(()),
                    },
                    None => Ok(()),
                }
            }
            TreeViewCommand::Hidden(name) => {
                self.manager.view_hidden(&name);
                Ok(())
            }
            TreeViewCommand::Reveal { view, locator } => {
                self.manager.reveal_in_tree(&view, &locator).await.map(|_| ())
            }
        }
    }

    /// Window a "jump to location" command should open its target in
    pub async fn prepare_window_for_goto(&self) -> Result<WindowId> {
        self.manager.prepare_window_for_goto().await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.manager.dispose().await
    }
}

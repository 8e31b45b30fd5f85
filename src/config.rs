use crate::app::actions::TreeAction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Configuration of the tree view panels (`treeviews` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeViewsConfig {
    /// Panels opened by toggle-all, in order
    #[serde(default = "default_initial_views")]
    pub initial_views: Vec<TreeViewDescription>,

    /// Width of a freshly created panel column
    #[serde(default = "default_initial_width")]
    pub initial_width: u16,

    #[serde(default)]
    pub alignment: Alignment,

    /// Expanding a node whose only child is expandable keeps expanding
    #[serde(default = "default_true")]
    pub auto_expand_single_child: bool,

    /// How long a placement directive from "execute command" stays valid
    #[serde(default = "default_goto_recency_ms")]
    pub goto_recency_ms: u64,

    #[serde(default)]
    pub keys: TreeViewKeys,

    #[serde(default)]
    pub glyphs: Glyphs,
}

/// Initial layout entry for one tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeViewDescription {
    pub name: String,
    /// Height weight relative to the other open panels
    #[serde(default = "default_size")]
    pub size: u32,
    /// Id paths (outermost first) expanded when the panel is first opened
    #[serde(default)]
    pub expanded: Vec<Vec<String>>,
}

/// Side of the editor the panel column opens on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Right,
}

impl Alignment {
    pub fn opposite(self) -> Self {
        match self {
            Alignment::Left => Alignment::Right,
            Alignment::Right => Alignment::Left,
        }
    }
}

/// Key sequence bound to each tree action in a panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeViewKeys {
    pub toggle_node: String,
    pub force_children_reload: String,
    pub goto_parent_node: String,
    pub goto_first_child: String,
    pub goto_last_child: String,
    pub goto_prev_sibling: String,
    pub goto_next_sibling: String,
    pub execute_command: String,
    pub execute_command_and_open_split: String,
    pub execute_command_and_open_v_split: String,
    pub execute_command_and_open_tab: String,
}

impl Default for TreeViewKeys {
    fn default() -> Self {
        Self {
            toggle_node: "<CR>".to_string(),
            force_children_reload: "f".to_string(),
            goto_parent_node: "p".to_string(),
            goto_first_child: "K".to_string(),
            goto_last_child: "J".to_string(),
            goto_prev_sibling: "k".to_string(),
            goto_next_sibling: "j".to_string(),
            execute_command: "r".to_string(),
            execute_command_and_open_split: "s".to_string(),
            execute_command_and_open_v_split: "v".to_string(),
            execute_command_and_open_tab: "t".to_string(),
        }
    }
}

impl TreeViewKeys {
    /// All (key, action) pairs to bind on a tree surface
    pub fn bindings(&self) -> Vec<(&str, TreeAction)> {
        vec![
            (self.toggle_node.as_str(), TreeAction::ToggleNode),
            (
                self.force_children_reload.as_str(),
                TreeAction::ForceChildrenReload,
            ),
            (self.goto_parent_node.as_str(), TreeAction::ParentNode),
            (self.goto_first_child.as_str(), TreeAction::FirstSibling),
            (self.goto_last_child.as_str(), TreeAction::LastSibling),
            (self.goto_prev_sibling.as_str(), TreeAction::PrevSibling),
            (self.goto_next_sibling.as_str(), TreeAction::NextSibling),
            (self.execute_command.as_str(), TreeAction::ExecuteCommand),
            (
                self.execute_command_and_open_split.as_str(),
                TreeAction::ExecuteCommandAndOpenSplit,
            ),
            (
                self.execute_command_and_open_v_split.as_str(),
                TreeAction::ExecuteCommandAndOpenVSplit,
            ),
            (
                self.execute_command_and_open_tab.as_str(),
                TreeAction::ExecuteCommandAndOpenTab,
            ),
        ]
    }
}

/// Expand/collapse glyphs drawn before expandable labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Glyphs {
    pub expanded: String,
    pub collapsed: String,
}

impl Default for Glyphs {
    fn default() -> Self {
        Self {
            expanded: "▾".to_string(),
            collapsed: "▸".to_string(),
        }
    }
}

fn default_initial_views() -> Vec<TreeViewDescription> {
    ["metalsPackages", "metalsCompile", "metalsBuild"]
        .into_iter()
        .map(|name| TreeViewDescription {
            name: name.to_string(),
            size: default_size(),
            expanded: Vec::new(),
        })
        .collect()
}

fn default_initial_width() -> u16 {
    40
}

fn default_true() -> bool {
    true
}

fn default_goto_recency_ms() -> u64 {
    1000
}

fn default_size() -> u32 {
    1
}

/// Weight used for open panels with no layout entry when nothing is configured
const FALLBACK_WEIGHT: u32 = 10;

impl Default for TreeViewsConfig {
    fn default() -> Self {
        Self {
            initial_views: default_initial_views(),
            initial_width: default_initial_width(),
            alignment: Alignment::default(),
            auto_expand_single_child: true,
            goto_recency_ms: default_goto_recency_ms(),
            keys: TreeViewKeys::default(),
            glyphs: Glyphs::default(),
        }
    }
}

impl TreeViewsConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: TreeViewsConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Layout entry for the named tree, if configured
    pub fn description(&self, name: &str) -> Option<&TreeViewDescription> {
        self.initial_views.iter().find(|d| d.name == name)
    }

    /// Position of the named tree in the initial layout
    pub fn layout_index(&self, name: &str) -> Option<usize> {
        self.initial_views.iter().position(|d| d.name == name)
    }

    /// Height weight of a panel.
    ///
    /// Panels without a layout entry get the smallest configured weight, so
    /// they never crowd out configured ones.
    pub fn weight_for(&self, name: &str) -> u32 {
        match self.description(name) {
            Some(desc) => desc.size,
            None => self
                .initial_views
                .iter()
                .map(|d| d.size)
                .min()
                .unwrap_or(FALLBACK_WEIGHT),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_width == 0 {
            return Err(ConfigError::Validation(
                "initialWidth must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for desc in &self.initial_views {
            if !seen.insert(desc.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "view {} is listed more than once in initialViews",
                    desc.name
                )));
            }
            if desc.size == 0 {
                return Err(ConfigError::Validation(format!(
                    "size of view {} must be greater than 0",
                    desc.name
                )));
            }
        }

        for (key, action) in self.keys.bindings() {
            if key.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "key for {} cannot be empty",
                    action.as_str()
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

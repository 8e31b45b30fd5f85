//! Host surface context.
//!
//! Everything the tree engine does to the editor goes through [`Host`]: text
//! surfaces holding the rendered rows, windows showing those surfaces, key
//! bindings, user messages and command execution. One host is created per
//! session and handed to the views and the panel manager explicitly.

pub mod memory;

use crate::app::actions::TreeAction;
use crate::config::Alignment;
use crate::error::Result;
use crate::protocol::NodeCommand;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::{MemoryHost, Row, SurfaceEdit};

/// Unique identifier for a line-addressable text surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u64);

/// Unique identifier for a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Direction of a split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitDirection {
    /// New window below the split one
    Horizontal,
    /// New window beside the split one
    Vertical,
}

/// Where a new panel window goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelPlacement {
    /// Full-height column at the given edge of the tab
    Edge { alignment: Alignment, width: u16 },
    /// Below an existing window, taking part of its height
    Below(WindowId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Editor-side operations used by tree views and the panel manager.
///
/// Rows, cursors and top rows are 0-based.
#[async_trait(?Send)]
pub trait Host {
    /// Create a named surface holding a single empty placeholder line
    async fn create_surface(&self, name: &str) -> Result<SurfaceId>;

    async fn close_surface(&self, surface: SurfaceId) -> Result<()>;

    async fn line_count(&self, surface: SurfaceId) -> Result<usize>;

    async fn lines(&self, surface: SurfaceId) -> Result<Vec<String>>;

    /// Insert `lines` so the first one ends up at row `at`
    async fn insert_lines(&self, surface: SurfaceId, at: usize, lines: Vec<String>) -> Result<()>;

    /// Remove `count` rows starting at `from`
    async fn remove_lines(&self, surface: SurfaceId, from: usize, count: usize) -> Result<()>;

    /// Attach a highlight group to a row
    async fn annotate_line(&self, surface: SurfaceId, line: usize, group: &str) -> Result<()>;

    /// Link highlight `group` to `target` unless the user already defined it
    async fn default_highlight_link(&self, group: &str, target: &str) -> Result<()>;

    /// Toggle whether the surface accepts edits
    async fn set_modifiable(&self, surface: SurfaceId, modifiable: bool) -> Result<()>;

    /// Route `key` pressed inside the surface to `action`
    async fn bind_key(&self, surface: SurfaceId, key: &str, action: TreeAction) -> Result<()>;

    /// Open a window showing `surface` and focus it
    async fn open_window(&self, surface: SurfaceId, placement: PanelPlacement) -> Result<WindowId>;

    async fn close_window(&self, window: WindowId) -> Result<()>;

    /// Windows of the current tab, in creation order
    async fn windows(&self) -> Result<Vec<WindowId>>;

    async fn current_window(&self) -> Result<WindowId>;

    async fn focus_window(&self, window: WindowId) -> Result<()>;

    async fn window_surface(&self, window: WindowId) -> Result<SurfaceId>;

    /// Every window (in any tab) showing `surface`
    async fn windows_showing(&self, surface: SurfaceId) -> Result<Vec<WindowId>>;

    async fn cursor(&self, window: WindowId) -> Result<usize>;

    async fn set_cursor(&self, window: WindowId, row: usize) -> Result<()>;

    async fn top_row(&self, window: WindowId) -> Result<usize>;

    async fn set_top_row(&self, window: WindowId, row: usize) -> Result<()>;

    async fn height(&self, window: WindowId) -> Result<usize>;

    async fn set_height(&self, window: WindowId, height: usize) -> Result<()>;

    async fn width(&self, window: WindowId) -> Result<u16>;

    /// Split `window`, focusing and returning the new one
    async fn split_window(&self, window: WindowId, direction: SplitDirection) -> Result<WindowId>;

    /// Open a new tab with an empty window and focus it
    async fn open_tab(&self) -> Result<WindowId>;

    /// Open an empty editing window along `alignment`, optionally with a fixed width
    async fn open_edge_window(&self, alignment: Alignment, width: Option<u16>) -> Result<WindowId>;

    fn show_message(&self, message: &str, level: MessageLevel);

    async fn execute_command(&self, command: &NodeCommand) -> Result<()>;

    /// Let the user choose one of `items`; `None` when dismissed
    async fn quick_pick(&self, items: Vec<String>) -> Result<Option<usize>>;
}

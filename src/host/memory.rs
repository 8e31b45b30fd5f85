//! Headless host keeping every surface and window in memory.
//!
//! Used by the `tvp-dump` tool and by tests. Besides implementing [`Host`]
//! it records surface edits, messages and executed commands so callers can
//! check exactly what the engine did.

use super::{Host, MessageLevel, PanelPlacement, SplitDirection, SurfaceId, WindowId};
use crate::app::actions::TreeAction;
use crate::config::Alignment;
use crate::error::{Result, TreeError};
use crate::protocol::NodeCommand;
use async_trait::async_trait;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};

/// One row of a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub text: String,
    pub highlight: Option<String>,
}

#[derive(Debug)]
struct Surface {
    name: String,
    rows: Vec<Row>,
    modifiable: bool,
    keys: Vec<(String, TreeAction)>,
}

#[derive(Debug, Clone)]
struct Window {
    surface: SurfaceId,
    tab: usize,
    cursor: usize,
    top_row: usize,
    height: usize,
    width: u16,
}

/// A row-level change applied to a surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEdit {
    Insert { surface: SurfaceId, at: usize, count: usize },
    Remove { surface: SurfaceId, from: usize, count: usize },
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    surfaces: BTreeMap<SurfaceId, Surface>,
    windows: BTreeMap<WindowId, Window>,
    current: Option<WindowId>,
    current_tab: usize,
    tab_count: usize,
    total_height: usize,
    total_width: u16,
    edits: Vec<SurfaceEdit>,
    messages: Vec<(MessageLevel, String)>,
    executed: Vec<NodeCommand>,
    picks: VecDeque<Option<usize>>,
    highlight_links: BTreeMap<String, String>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn surface(&self, id: SurfaceId) -> Result<&Surface> {
        self.surfaces
            .get(&id)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", id)))
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Result<&mut Surface> {
        self.surfaces
            .get_mut(&id)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", id)))
    }

    fn window(&self, id: WindowId) -> Result<&Window> {
        self.windows
            .get(&id)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", id)))
    }

    fn window_mut(&mut self, id: WindowId) -> Result<&mut Window> {
        self.windows
            .get_mut(&id)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", id)))
    }

    fn add_surface(&mut self, name: &str) -> SurfaceId {
        let id = SurfaceId(self.next_id());
        self.surfaces.insert(
            id,
            Surface {
                name: name.to_string(),
                rows: vec![Row {
                    text: String::new(),
                    highlight: None,
                }],
                modifiable: true,
                keys: Vec::new(),
            },
        );
        id
    }

    fn add_window(&mut self, window: Window) -> WindowId {
        let id = WindowId(self.next_id());
        self.windows.insert(id, window);
        self.current = Some(id);
        id
    }

    fn max_row(&self, surface: SurfaceId) -> usize {
        self.surfaces
            .get(&surface)
            .map(|s| s.rows.len().saturating_sub(1))
            .unwrap_or(0)
    }

    fn clamp_windows(&mut self, surface: SurfaceId) {
        let max_row = self.max_row(surface);
        for window in self.windows.values_mut().filter(|w| w.surface == surface) {
            window.cursor = window.cursor.min(max_row);
            window.top_row = window.top_row.min(max_row);
        }
    }
}

/// In-memory [`Host`] implementation
#[derive(Debug)]
pub struct MemoryHost {
    state: RefCell<State>,
}

impl MemoryHost {
    /// Create a host with one tab holding a single editing window of the given size
    pub fn new(width: u16, height: usize) -> Self {
        let mut state = State {
            total_height: height,
            total_width: width,
            tab_count: 1,
            ..State::default()
        };
        let surface = state.add_surface("[No Name]");
        state.add_window(Window {
            surface,
            tab: 0,
            cursor: 0,
            top_row: 0,
            height,
            width,
        });
        Self {
            state: RefCell::new(state),
        }
    }

    /// Text of every row of a surface
    pub fn text(&self, surface: SurfaceId) -> Vec<String> {
        self.state
            .borrow()
            .surfaces
            .get(&surface)
            .map(|s| s.rows.iter().map(|r| r.text.clone()).collect())
            .unwrap_or_default()
    }

    /// Rows of a surface including their highlight group
    pub fn rows(&self, surface: SurfaceId) -> Vec<Row> {
        self.state
            .borrow()
            .surfaces
            .get(&surface)
            .map(|s| s.rows.clone())
            .unwrap_or_default()
    }

    /// Surface with the given name, if open
    pub fn surface_named(&self, name: &str) -> Option<SurfaceId> {
        self.state
            .borrow()
            .surfaces
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| *id)
    }

    pub fn surface_name(&self, surface: SurfaceId) -> Option<String> {
        self.state
            .borrow()
            .surfaces
            .get(&surface)
            .map(|s| s.name.clone())
    }

    pub fn is_modifiable(&self, surface: SurfaceId) -> bool {
        self.state
            .borrow()
            .surfaces
            .get(&surface)
            .map(|s| s.modifiable)
            .unwrap_or(false)
    }

    /// Key bindings registered on a surface
    pub fn key_bindings(&self, surface: SurfaceId) -> Vec<(String, TreeAction)> {
        self.state
            .borrow()
            .surfaces
            .get(&surface)
            .map(|s| s.keys.clone())
            .unwrap_or_default()
    }

    /// Every row edit applied so far
    /// Group a highlight group is linked to
    pub fn highlight_link(&self, group: &str) -> Option<String> {
        self.state.borrow().highlight_links.get(group).cloned()
    }

    pub fn edits(&self) -> Vec<SurfaceEdit> {
        self.state.borrow().edits.clone()
    }

    pub fn clear_edits(&self) {
        self.state.borrow_mut().edits.clear();
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.state.borrow().messages.clone()
    }

    pub fn executed_commands(&self) -> Vec<NodeCommand> {
        self.state.borrow().executed.clone()
    }

    /// Queue the answer of the next quick pick
    pub fn push_pick(&self, choice: Option<usize>) {
        self.state.borrow_mut().picks.push_back(choice);
    }

    /// Index of the tab windows are currently opened in
    pub fn current_tab(&self) -> usize {
        self.state.borrow().current_tab
    }

    /// Total height available to a full-height column
    pub fn total_height(&self) -> usize {
        self.state.borrow().total_height
    }
}

#[async_trait(?Send)]
impl Host for MemoryHost {
    async fn create_surface(&self, name: &str) -> Result<SurfaceId> {
        Ok(self.state.borrow_mut().add_surface(name))
    }

    async fn close_surface(&self, surface: SurfaceId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state
            .surfaces
            .remove(&surface)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", surface)))?;
        state.windows.retain(|_, w| w.surface != surface);
        if state.current.is_some_and(|w| !state.windows.contains_key(&w)) {
            state.current = state.windows.keys().next().copied();
        }
        Ok(())
    }

    async fn line_count(&self, surface: SurfaceId) -> Result<usize> {
        Ok(self.state.borrow().surface(surface)?.rows.len())
    }

    async fn lines(&self, surface: SurfaceId) -> Result<Vec<String>> {
        Ok(self
            .state
            .borrow()
            .surface(surface)?
            .rows
            .iter()
            .map(|r| r.text.clone())
            .collect())
    }

    async fn insert_lines(&self, surface: SurfaceId, at: usize, lines: Vec<String>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let count = lines.len();
        let target = state.surface_mut(surface)?;
        if !target.modifiable {
            return Err(TreeError::host(format!("{} is not modifiable", surface)));
        }
        if at > target.rows.len() {
            return Err(TreeError::host(format!(
                "insert at row {} past the end of {}",
                at, surface
            )));
        }
        target.rows.splice(
            at..at,
            lines.into_iter().map(|text| Row {
                text,
                highlight: None,
            }),
        );
        state.edits.push(SurfaceEdit::Insert { surface, at, count });
        Ok(())
    }

    async fn remove_lines(&self, surface: SurfaceId, from: usize, count: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let target = state.surface_mut(surface)?;
        if !target.modifiable {
            return Err(TreeError::host(format!("{} is not modifiable", surface)));
        }
        let end = (from + count).min(target.rows.len());
        if from > end {
            return Err(TreeError::host(format!(
                "remove from row {} past the end of {}",
                from, surface
            )));
        }
        target.rows.drain(from..end);
        state.edits.push(SurfaceEdit::Remove {
            surface,
            from,
            count: end - from,
        });
        state.clamp_windows(surface);
        Ok(())
    }

    async fn annotate_line(&self, surface: SurfaceId, line: usize, group: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let row = state
            .surface_mut(surface)?
            .rows
            .get_mut(line)
            .ok_or_else(|| TreeError::host(format!("row {} out of range", line)))?;
        row.highlight = Some(group.to_string());
        Ok(())
    }

    async fn default_highlight_link(&self, group: &str, target: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .highlight_links
            .entry(group.to_string())
            .or_insert_with(|| target.to_string());
        Ok(())
    }

    async fn set_modifiable(&self, surface: SurfaceId, modifiable: bool) -> Result<()> {
        self.state.borrow_mut().surface_mut(surface)?.modifiable = modifiable;
        Ok(())
    }

    async fn bind_key(&self, surface: SurfaceId, key: &str, action: TreeAction) -> Result<()> {
        self.state
            .borrow_mut()
            .surface_mut(surface)?
            .keys
            .push((key.to_string(), action));
        Ok(())
    }

    async fn open_window(&self, surface: SurfaceId, placement: PanelPlacement) -> Result<WindowId> {
        let mut state = self.state.borrow_mut();
        state.surface(surface)?;
        let tab = state.current_tab;
        let window = match placement {
            PanelPlacement::Edge { width, .. } => Window {
                surface,
                tab,
                cursor: 0,
                top_row: 0,
                height: state.total_height,
                width,
            },
            PanelPlacement::Below(above) => {
                let above = state.window_mut(above)?;
                let height = above.height / 2;
                above.height -= height;
                Window {
                    surface,
                    tab,
                    cursor: 0,
                    top_row: 0,
                    height,
                    width: above.width,
                }
            }
        };
        Ok(state.add_window(window))
    }

    async fn close_window(&self, window: WindowId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let closed = state
            .windows
            .remove(&window)
            .ok_or_else(|| TreeError::host(format!("{} does not exist", window)))?;

        // The last window of a tab takes the whole screen
        let (height, width) = (state.total_height, state.total_width);
        let mut remaining = state.windows.values_mut().filter(|w| w.tab == closed.tab);
        if let (Some(last), None) = (remaining.next(), remaining.next()) {
            last.height = height;
            last.width = width;
        }

        if state.current == Some(window) {
            let tab = state.current_tab;
            state.current = state
                .windows
                .iter()
                .find(|(_, w)| w.tab == tab)
                .map(|(id, _)| *id);
        }
        Ok(())
    }

    async fn windows(&self) -> Result<Vec<WindowId>> {
        let state = self.state.borrow();
        Ok(state
            .windows
            .iter()
            .filter(|(_, w)| w.tab == state.current_tab)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn current_window(&self) -> Result<WindowId> {
        self.state
            .borrow()
            .current
            .ok_or_else(|| TreeError::host("no window is open"))
    }

    async fn focus_window(&self, window: WindowId) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let tab = state.window(window)?.tab;
        state.current = Some(window);
        state.current_tab = tab;
        Ok(())
    }

    async fn window_surface(&self, window: WindowId) -> Result<SurfaceId> {
        Ok(self.state.borrow().window(window)?.surface)
    }

    async fn windows_showing(&self, surface: SurfaceId) -> Result<Vec<WindowId>> {
        Ok(self
            .state
            .borrow()
            .windows
            .iter()
            .filter(|(_, w)| w.surface == surface)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn cursor(&self, window: WindowId) -> Result<usize> {
        Ok(self.state.borrow().window(window)?.cursor)
    }

    async fn set_cursor(&self, window: WindowId, row: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let surface = state.window(window)?.surface;
        let row = row.min(state.max_row(surface));
        state.window_mut(window)?.cursor = row;
        Ok(())
    }

    async fn top_row(&self, window: WindowId) -> Result<usize> {
        Ok(self.state.borrow().window(window)?.top_row)
    }

    async fn set_top_row(&self, window: WindowId, row: usize) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let surface = state.window(window)?.surface;
        let row = row.min(state.max_row(surface));
        state.window_mut(window)?.top_row = row;
        Ok(())
    }

    async fn height(&self, window: WindowId) -> Result<usize> {
        Ok(self.state.borrow().window(window)?.height)
    }

    async fn set_height(&self, window: WindowId, height: usize) -> Result<()> {
        self.state.borrow_mut().window_mut(window)?.height = height;
        Ok(())
    }

    async fn width(&self, window: WindowId) -> Result<u16> {
        Ok(self.state.borrow().window(window)?.width)
    }

    async fn split_window(&self, window: WindowId, direction: SplitDirection) -> Result<WindowId> {
        let mut state = self.state.borrow_mut();
        let source = state.window_mut(window)?;
        let mut split = source.clone();
        match direction {
            SplitDirection::Horizontal => {
                split.height = source.height / 2;
                source.height -= split.height;
            }
            SplitDirection::Vertical => {
                split.width = source.width / 2;
                source.width -= split.width;
            }
        }
        Ok(state.add_window(split))
    }

    async fn open_tab(&self) -> Result<WindowId> {
        let mut state = self.state.borrow_mut();
        let tab = state.tab_count;
        state.tab_count += 1;
        state.current_tab = tab;
        let surface = state.add_surface("[No Name]");
        let (height, width) = (state.total_height, state.total_width);
        Ok(state.add_window(Window {
            surface,
            tab,
            cursor: 0,
            top_row: 0,
            height,
            width,
        }))
    }

    async fn open_edge_window(&self, _alignment: Alignment, width: Option<u16>) -> Result<WindowId> {
        let mut state = self.state.borrow_mut();
        let surface = state.add_surface("[No Name]");
        let tab = state.current_tab;
        let (height, total_width) = (state.total_height, state.total_width);
        Ok(state.add_window(Window {
            surface,
            tab,
            cursor: 0,
            top_row: 0,
            height,
            width: width.unwrap_or(total_width),
        }))
    }

    fn show_message(&self, message: &str, level: MessageLevel) {
        tracing::debug!(?level, "{}", message);
        self.state
            .borrow_mut()
            .messages
            .push((level, message.to_string()));
    }

    async fn execute_command(&self, command: &NodeCommand) -> Result<()> {
        self.state.borrow_mut().executed.push(command.clone());
        Ok(())
    }

    async fn quick_pick(&self, _items: Vec<String>) -> Result<Option<usize>> {
        Ok(self.state.borrow_mut().picks.pop_front().flatten())
    }
}

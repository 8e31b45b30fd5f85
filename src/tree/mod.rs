//! Lazily populated trees and their text rendering.

pub mod decorations;
pub mod model;
pub mod node;
pub mod view;

pub use model::{optimize_update, TreeModel, TreeModelUpdate};
pub use node::{Node, NodeView};
pub use view::{TreeView, ViewState};

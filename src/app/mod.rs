//! Commands, panel layout and change routing.

pub mod actions;
pub mod controller;
pub mod tree_views;

pub use actions::{TreeAction, TreeViewCommand, WindowProp};
pub use controller::TreeViewController;
pub use tree_views::TreeViewsManager;

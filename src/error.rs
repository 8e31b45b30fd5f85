use thiserror::Error;

/// Errors surfaced by the tree view core.
///
/// Stale operations and unresolvable offsets are not errors; they come back
/// as `Ok(false)` / `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The collaborator rejected a children request
    #[error("failed to load children of {node}: {message}")]
    Fetch { node: String, message: String },

    /// The collaborator could not resolve a reveal path
    #[error("failed to resolve reveal path: {0}")]
    Reveal(String),

    /// A surface or window operation failed in the host
    #[error("host operation failed: {0}")]
    Host(String),

    #[error("Unknown view name {name}. Available values: {available}")]
    UnknownView { name: String, available: String },

    #[error("Information about Tree Views is not yet loaded. Please try a bit later.")]
    NotLoaded,

    #[error("no active tree view")]
    NoActiveTree,

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl TreeError {
    /// Build a fetch error for the node with the given id (`None` for the root)
    pub fn fetch(node: Option<&str>, message: impl Into<String>) -> Self {
        Self::Fetch {
            node: node.unwrap_or("<root>").to_string(),
            message: message.into(),
        }
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }

    pub fn unknown_view<'a>(name: &str, available: impl IntoIterator<Item = &'a str>) -> Self {
        Self::UnknownView {
            name: name.to_string(),
            available: available.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;

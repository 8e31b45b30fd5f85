use super::node::NodeView;
use crate::config::Glyphs;

/// Row category derived from a node's icon, used to pick the row highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    Trait,
    Class,
    Object,
    Method,
    Val,
    /// Build/debug actions (`command`, `sync`, `connect`, ...)
    Command,
    TopLevel,
}

impl NodeCategory {
    pub const ALL: [NodeCategory; 7] = [
        Self::Trait,
        Self::Class,
        Self::Object,
        Self::Method,
        Self::Val,
        Self::Command,
        Self::TopLevel,
    ];

    pub fn from_icon(icon: Option<&str>) -> Self {
        match icon {
            Some("trait") => Self::Trait,
            Some("class") => Self::Class,
            Some("object") => Self::Object,
            Some("method") => Self::Method,
            Some("val") => Self::Val,
            Some("command" | "sync" | "connect" | "cascade" | "cancel" | "clean" | "debug-stop") => {
                Self::Command
            }
            _ => Self::TopLevel,
        }
    }

    /// Highlight group attached to rows of this category
    pub fn highlight_group(self) -> &'static str {
        match self {
            Self::Trait => "TvpTrait",
            Self::Class => "TvpClass",
            Self::Object => "TvpObject",
            Self::Method => "TvpMethod",
            Self::Val => "TvpVal",
            Self::Command => "TvpCommand",
            Self::TopLevel => "TvpTopLevel",
        }
    }

    /// Editor highlight group each category links to by default
    pub fn default_link(self) -> &'static str {
        match self {
            Self::Trait => "Statement",
            Self::Class => "Constant",
            Self::Object => "PreProc",
            Self::Method => "Identifier",
            Self::Val => "Type",
            Self::Command => "Directory",
            Self::TopLevel => "MsgArea",
        }
    }
}

/// Render one visible node as a row.
///
/// Rows are indented two columns per level below the top, then carry the
/// expand/collapse glyph (or two blanks for leaves) and the label.
pub fn render_row(view: &NodeView, glyphs: &Glyphs) -> String {
    let indent = "  ".repeat(view.level.saturating_sub(1));
    let marker = if view.expandable {
        let glyph = if view.expanded {
            &glyphs.expanded
        } else {
            &glyphs.collapsed
        };
        format!("{} ", glyph)
    } else {
        "  ".to_string()
    };
    format!("{}{}{}", indent, marker, view.label())
}

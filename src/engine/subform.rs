//! Sub-form mounting: the ways a form embeds another form.
//!
//! All three entry points recurse through the same compose kernel. Depth
//! is bounded here; the original relied on users running out of patience.

use crate::engine::session::FormSession;

/// Maximum nesting depth of sub-forms below the main form.
pub const MAX_SUBFORM_DEPTH: usize = 4;

/// Why a sub-form is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubFormKind {
    /// Lookup modal: picking a search row writes back to `for_key` on the
    /// parent and closes the modal.
    Lookup { for_key: String },
    /// Inline re-embed of the parent's own design.
    SameMain,
    /// Toggleable advanced-search block over the parent's design.
    AdvancedSearch,
}

impl SubFormKind {
    pub fn title(&self) -> String {
        match self {
            SubFormKind::Lookup { for_key } => format!("Select {for_key}"),
            SubFormKind::SameMain => "Embedded form".to_string(),
            SubFormKind::AdvancedSearch => "Advanced search".to_string(),
        }
    }

    pub fn is_lookup(&self) -> bool {
        matches!(self, SubFormKind::Lookup { .. })
    }
}

/// A mounted sub-form: its reason plus a full nested session.
pub struct SubFormSession {
    pub kind: SubFormKind,
    pub session: FormSession,
}

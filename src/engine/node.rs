//! The declarative form tree a session renders to.
//!
//! The engine is headless: composing a session produces this tree and a
//! host front end walks it to draw concrete controls. Nodes carry
//! everything the host needs (labels, current values, option lists,
//! enablement) and nothing about how to paint them.

use serde_json::{Map, Value};

use crate::schema::PageData;

/// One selectable option of a select or checkbox-group widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

/// Upload progress of an image field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UploadState {
    #[default]
    Empty,
    Uploading {
        file_name: String,
    },
    Stored {
        file_url: String,
    },
}

/// Visible projection of one dynamic-table row.
#[derive(Debug, Clone)]
pub struct TableRowNode {
    /// Stable storage index, the handle row events carry.
    pub index: usize,
    pub key: String,
    pub key_locked: bool,
    pub deletable: bool,
    pub cells: Map<String, Value>,
}

/// The concrete control of a field node.
#[derive(Debug, Clone)]
pub enum FieldWidget {
    /// Hidden by a visibility rule; hosts render nothing. The hide check
    /// runs before widget construction, so hidden fields never carry
    /// widget state.
    Hidden,
    Text {
        value: String,
    },
    /// Text with a browse affordance that opens another form.
    Lookup {
        value: String,
        target_form: Option<String>,
    },
    /// Free-text search box feeding the form's search state.
    SearchText {
        value: String,
    },
    DateTime {
        value: String,
    },
    Time {
        value: String,
    },
    Currency {
        value: String,
    },
    Select {
        value: String,
        choices: Vec<Choice>,
        loading: bool,
    },
    Checkbox {
        checked: bool,
    },
    Button,
    Image {
        upload: UploadState,
    },
    /// Search-result table with pagination.
    SearchTable {
        page: Option<PageData<Value>>,
        searching: bool,
    },
    TableDynamic {
        rows: Vec<TableRowNode>,
    },
    Unsupported {
        tag: String,
    },
}

/// One rendered field or button.
#[derive(Debug, Clone)]
pub struct FieldNode {
    /// Bound column key; empty for buttons and unbound widgets.
    pub column_key: String,
    /// Declared code (`default.code`), the handle button events carry.
    pub code: Option<String>,
    pub label: String,
    pub required: bool,
    pub disabled: bool,
    /// Inline error rendered under the field.
    pub error: Option<String>,
    pub widget: FieldWidget,
}

impl FieldNode {
    pub fn is_hidden(&self) -> bool {
        matches!(self.widget, FieldWidget::Hidden)
    }
}

/// A panel or tab body.
#[derive(Debug, Clone)]
pub struct ViewNode {
    pub id: String,
    pub title: String,
    pub bordered: bool,
    pub fields: Vec<FieldNode>,
}

/// The tabbed portion of a layout.
#[derive(Debug, Clone)]
pub struct TabGroup {
    pub active: usize,
    pub tabs: Vec<ViewNode>,
}

/// One composed layout: plain panels plus an optional tab strip.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub panels: Vec<ViewNode>,
    pub tabs: Option<TabGroup>,
}

/// A sub-form mounted over the main form (lookup modal, inline embed).
#[derive(Debug, Clone)]
pub struct OverlayNode {
    pub title: String,
    pub tree: FormTree,
}

/// The complete rendered form.
#[derive(Debug, Clone)]
pub struct FormTree {
    pub form_id: String,
    pub layouts: Vec<LayoutNode>,
    pub overlay: Option<Box<OverlayNode>>,
}

impl FormTree {
    /// All fields of this tree in document order, tabs included. Does not
    /// descend into the overlay.
    pub fn fields(&self) -> impl Iterator<Item = &FieldNode> {
        self.layouts.iter().flat_map(|layout| {
            layout
                .panels
                .iter()
                .chain(layout.tabs.iter().flat_map(|group| group.tabs.iter()))
                .flat_map(|view| view.fields.iter())
        })
    }

    pub fn field(&self, column_key: &str) -> Option<&FieldNode> {
        self.fields().find(|field| field.column_key == column_key)
    }

    pub fn button(&self, code: &str) -> Option<&FieldNode> {
        self.fields()
            .find(|field| field.code.as_deref() == Some(code))
    }
}

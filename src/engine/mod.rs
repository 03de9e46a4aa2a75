//! The form engine: rule evaluation, value resolution, widget dispatch,
//! layout composition, and the session reducer that ties them together.

pub mod dispatch;
pub mod effect;
pub mod layout;
pub mod node;
pub mod options;
pub mod rules;
pub mod session;
pub mod state;
pub mod subform;
pub mod table;
pub mod value;
pub mod values;

pub use dispatch::{BuildCtx, InputRegistry, WidgetBuilder, registry};
pub use effect::{Effect, FormSignal};
pub use layout::{ComposeCtx, compose};
pub use node::{
    Choice, FieldNode, FieldWidget, FormTree, LayoutNode, OverlayNode, TabGroup, TableRowNode,
    UploadState, ViewNode,
};
pub use rules::{
    ButtonToggle, FormMode, check_rules, disable_button, disable_field, hidden_fields,
    is_button_hidden, is_field_hidden, is_field_required,
};
pub use session::{FormEvent, FormSession};
pub use state::{ChoiceState, SessionState};
pub use subform::{MAX_SUBFORM_DEPTH, SubFormKind, SubFormSession};
pub use table::{DynamicRow, RowLifecycle, RowSet};
pub use value::{evaluate_default, generate_control_value, generate_params, random_string};
pub use values::{ValueMap, ValueSource};

//! Input dispatch: one registered builder per `inputtype` tag.
//!
//! Adding a field type means registering a builder, not editing a switch.
//! Tags with no registered builder render as an explicit unsupported
//! placeholder. The hidden check runs before dispatch, so a hidden field
//! never constructs widget state; production forms rely on that ordering.

use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::engine::node::{FieldNode, FieldWidget, TableRowNode, UploadState};
use crate::engine::options;
use crate::engine::rules::{
    disable_button, disable_field, is_button_hidden, is_field_hidden, is_field_required,
};
use crate::engine::state::SessionState;
use crate::schema::{FormInput, InputType, RuleSet};

/// Everything a widget builder may read.
pub struct BuildCtx<'a> {
    pub state: &'a SessionState,
    pub rules: &'a RuleSet,
    pub language: &'a str,
}

/// Builds the widget for one input. Enablement, labels, and errors are
/// attached by the registry after the builder runs.
pub type WidgetBuilder = fn(&BuildCtx<'_>, &FormInput) -> FieldWidget;

/// Thread-safe registry from `inputtype` tag to widget builder.
pub struct InputRegistry {
    builders: RwLock<HashMap<String, WidgetBuilder>>,
}

impl InputRegistry {
    pub fn new() -> InputRegistry {
        InputRegistry { builders: RwLock::new(HashMap::new()) }
    }

    /// Registry preloaded with the stock builders.
    pub fn with_builtins() -> InputRegistry {
        let registry = InputRegistry::new();
        for (tag, builder) in BUILTIN_BUILDERS {
            // Stock tags are distinct; this cannot fail.
            let _ = registry.register(tag, *builder);
        }
        registry
    }

    /// Register a builder for a tag. Errors if the tag is taken.
    pub fn register(&self, tag: &str, builder: WidgetBuilder) -> anyhow::Result<()> {
        let mut builders = self.builders.write().unwrap();
        if builders.contains_key(tag) {
            anyhow::bail!("input type {tag:?} is already registered");
        }
        log::debug!("registered input type {tag}");
        builders.insert(tag.to_string(), builder);
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.builders.read().unwrap().contains_key(tag)
    }

    fn get(&self, tag: &str) -> Option<WidgetBuilder> {
        self.builders.read().unwrap().get(tag).copied()
    }

    /// Build the complete field node for one input.
    pub fn build_field(&self, ctx: &BuildCtx<'_>, input: &FormInput) -> FieldNode {
        let column_key = input.column_key().to_string();
        let code = input.default.code.clone();
        let label = input.label(ctx.language).to_string();
        let is_button = input.input_type == InputType::Button;
        let rule_key: &str = if is_button {
            code.as_deref().unwrap_or(&column_key)
        } else {
            &column_key
        };

        let hidden = if is_button {
            is_button_hidden(ctx.rules, rule_key)
        } else {
            is_field_hidden(ctx.rules, rule_key)
        };
        if hidden {
            return FieldNode {
                column_key,
                code,
                label,
                required: false,
                disabled: false,
                error: None,
                widget: FieldWidget::Hidden,
            };
        }

        let widget = match self.get(input.input_type.as_tag()) {
            Some(builder) => builder(ctx, input),
            None => FieldWidget::Unsupported { tag: input.input_type.as_tag().to_string() },
        };

        let disabled = if is_button {
            match ctx.state.button_disabled.get(rule_key) {
                // A click-time toggle overrides render-time evaluation.
                Some(toggled) => *toggled,
                None => input.default.disabled || disable_button(ctx.rules, rule_key, ctx.state.mode),
            }
        } else {
            input.default.disabled || disable_field(ctx.rules, rule_key, ctx.state.mode)
        };

        FieldNode {
            required: is_field_required(input),
            disabled,
            error: ctx.state.field_errors.get(rule_key).cloned(),
            column_key,
            code,
            label,
            widget,
        }
    }
}

impl Default for InputRegistry {
    fn default() -> Self {
        InputRegistry::with_builtins()
    }
}

static REGISTRY: Lazy<InputRegistry> = Lazy::new(InputRegistry::with_builtins);

/// The process-wide registry with the stock builders installed.
pub fn registry() -> &'static InputRegistry {
    &REGISTRY
}

// ---------------------------------------------------------------------------
// Stock builders

const BUILTIN_BUILDERS: &[(&str, WidgetBuilder)] = &[
    ("cTextInput", build_text),
    ("cTextInputFunc", build_lookup),
    ("cTextInputSearch", build_search_text),
    ("jInputDateTime", build_date_time),
    ("jInputTimeSheet", build_time),
    ("cImage", build_image),
    ("jCurrency", build_currency),
    ("jSelect", build_select),
    ("cCheckBox", build_checkbox),
    ("cButton", build_button),
    ("jTableSearch", build_search_table),
    ("cTableDynamic", build_table_dynamic),
];

fn build_text(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::Text { value: ctx.state.value_text(input.column_key()) }
}

fn build_lookup(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::Lookup {
        value: ctx.state.value_text(input.column_key()),
        target_form: input.config.call_form.clone(),
    }
}

fn build_search_text(ctx: &BuildCtx<'_>, _input: &FormInput) -> FieldWidget {
    FieldWidget::SearchText { value: ctx.state.search_text.clone() }
}

fn build_date_time(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::DateTime { value: ctx.state.value_text(input.column_key()) }
}

fn build_time(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::Time { value: ctx.state.value_text(input.column_key()) }
}

fn build_currency(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::Currency { value: ctx.state.value_text(input.column_key()) }
}

fn build_select(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    let (choices, loading) = match ctx.state.choice_state(input.column_key()) {
        Some(choice_state) => (choice_state.choices.clone(), choice_state.loading),
        None => (options::inline_choices(&input.config), false),
    };
    FieldWidget::Select {
        value: ctx.state.value_text(input.column_key()),
        choices,
        loading,
    }
}

fn build_checkbox(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    FieldWidget::Checkbox { checked: ctx.state.value_bool(input.column_key()) }
}

fn build_button(_ctx: &BuildCtx<'_>, _input: &FormInput) -> FieldWidget {
    FieldWidget::Button
}

fn build_image(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    let upload = match ctx.state.uploads.get(input.column_key()) {
        Some(upload) => upload.clone(),
        None => {
            // A record-loaded URL shows as stored even before any upload.
            let value = ctx.state.value_text(input.column_key());
            if value.is_empty() {
                UploadState::Empty
            } else {
                UploadState::Stored { file_url: value }
            }
        }
    };
    FieldWidget::Image { upload }
}

fn build_search_table(ctx: &BuildCtx<'_>, _input: &FormInput) -> FieldWidget {
    FieldWidget::SearchTable {
        page: ctx.state.search_results.clone(),
        searching: ctx.state.searching,
    }
}

fn build_table_dynamic(ctx: &BuildCtx<'_>, input: &FormInput) -> FieldWidget {
    let rows = match ctx.state.table(input.column_key()) {
        Some(set) => set
            .visible()
            .map(|(index, row)| TableRowNode {
                index,
                key: row.key.clone(),
                key_locked: row.is_main_key,
                deletable: !row.is_main_key,
                cells: row.values.clone(),
            })
            .collect(),
        None => Vec::new(),
    };
    FieldWidget::TableDynamic { rows }
}

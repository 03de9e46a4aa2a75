//! Typed model of a server-delivered form design.
//!
//! The form-design service emits one JSON document per form:
//! `form_design_detail { form_id, info.ruleStrong, list_layout }` with
//! layouts containing views containing inputs. The wire shape is stringly
//! (`"isTab": "true"`, `;`-joined lists, JSON-in-a-string payloads);
//! everything is decoded exactly once here and the engine only ever sees the
//! typed result.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::input_type::InputType;
use super::row_action::RowAction;
use super::rules::RuleSet;
use super::txfo::TxFoSource;

/// A complete parsed form design: layouts plus the rule list.
#[derive(Debug, Clone)]
pub struct FormDesign {
    pub form_id: String,
    pub layouts: Vec<FormLayout>,
    pub rules: RuleSet,
}

/// One visual block of a page.
#[derive(Debug, Clone)]
pub struct FormLayout {
    pub id: String,
    pub code_hidden: Option<String>,
    pub views: Vec<FormView>,
}

/// A region within a layout; either a plain panel or a tab member.
#[derive(Debug, Clone)]
pub struct FormView {
    pub id: String,
    pub name: String,
    pub is_tab: bool,
    pub is_border: bool,
    pub code_hidden: Option<String>,
    pub inputs: Vec<FormInput>,
}

/// One field or button.
#[derive(Debug, Clone)]
pub struct FormInput {
    pub input_type: InputType,
    pub default: InputDefault,
    pub config: InputConfig,
    pub title: LocaleText,
    pub validate: ValidateSpec,
    /// Last segment of `config.structable_read`, derived once. Empty when
    /// the input binds no storage path.
    column_key: String,
}

impl FormInput {
    /// The name this input binds its value under. Two inputs whose
    /// `structable_read` paths share a tail collide silently; the integrity
    /// checker reports that, the engine itself is last-write-wins.
    pub fn column_key(&self) -> &str {
        &self.column_key
    }

    /// Display label: localized title first, then the declared name, then
    /// the column key.
    pub fn label(&self, language: &str) -> &str {
        self.title
            .get(language)
            .or(self.default.name.as_deref())
            .unwrap_or(&self.column_key)
    }
}

/// The `default` block: identity and static markers of an input.
#[derive(Debug, Clone, Default)]
pub struct InputDefault {
    pub code: Option<String>,
    pub name: Option<String>,
    pub class: Option<String>,
    pub condition: Option<String>,
    /// Schema-declared static disable; combined with rule evaluation.
    pub disabled: bool,
    pub code_hidden: Option<String>,
}

impl InputDefault {
    /// The field-level required marker the rule layer projects.
    pub fn is_required(&self) -> bool {
        self.condition.as_deref() == Some("required")
    }
}

/// Typed view over the free-form `config` map. Unrecognized keys are kept
/// in `extra` so nothing the designer wrote is lost.
#[derive(Debug, Clone, Default)]
pub struct InputConfig {
    pub structable_read: Option<String>,
    pub data_default: Option<DefaultExpr>,
    /// Inline option items, used when a select has no remote source.
    pub data_value: Vec<Value>,
    /// Sibling column keys whose values parameterize the option fetch.
    pub col_filter: Vec<String>,
    pub key_selected: Option<String>,
    pub key_display: Option<String>,
    pub tx: Option<TxFoSource>,
    pub row_select: Option<RowAction>,
    /// Upload folder (`store`).
    pub folder: Option<String>,
    /// Accepted upload extensions, lowercase with leading dot.
    pub accept: Vec<String>,
    pub max_size_mb: Option<u64>,
    /// Main-key row names for dynamic tables (`defaultkey`).
    pub default_keys: Vec<String>,
    /// Target form of a lookup (`callform`).
    pub call_form: Option<String>,
    /// Re-embed the current main form inline (`samemain`).
    pub same_main: bool,
    pub extra: Map<String, Value>,
}

/// A `data_default` expression. Literal unless prefixed with `@`.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultExpr {
    Literal(String),
    Today,
    Now,
    Random { len: usize },
}

impl DefaultExpr {
    pub fn parse(raw: &str) -> DefaultExpr {
        match raw {
            "@today" => DefaultExpr::Today,
            "@now" => DefaultExpr::Now,
            other if other.starts_with("@random") => {
                let len = other
                    .strip_prefix("@random:")
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(16);
                DefaultExpr::Random { len }
            }
            other => DefaultExpr::Literal(other.to_string()),
        }
    }
}

/// Range constraints from the `validate` block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateSpec {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Localized titles keyed by locale code.
#[derive(Debug, Clone, Default)]
pub struct LocaleText(BTreeMap<String, String>);

impl LocaleText {
    pub fn get(&self, language: &str) -> Option<&str> {
        self.0
            .get(language)
            .or_else(|| self.0.values().next())
            .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Wire decoding

#[derive(Debug, Deserialize)]
struct RawDesignRoot {
    form_design_detail: RawDesign,
}

#[derive(Debug, Deserialize)]
struct RawDesign {
    #[serde(default)]
    form_id: String,
    #[serde(default)]
    info: RawDesignInfo,
    #[serde(default)]
    list_layout: Vec<RawLayout>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDesignInfo {
    #[serde(rename = "ruleStrong", default)]
    rule_strong: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLayout {
    #[serde(default)]
    id: String,
    #[serde(rename = "codeHidden", default)]
    code_hidden: Option<String>,
    #[serde(rename = "list_view", default)]
    list_view: Vec<RawView>,
}

#[derive(Debug, Deserialize)]
struct RawView {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "isTab", default)]
    is_tab: Option<Value>,
    #[serde(rename = "isBorder", default)]
    is_border: Option<Value>,
    #[serde(rename = "codeHidden", default)]
    code_hidden: Option<String>,
    #[serde(rename = "list_input", default)]
    list_input: Vec<RawInput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    #[serde(default)]
    inputtype: String,
    #[serde(default)]
    default: RawDefault,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    lang: RawLang,
    #[serde(default)]
    validate: RawValidate,
}

#[derive(Debug, Default, Deserialize)]
struct RawDefault {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    disabled: Option<Value>,
    #[serde(rename = "codeHidden", default)]
    code_hidden: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLang {
    #[serde(default)]
    title: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawValidate {
    #[serde(default)]
    min: Option<Value>,
    #[serde(default)]
    max: Option<Value>,
}

/// The form service emits booleans as `"true"`/`"false"` strings; newer
/// endpoints use real booleans. Anything else is treated as the default.
fn stringly_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

fn loose_number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn config_str(config: &Map<String, Value>, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

const TYPED_CONFIG_KEYS: &[&str] = &[
    "structable_read",
    "data_default",
    "data_value",
    "col_filter",
    "key_selected",
    "key_display",
    "txFo",
    "actionFo_RowSelect",
    "store",
    "accept",
    "max_size_mb",
    "defaultkey",
    "callform",
    "samemain",
];

impl InputConfig {
    fn from_raw(mut raw: Map<String, Value>) -> InputConfig {
        let structable_read = config_str(&raw, "structable_read");
        let data_default = config_str(&raw, "data_default").map(|s| DefaultExpr::parse(&s));
        let data_value = match raw.get("data_value") {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(s)) => serde_json::from_str::<Vec<Value>>(s).unwrap_or_default(),
            _ => Vec::new(),
        };
        let col_filter = config_str(&raw, "col_filter")
            .map(|s| split_list(&s))
            .unwrap_or_default();
        let tx = config_str(&raw, "txFo").map(|s| TxFoSource::parse(&s));
        let row_select = raw.get("actionFo_RowSelect").map(RowAction::parse);
        let accept = config_str(&raw, "accept")
            .map(|s| {
                split_list(&s)
                    .into_iter()
                    .map(|ext| {
                        let ext = ext.to_ascii_lowercase();
                        if ext.starts_with('.') { ext } else { format!(".{ext}") }
                    })
                    .collect()
            })
            .unwrap_or_default();
        let max_size_mb = loose_number(raw.get("max_size_mb")).map(|n| n as u64);
        let default_keys = config_str(&raw, "defaultkey")
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let config = InputConfig {
            structable_read,
            data_default,
            data_value,
            col_filter,
            key_selected: config_str(&raw, "key_selected"),
            key_display: config_str(&raw, "key_display"),
            tx,
            row_select,
            folder: config_str(&raw, "store"),
            accept,
            max_size_mb,
            default_keys,
            call_form: config_str(&raw, "callform"),
            same_main: stringly_bool(raw.get("samemain"), false),
            extra: Map::new(),
        };
        for key in TYPED_CONFIG_KEYS {
            raw.remove(*key);
        }
        InputConfig { extra: raw, ..config }
    }
}

impl FormInput {
    fn from_raw(raw: RawInput) -> FormInput {
        let config = InputConfig::from_raw(raw.config);
        let column_key = config
            .structable_read
            .as_deref()
            .and_then(|path| path.split('.').next_back())
            .unwrap_or_default()
            .to_string();
        FormInput {
            input_type: InputType::from_tag(&raw.inputtype),
            default: InputDefault {
                code: raw.default.code,
                name: raw.default.name,
                class: raw.default.class,
                condition: raw.default.condition,
                disabled: stringly_bool(raw.default.disabled.as_ref(), false),
                code_hidden: raw.default.code_hidden,
            },
            config,
            title: LocaleText(raw.lang.title),
            validate: ValidateSpec {
                min: loose_number(raw.validate.min.as_ref()),
                max: loose_number(raw.validate.max.as_ref()),
            },
            column_key,
        }
    }
}

impl FormDesign {
    /// Decode a form design from the wire document. Accepts both the full
    /// `{form_design_detail: ...}` envelope and an already-unwrapped detail.
    pub fn from_value(root: Value) -> anyhow::Result<FormDesign> {
        let detail = if root.get("form_design_detail").is_some() {
            serde_json::from_value::<RawDesignRoot>(root)
                .context("decoding form design envelope")?
                .form_design_detail
        } else {
            serde_json::from_value::<RawDesign>(root).context("decoding form design detail")?
        };

        let layouts = detail
            .list_layout
            .into_iter()
            .map(|layout| FormLayout {
                id: layout.id,
                code_hidden: layout.code_hidden,
                views: layout
                    .list_view
                    .into_iter()
                    .map(|view| FormView {
                        id: view.id,
                        name: view.name,
                        is_tab: stringly_bool(view.is_tab.as_ref(), false),
                        is_border: stringly_bool(view.is_border.as_ref(), false),
                        code_hidden: view.code_hidden,
                        inputs: view.list_input.into_iter().map(FormInput::from_raw).collect(),
                    })
                    .collect(),
            })
            .collect();

        Ok(FormDesign {
            form_id: detail.form_id,
            layouts,
            rules: RuleSet::parse(&detail.info.rule_strong),
        })
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<FormDesign> {
        let value: Value = serde_json::from_str(raw).context("form design is not valid JSON")?;
        FormDesign::from_value(value)
    }

    /// All leaf inputs in document order (layout, then view, then input).
    pub fn inputs(&self) -> impl Iterator<Item = &FormInput> {
        self.layouts
            .iter()
            .flat_map(|layout| layout.views.iter())
            .flat_map(|view| view.inputs.iter())
    }

    /// First input bound under `column_key`, document order.
    pub fn input_by_key(&self, column_key: &str) -> Option<&FormInput> {
        self.inputs()
            .find(|input| input.column_key() == column_key)
    }
}

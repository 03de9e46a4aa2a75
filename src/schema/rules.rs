//! Declarative rule records and their parse-once typed form.
//!
//! Rules arrive as `ruleStrong` rows with string-encoded config
//! (`;`-joined field lists, `"true"`/`"false"` flags, a JSON-string `txFo`).
//! [`RuleSet::parse`] decodes all of that a single time; evaluation never
//! re-parses. Document order is preserved because disable evaluation is
//! first-match while hide evaluation scans every rule.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use super::txfo::TxFoSource;

/// Discriminator of a rule record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleCode {
    Visibility,
    VisibilityButton,
    VisibilityModify,
    RunFo,
    ManagerComponent,
    Other(String),
}

impl RuleCode {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "visibility" => RuleCode::Visibility,
            "visibilitybutton" => RuleCode::VisibilityButton,
            "visibilitymodify" => RuleCode::VisibilityModify,
            "runFo" => RuleCode::RunFo,
            "managerComponent" => RuleCode::ManagerComponent,
            other => RuleCode::Other(other.to_string()),
        }
    }

    pub fn as_tag(&self) -> &str {
        match self {
            RuleCode::Visibility => "visibility",
            RuleCode::VisibilityButton => "visibilitybutton",
            RuleCode::VisibilityModify => "visibilitymodify",
            RuleCode::RunFo => "runFo",
            RuleCode::ManagerComponent => "managerComponent",
            RuleCode::Other(tag) => tag,
        }
    }
}

/// The component event a rule is scoped to. `on_change` rules drive render
/// time decisions; `on_click` rules are consumed at button press time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleEvent {
    OnChange,
    OnClick,
    Other,
    Unscoped,
}

impl RuleEvent {
    fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("on_change") => RuleEvent::OnChange,
            Some("on_click") => RuleEvent::OnClick,
            Some(_) => RuleEvent::Other,
            None => RuleEvent::Unscoped,
        }
    }
}

/// The `;`-joined `component_result` list as an exact-membership set.
#[derive(Debug, Clone, Default)]
pub struct FieldKeySet(Vec<String>);

impl FieldKeySet {
    pub fn parse(raw: &str) -> Self {
        FieldKeySet(
            raw.split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Exact code membership; no pattern matching.
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One rule record with every string-encoded part decoded.
#[derive(Debug, Clone)]
pub struct Rule {
    pub code: RuleCode,
    pub in_use: bool,
    pub event: RuleEvent,
    /// `component_action`: the single field a `runFo` rule resolves.
    pub action: Option<String>,
    /// `component_result`: the fields the rule applies to.
    pub result_keys: FieldKeySet,
    /// `ena_dis == "true"` means the rule disables its listed fields.
    pub ena_dis: bool,
    /// `visible == "false"` means the rule hides its listed fields.
    pub visible: bool,
    /// Decoded `txFo`, decode failures retained for use-time reporting.
    pub tx: Option<TxFoSource>,
    /// `component_manager`: controller field -> managed component codes.
    pub managed: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    code: String,
    #[serde(rename = "inUse", default = "default_true")]
    in_use: bool,
    #[serde(default)]
    config: RawRuleConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawRuleConfig {
    #[serde(default)]
    component_event: Option<String>,
    #[serde(default)]
    component_action: Option<String>,
    #[serde(default)]
    component_result: Option<String>,
    #[serde(default)]
    ena_dis: Option<String>,
    #[serde(default)]
    visible: Option<String>,
    #[serde(rename = "txFo", default)]
    tx_fo: Option<String>,
    #[serde(default)]
    component_manager: Option<Value>,
}

fn default_true() -> bool {
    true
}

fn flag(raw: Option<&str>, default: bool) -> bool {
    match raw {
        Some("true") => true,
        Some("false") => false,
        _ => default,
    }
}

fn parse_manager(raw: Option<&Value>) -> HashMap<String, Vec<String>> {
    let mut managed = HashMap::new();
    let value = match raw {
        // Sometimes double-encoded as a JSON string, sometimes inline.
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(inner) => inner,
            Err(_) => return managed,
        },
        Some(v) => v.clone(),
        None => return managed,
    };
    if let Value::Object(map) = value {
        for (controller, targets) in map {
            let codes = match targets {
                Value::String(list) => FieldKeySet::parse(&list).0,
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            managed.insert(controller, codes);
        }
    }
    managed
}

impl Rule {
    fn from_raw(raw: RawRule) -> Self {
        let config = raw.config;
        Rule {
            code: RuleCode::from_tag(&raw.code),
            in_use: raw.in_use,
            event: RuleEvent::from_tag(config.component_event.as_deref()),
            action: config.component_action.filter(|a| !a.is_empty()),
            result_keys: config
                .component_result
                .as_deref()
                .map(FieldKeySet::parse)
                .unwrap_or_default(),
            // Defaults are the permissive direction: not disabling, visible.
            ena_dis: flag(config.ena_dis.as_deref(), false),
            visible: flag(config.visible.as_deref(), true),
            tx: config.tx_fo.as_deref().map(TxFoSource::parse),
            managed: parse_manager(config.component_manager.as_ref()),
        }
    }
}

/// All rules of one form design, in document order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Decode the wire `ruleStrong` array. Rows that fail to decode are
    /// dropped with a warning — a broken rule must not take the form down.
    pub fn parse(raw: &[Value]) -> RuleSet {
        let mut rules = Vec::with_capacity(raw.len());
        for (index, row) in raw.iter().enumerate() {
            match serde_json::from_value::<RawRule>(row.clone()) {
                Ok(raw_rule) => rules.push(Rule::from_raw(raw_rule)),
                Err(err) => {
                    log::warn!("dropping undecodable rule record #{index}: {err}");
                }
            }
        }
        RuleSet { rules }
    }

    pub fn from_rules(rules: Vec<Rule>) -> RuleSet {
        RuleSet { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All in-use rules in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(|rule| rule.in_use)
    }

    /// In-use rules with the given code, document order preserved.
    pub fn with_code(&self, code: &RuleCode) -> impl Iterator<Item = &Rule> {
        self.iter().filter(move |rule| &rule.code == code)
    }

    /// The first `visibility` rule in document order, if any. Disable
    /// evaluation consults only this one.
    pub fn first_visibility(&self) -> Option<&Rule> {
        self.with_code(&RuleCode::Visibility).next()
    }

    /// The first `visibilitybutton` rule in document order, if any.
    pub fn first_button_rule(&self) -> Option<&Rule> {
        self.with_code(&RuleCode::VisibilityButton).next()
    }

    /// The `runFo` rule resolving `column_key`, matched on `component_action`.
    pub fn run_fo_for(&self, column_key: &str) -> Option<&Rule> {
        self.with_code(&RuleCode::RunFo)
            .find(|rule| rule.action.as_deref() == Some(column_key))
    }

    /// Component codes managed by `controller` across all manager rules.
    pub fn managed_components(&self, controller: &str) -> Vec<&str> {
        self.with_code(&RuleCode::ManagerComponent)
            .flat_map(|rule| rule.managed.get(controller))
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

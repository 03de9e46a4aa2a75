//! Rule evaluation: hidden, disabled, and required decisions for fields and
//! buttons, computed as independent pure functions over the parsed rule set.
//!
//! Two deliberately different lookup policies coexist here. Hide checks scan
//! every `visibility` rule; disable checks consult only the first one in
//! document order. Forms in production depend on the shadowing the
//! first-match policy produces, so both policies are kept under distinctly
//! named functions rather than unified.

use std::collections::{BTreeMap, HashSet};

use crate::schema::{FormInput, RuleCode, RuleEvent, RuleSet};

/// Interaction mode of a form session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    View,
    Add,
    Modify,
}

impl FormMode {
    pub fn is_modify(self) -> bool {
        self == FormMode::Modify
    }
}

/// True iff any `visibility` rule lists the field, is change-scoped, and
/// declares it invisible. Click-scoped rules never hide.
pub fn is_field_hidden(rules: &RuleSet, column_key: &str) -> bool {
    rules.with_code(&RuleCode::Visibility).any(|rule| {
        rule.result_keys.contains(column_key)
            && rule.event == RuleEvent::OnChange
            && !rule.visible
    })
}

/// All field keys hidden under the same policy as [`is_field_hidden`].
pub fn hidden_fields(rules: &RuleSet) -> HashSet<String> {
    let mut hidden = HashSet::new();
    for rule in rules.with_code(&RuleCode::Visibility) {
        if rule.event == RuleEvent::OnChange && !rule.visible {
            hidden.extend(rule.result_keys.iter().map(str::to_string));
        }
    }
    hidden
}

/// Whether the field is disabled for interaction.
///
/// In modify mode any `visibilitymodify` rule listing the field wins
/// outright. Otherwise only the first `visibility` rule is consulted and
/// each early branch returns "enabled", so a disabling rule later in the
/// document is shadowed. See the module note before changing this.
pub fn disable_field(rules: &RuleSet, column_key: &str, mode: FormMode) -> bool {
    if mode.is_modify() {
        return rules
            .with_code(&RuleCode::VisibilityModify)
            .any(|rule| rule.result_keys.contains(column_key));
    }
    let Some(rule) = rules.first_visibility() else {
        return false;
    };
    if !rule.ena_dis {
        return false;
    }
    if !rule.result_keys.contains(column_key) {
        return false;
    }
    if rule.event != RuleEvent::OnChange {
        return false;
    }
    true
}

/// Required is a static marker on the input, not a rule outcome.
pub fn is_field_required(input: &FormInput) -> bool {
    input.default.is_required()
}

/// Buttons mirror field hiding through `visibilitybutton` rules, keyed by
/// the button's declared code.
pub fn is_button_hidden(rules: &RuleSet, button_code: &str) -> bool {
    rules.with_code(&RuleCode::VisibilityButton).any(|rule| {
        rule.result_keys.contains(button_code)
            && rule.event == RuleEvent::OnChange
            && !rule.visible
    })
}

/// Render-time disable for a button: first `visibilitybutton` rule only,
/// same branch order as [`disable_field`].
pub fn disable_button(rules: &RuleSet, button_code: &str, mode: FormMode) -> bool {
    if mode.is_modify() {
        return rules
            .with_code(&RuleCode::VisibilityModify)
            .any(|rule| rule.result_keys.contains(button_code));
    }
    let Some(rule) = rules.first_button_rule() else {
        return false;
    };
    if !rule.ena_dis {
        return false;
    }
    if !rule.result_keys.contains(button_code) {
        return false;
    }
    if rule.event != RuleEvent::OnChange {
        return false;
    }
    true
}

/// One click-time enablement change for a button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonToggle {
    pub button: String,
    pub disabled: bool,
}

/// Click-time rule pass for `clicked`. Scans click-scoped `visibilitybutton`
/// rules that list the clicked button and applies their disable flag to
/// every listed button. Returns the toggles for the session reducer to
/// apply instead of mutating anything here.
///
/// In modify mode an enabling rule beats any disabling one for the same
/// button; outside modify mode the last rule in document order wins.
pub fn check_rules(rules: &RuleSet, clicked: &str, mode: FormMode) -> Vec<ButtonToggle> {
    let mut outcome: BTreeMap<String, bool> = BTreeMap::new();
    for rule in rules.with_code(&RuleCode::VisibilityButton) {
        if rule.event != RuleEvent::OnClick {
            continue;
        }
        if !rule.result_keys.contains(clicked) {
            continue;
        }
        for key in rule.result_keys.iter() {
            outcome
                .entry(key.to_string())
                .and_modify(|disabled| {
                    if mode.is_modify() {
                        *disabled = *disabled && rule.ena_dis;
                    } else {
                        *disabled = rule.ena_dis;
                    }
                })
                .or_insert(rule.ena_dis);
        }
    }
    outcome
        .into_iter()
        .map(|(button, disabled)| ButtonToggle { button, disabled })
        .collect()
}

//! Design-time lint for form documents.
//!
//! The engine itself is deliberately permissive at runtime; this checker is
//! where design mistakes surface instead. `dynaform validate` prints the
//! report, and operators run it against a form service before rollout.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::form::FormDesign;
use super::input_type::InputType;
use super::rules::RuleCode;
use super::txfo::TxFoSource;

static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Finding {
    pub severity: Severity,
    pub code: &'static str,
    /// Column key, rule code, or view id the finding points at.
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub findings: Vec<Finding>,
}

impl IntegrityReport {
    pub fn check(design: &FormDesign) -> IntegrityReport {
        let mut report = IntegrityReport::default();
        report.check_inputs(design);
        report.check_rules(design);
        report
    }

    fn check_inputs(&mut self, design: &FormDesign) {
        let mut seen_keys: HashMap<&str, usize> = HashMap::new();

        for input in design.inputs() {
            let key = input.column_key();
            let subject = if key.is_empty() {
                input
                    .default
                    .code
                    .clone()
                    .unwrap_or_else(|| input.input_type.as_tag().to_string())
            } else {
                key.to_string()
            };

            if let InputType::Unsupported(tag) = &input.input_type {
                self.warn(
                    "unsupported-input-type",
                    &subject,
                    format!("input type {tag:?} has no renderer and will show as a placeholder"),
                );
            }

            if input.input_type.binds_value() && input.config.structable_read.is_none() {
                self.error(
                    "missing-structable-read",
                    &subject,
                    "input binds a value but declares no structable_read path".to_string(),
                );
            }

            if !key.is_empty() {
                if !IDENT_RE.is_match(key) {
                    self.warn(
                        "non-identifier-key",
                        &subject,
                        format!("column key {key:?} is not a plain identifier"),
                    );
                }
                let count = seen_keys.entry(key).or_insert(0);
                *count += 1;
                if *count == 2 {
                    self.error(
                        "duplicate-column-key",
                        &subject,
                        format!("column key {key:?} is bound by more than one input; values overwrite each other"),
                    );
                }
            }

            if let Some(TxFoSource::Malformed { detail, .. }) = &input.config.tx {
                self.error(
                    "malformed-txfo",
                    &subject,
                    format!("txFo payload does not decode: {detail}"),
                );
            }

            if input.input_type == InputType::TextInputFunc && input.config.call_form.is_none() {
                self.warn(
                    "lookup-without-target",
                    &subject,
                    "lookup input has no callform, its browse button will do nothing".to_string(),
                );
            }

            if input.input_type == InputType::TableDynamic {
                let mut rows: HashMap<&str, usize> = HashMap::new();
                for main in &input.config.default_keys {
                    let count = rows.entry(main.as_str()).or_insert(0);
                    *count += 1;
                    if *count == 2 {
                        self.warn(
                            "duplicate-main-key",
                            &subject,
                            format!("main-key row {main:?} is declared twice in defaultkey"),
                        );
                    }
                }
            }
        }
    }

    fn check_rules(&mut self, design: &FormDesign) {
        // Rule targets are column keys for fields and declared codes for
        // buttons; both count as known.
        let known: Vec<&str> = design
            .inputs()
            .flat_map(|input| [Some(input.column_key()), input.default.code.as_deref()])
            .flatten()
            .filter(|name| !name.is_empty())
            .collect();

        for rule in design.rules.iter() {
            let subject = rule.code.as_tag().to_string();

            if let Some(TxFoSource::Malformed { detail, .. }) = &rule.tx {
                self.error(
                    "malformed-txfo",
                    &subject,
                    format!("rule txFo payload does not decode: {detail}"),
                );
            }

            // RunFo rules target one column; visibility families list many.
            if matches!(
                rule.code,
                RuleCode::Visibility | RuleCode::VisibilityButton | RuleCode::VisibilityModify
            ) {
                for key in rule.result_keys.iter() {
                    if !known.contains(&key) {
                        self.warn(
                            "unknown-rule-target",
                            &subject,
                            format!("rule lists {key:?} but no input binds that column key"),
                        );
                    }
                }
            }
        }
    }

    fn warn(&mut self, code: &'static str, subject: &str, message: String) {
        self.findings.push(Finding {
            severity: Severity::Warning,
            code,
            subject: subject.to_string(),
            message,
        });
    }

    fn error(&mut self, code: &'static str, subject: &str, message: String) {
        self.findings.push(Finding {
            severity: Severity::Error,
            code,
            subject: subject.to_string(),
            message,
        });
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

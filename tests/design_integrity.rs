//! Design lint over fixtures and deliberately broken documents

mod common;

use dynaform::FormDesign;
use dynaform::schema::{IntegrityReport, Severity};
use serde_json::json;

/// Both shipped fixtures lint clean; `dynaform validate` exits zero on
/// them even with `--strict`.
#[test]
fn shipped_fixtures_pass_the_lint() {
    let report = IntegrityReport::check(&common::credential_design());
    assert!(report.is_clean(), "unexpected findings: {:?}", report.findings);

    let report = IntegrityReport::check(&common::load_design("frm_user_lookup.json"));
    assert!(report.is_clean(), "unexpected findings: {:?}", report.findings);
}

/// One broken document, one finding per defect class, with the severity
/// split the validate command reports.
#[test]
fn each_defect_class_is_reported() {
    let design = FormDesign::from_value(json!({
        "form_design_detail": {
            "form_id": "frm_broken",
            "info": { "ruleStrong": [
                {
                    "code": "visibility",
                    "config": {
                        "component_event": "on_change",
                        "component_result": "ci_ghost",
                        "visible": "false"
                    }
                },
                {
                    "code": "runFo",
                    "config": { "component_action": "ci_dup", "txFo": "{broken" }
                }
            ] },
            "list_layout": [{
                "id": "l1",
                "list_view": [{
                    "id": "v1",
                    "name": "Main",
                    "list_input": [
                        { "inputtype": "cTextInput", "config": { "structable_read": "a.ci_dup" } },
                        { "inputtype": "cTextInput", "config": { "structable_read": "b.ci_dup" } },
                        { "inputtype": "cTextInput", "config": {} },
                        { "inputtype": "cTextInput", "config": { "structable_read": "t.ci-weird" } },
                        { "inputtype": "xHologram", "config": { "structable_read": "t.ci_holo" } },
                        { "inputtype": "cTextInputFunc", "config": { "structable_read": "t.ci_ref" } },
                        {
                            "inputtype": "cTableDynamic",
                            "config": { "structable_read": "t.ci_rows", "defaultkey": "host;host" }
                        },
                        {
                            "inputtype": "jTableSearch",
                            "config": { "structable_read": "t.ci_results", "txFo": "{also broken" }
                        }
                    ]
                }]
            }]
        }
    }))
    .unwrap();

    let report = IntegrityReport::check(&design);
    let codes: Vec<&str> = report.findings.iter().map(|finding| finding.code).collect();
    for expected in [
        "duplicate-column-key",
        "missing-structable-read",
        "non-identifier-key",
        "unsupported-input-type",
        "lookup-without-target",
        "duplicate-main-key",
        "malformed-txfo",
        "unknown-rule-target",
    ] {
        assert!(codes.contains(&expected), "missing finding {expected}: {codes:?}");
    }

    // Two inputs share ci_dup yet the duplicate fires once; malformed txFo
    // fires once for the input and once for the rule.
    assert_eq!(codes.iter().filter(|code| **code == "duplicate-column-key").count(), 1);
    assert_eq!(codes.iter().filter(|code| **code == "malformed-txfo").count(), 2);
    assert_eq!(report.error_count(), 4);
    assert_eq!(report.warning_count(), 5);

    let ghost = report
        .findings
        .iter()
        .find(|finding| finding.code == "unknown-rule-target")
        .unwrap();
    assert_eq!(ghost.severity, Severity::Warning);
    assert_eq!(ghost.subject, "visibility");
    assert!(ghost.message.contains("ci_ghost"));
}

/// Button rules are keyed by declared codes, not column keys; a rule
/// naming a declared button is not a dangling target.
#[test]
fn button_rule_targets_resolve_against_declared_codes() {
    let with_rule = |target: &str| {
        FormDesign::from_value(json!({
            "form_design_detail": {
                "form_id": "frm_buttons",
                "info": { "ruleStrong": [{
                    "code": "visibilitybutton",
                    "config": {
                        "component_event": "on_click",
                        "component_result": target,
                        "ena_dis": "true"
                    }
                }] },
                "list_layout": [{
                    "id": "l1",
                    "list_view": [{
                        "id": "v1",
                        "name": "Main",
                        "list_input": [
                            { "inputtype": "cButton", "default": { "code": "btnSave" }, "config": {} }
                        ]
                    }]
                }]
            }
        }))
        .unwrap()
    };

    assert!(IntegrityReport::check(&with_rule("btnSave")).is_clean());

    let report = IntegrityReport::check(&with_rule("btnGhost"));
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.findings[0].code, "unknown-rule-target");
}

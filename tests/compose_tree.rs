//! Composition of the credential fixture into a rendered tree
//!
//! Checks the layout partitioning, rule-driven enablement, widget state,
//! and role-table pruning that hosts read off the composed [`FormTree`].

mod common;

use std::sync::Arc;

use common::{RecordingRunner, scripted_services};
use dynaform::engine::FieldWidget;
use dynaform::services::{
    FileDesignService, InlineOptionSource, InstallFlags, NullFileStore, Services,
    StaticRoleAuthority,
};
use dynaform::{FormEvent, FormMode, FormSession};

async fn started_session(mode: FormMode) -> FormSession {
    let runner = RecordingRunner::new();
    let services = scripted_services(runner, &["ops"]);
    let mut session = FormSession::new(common::credential_design(), services, "en", mode);
    session.start().await;
    session
}

/// Views split into plain panels and a tab strip per layout, and the
/// remembered tab index survives only while it stays in range.
#[tokio::test]
async fn layouts_partition_into_panels_and_tabs() {
    let mut session = started_session(FormMode::Add).await;
    let tree = session.render();
    assert_eq!(tree.form_id, "frm_credential");
    assert_eq!(tree.layouts.len(), 2);

    let search = &tree.layouts[0];
    assert_eq!(search.id, "lay_search");
    assert_eq!(search.panels.len(), 1);
    assert!(search.tabs.is_none());
    assert!(matches!(
        search.panels[0].fields[1].widget,
        FieldWidget::SearchTable { page: None, searching: false }
    ));

    let main = &tree.layouts[1];
    assert_eq!(main.id, "lay_main");
    let tabs = main.tabs.as_ref().unwrap();
    assert_eq!(tabs.active, 0);
    let titles: Vec<&str> = tabs.tabs.iter().map(|tab| tab.title.as_str()).collect();
    assert_eq!(titles, vec!["General", "Security", "Endpoints"]);
    assert_eq!(main.panels.len(), 1);
    assert_eq!(main.panels[0].title, "Actions");
    assert!(main.panels[0].bordered);

    session
        .drive(FormEvent::TabSelected { layout_id: "lay_main".into(), index: 2 })
        .await;
    assert_eq!(session.render().layouts[1].tabs.as_ref().unwrap().active, 2);

    // An index past the end renders as the first tab instead of nothing.
    session
        .drive(FormEvent::TabSelected { layout_id: "lay_main".into(), index: 7 })
        .await;
    assert_eq!(session.render().layouts[1].tabs.as_ref().unwrap().active, 0);
}

/// Visibility rules decide hiding by scanning every rule but disabling by
/// the first rule only, so the later hide rule for ci_secret does not
/// disable anything.
#[tokio::test]
async fn rule_decisions_flow_into_the_tree() {
    let session = started_session(FormMode::Add).await;
    let tree = session.render();

    let secret = tree.field("ci_secret").unwrap();
    assert!(secret.is_hidden());
    assert!(!secret.disabled);

    // The first visibility rule lists ci_serial with ena_dis set.
    let serial = tree.field("ci_serial").unwrap();
    assert!(!serial.is_hidden());
    assert!(serial.disabled);

    let code = tree.field("ci_code").unwrap();
    assert!(code.required);
    assert!(!code.disabled);
    assert!(tree.field("ci_name").unwrap().required);
    assert!(!tree.field("ci_owner").unwrap().required);
}

/// Modify mode locks exactly the fields the modify rule lists; the
/// ordinary visibility rules no longer decide enablement.
#[tokio::test]
async fn modify_mode_locks_the_declared_fields() {
    let session = started_session(FormMode::Modify).await;
    let tree = session.render();

    assert!(tree.field("ci_code").unwrap().disabled);
    assert!(tree.field("ci_owner").unwrap().disabled);
    // Listed by the first visibility rule, but not by the modify rule.
    assert!(!tree.field("ci_serial").unwrap().disabled);
    assert!(!tree.field("ci_name").unwrap().disabled);
}

/// Widget state reflects the session: inline selects carry their schema
/// options, fetched selects their (empty) fetch result, lookups their
/// target form, and dynamic tables their protected rows.
#[tokio::test]
async fn widgets_carry_session_state() {
    let session = started_session(FormMode::Add).await;
    let tree = session.render();

    match &tree.field("ci_type").unwrap().widget {
        FieldWidget::Select { choices, loading, .. } => {
            assert!(!loading);
            assert_eq!(choices.len(), 3);
            assert_eq!(choices[0].value, "TLS");
            assert_eq!(choices[0].label, "TLS client certificate");
        }
        other => panic!("expected select, got {other:?}"),
    }

    match &tree.field("ci_algorithm").unwrap().widget {
        FieldWidget::Select { choices, loading, .. } => {
            assert!(choices.is_empty());
            assert!(!loading);
        }
        other => panic!("expected select, got {other:?}"),
    }

    match &tree.field("ci_owner").unwrap().widget {
        FieldWidget::Lookup { target_form, .. } => {
            assert_eq!(target_form.as_deref(), Some("frm_user_lookup"));
        }
        other => panic!("expected lookup, got {other:?}"),
    }

    match &tree.field("ci_endpoints").unwrap().widget {
        FieldWidget::TableDynamic { rows } => {
            assert_eq!(rows.len(), 2);
            assert!(rows.iter().all(|row| row.key_locked && !row.deletable));
        }
        other => panic!("expected dynamic table, got {other:?}"),
    }

    match &tree.field("ci_active").unwrap().widget {
        FieldWidget::Checkbox { checked } => assert!(checked),
        other => panic!("expected checkbox, got {other:?}"),
    }
}

/// Role install switches prune the tree at view and component level: the
/// Security tab and the owner field disappear for a denying role while
/// everything else stays.
#[tokio::test]
async fn role_denials_prune_the_tree() {
    let mut authority = StaticRoleAuthority::new(vec!["ops".into(), "auditor".into()]);
    authority.set_flags(
        "auditor",
        "cred.security",
        InstallFlags { component: true, layout: true, view: false },
    );
    authority.set_flags(
        "auditor",
        "cred.owner",
        InstallFlags { component: false, layout: true, view: true },
    );
    let services = Services {
        forms: Arc::new(FileDesignService::new(common::testdata_dir())),
        transactions: RecordingRunner::new(),
        options: Arc::new(InlineOptionSource),
        files: Arc::new(NullFileStore),
        roles: Arc::new(authority),
    };
    let mut session = FormSession::new(common::credential_design(), services, "en", FormMode::Add);
    session.start().await;
    let tree = session.render();

    let tabs = tree.layouts[1].tabs.as_ref().unwrap();
    let titles: Vec<&str> = tabs.tabs.iter().map(|tab| tab.title.as_str()).collect();
    assert_eq!(titles, vec!["General", "Endpoints"]);

    assert!(tree.field("ci_owner").is_none());
    assert!(tree.field("ci_code").is_some());
    // Fields of the pruned view are gone entirely, not hidden.
    assert!(tree.field("ci_serial").is_none());
}

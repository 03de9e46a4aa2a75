//! Layout composition: walks layouts, views, and inputs into a [`FormTree`],
//! filtering by the role decision table and partitioning tabbed from plain
//! views. This is the single kernel sub-forms recurse through.

use crate::engine::dispatch::{BuildCtx, InputRegistry};
use crate::engine::node::{FormTree, LayoutNode, TabGroup, ViewNode};
use crate::engine::state::SessionState;
use crate::schema::{FormDesign, FormView};
use crate::services::traits::RoleAuthority;

/// Everything composition reads. Borrowed for one compose pass.
pub struct ComposeCtx<'a> {
    pub design: &'a FormDesign,
    pub state: &'a SessionState,
    pub registry: &'a InputRegistry,
    pub roles: &'a dyn RoleAuthority,
    pub language: &'a str,
}

#[derive(Clone, Copy)]
enum RoleLevel {
    Layout,
    View,
    Component,
}

/// An element is hidden when any active role has its install switch off
/// for the element's `codeHidden` key. Absent keys and absent table
/// entries render as installed.
fn role_hidden(roles: &dyn RoleAuthority, code_hidden: Option<&str>, level: RoleLevel) -> bool {
    let Some(code) = code_hidden else {
        return false;
    };
    roles.role_ids().iter().any(|role_id| {
        roles
            .install_flags(role_id, code)
            .map(|flags| match level {
                RoleLevel::Layout => !flags.layout,
                RoleLevel::View => !flags.view,
                RoleLevel::Component => !flags.component,
            })
            .unwrap_or(false)
    })
}

fn compose_view(ctx: &ComposeCtx<'_>, view: &FormView) -> ViewNode {
    let build = BuildCtx {
        state: ctx.state,
        rules: &ctx.design.rules,
        language: ctx.language,
    };
    let fields = view
        .inputs
        .iter()
        .filter(|input| {
            !role_hidden(ctx.roles, input.default.code_hidden.as_deref(), RoleLevel::Component)
        })
        .map(|input| ctx.registry.build_field(&build, input))
        .collect();
    ViewNode {
        id: view.id.clone(),
        title: view.name.clone(),
        bordered: view.is_border,
        fields,
    }
}

/// Compose the full tree for one form design against the current state.
pub fn compose(ctx: &ComposeCtx<'_>) -> FormTree {
    let layouts = ctx
        .design
        .layouts
        .iter()
        .filter(|layout| {
            !role_hidden(ctx.roles, layout.code_hidden.as_deref(), RoleLevel::Layout)
        })
        .map(|layout| {
            let mut panels = Vec::new();
            let mut tabs = Vec::new();
            for view in &layout.views {
                if role_hidden(ctx.roles, view.code_hidden.as_deref(), RoleLevel::View) {
                    continue;
                }
                let node = compose_view(ctx, view);
                if view.is_tab {
                    tabs.push(node);
                } else {
                    panels.push(node);
                }
            }
            let tabs = if tabs.is_empty() {
                None
            } else {
                let active = ctx.state.active_tab(&layout.id);
                Some(TabGroup {
                    // An out-of-range remembered index falls back to the
                    // first tab rather than rendering nothing.
                    active: if active < tabs.len() { active } else { 0 },
                    tabs,
                })
            };
            LayoutNode { id: layout.id.clone(), panels, tabs }
        })
        .collect();

    FormTree {
        form_id: ctx.design.form_id.clone(),
        layouts,
        overlay: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::rules::FormMode;
    use crate::services::models::InstallFlags;
    use serde_json::json;
    use std::collections::HashMap;

    struct TableRoles {
        roles: Vec<String>,
        table: HashMap<(String, String), InstallFlags>,
    }

    impl TableRoles {
        fn new(roles: &[&str]) -> TableRoles {
            TableRoles {
                roles: roles.iter().map(|r| r.to_string()).collect(),
                table: HashMap::new(),
            }
        }

        fn deny(mut self, role: &str, code: &str, flags: InstallFlags) -> TableRoles {
            self.table.insert((role.to_string(), code.to_string()), flags);
            self
        }
    }

    impl RoleAuthority for TableRoles {
        fn role_ids(&self) -> Vec<String> {
            self.roles.clone()
        }
        fn install_flags(&self, role_id: &str, code_hidden: &str) -> Option<InstallFlags> {
            self.table
                .get(&(role_id.to_string(), code_hidden.to_string()))
                .copied()
        }
    }

    fn design() -> FormDesign {
        FormDesign::from_value(json!({
            "form_design_detail": {
                "form_id": "frm_credential",
                "info": { "ruleStrong": [] },
                "list_layout": [{
                    "id": "lay_main",
                    "codeHidden": "cred.layout",
                    "list_view": [
                        {
                            "id": "v_general",
                            "name": "General",
                            "isTab": "false",
                            "list_input": [
                                { "inputtype": "cTextInput", "config": { "structable_read": "t.ci_name" } },
                                {
                                    "inputtype": "cTextInput",
                                    "default": { "codeHidden": "cred.secret" },
                                    "config": { "structable_read": "t.ci_secret" }
                                }
                            ]
                        },
                        {
                            "id": "v_limits",
                            "name": "Limits",
                            "isTab": "true",
                            "list_input": [
                                { "inputtype": "jCurrency", "config": { "structable_read": "t.ci_limit" } }
                            ]
                        },
                        {
                            "id": "v_audit",
                            "name": "Audit",
                            "isTab": "true",
                            "codeHidden": "cred.audit",
                            "list_input": []
                        }
                    ]
                }]
            }
        }))
        .unwrap()
    }

    fn compose_with(roles: &dyn RoleAuthority, state: &SessionState) -> FormTree {
        let design = design();
        let registry = InputRegistry::with_builtins();
        compose(&ComposeCtx {
            design: &design,
            state,
            registry: &registry,
            roles,
            language: "en",
        })
    }

    #[test]
    fn views_partition_into_panels_and_tabs() {
        let state = SessionState::new(FormMode::Add);
        let tree = compose_with(&TableRoles::new(&["ops"]), &state);
        let layout = &tree.layouts[0];
        assert_eq!(layout.panels.len(), 1);
        let tabs = layout.tabs.as_ref().unwrap();
        assert_eq!(tabs.tabs.len(), 2);
        assert_eq!(tabs.active, 0);
        assert!(tree.field("ci_limit").is_some());
    }

    #[test]
    fn any_denying_role_hides_the_element() {
        let roles = TableRoles::new(&["ops", "auditor"]).deny(
            "auditor",
            "cred.audit",
            InstallFlags { component: true, layout: true, view: false },
        );
        let state = SessionState::new(FormMode::Add);
        let tree = compose_with(&roles, &state);
        let tabs = tree.layouts[0].tabs.as_ref().unwrap();
        assert_eq!(tabs.tabs.len(), 1);
        assert_eq!(tabs.tabs[0].id, "v_limits");
    }

    #[test]
    fn component_level_denial_drops_a_single_input() {
        let roles = TableRoles::new(&["ops"]).deny(
            "ops",
            "cred.secret",
            InstallFlags { component: false, layout: true, view: true },
        );
        let state = SessionState::new(FormMode::Add);
        let tree = compose_with(&roles, &state);
        assert!(tree.field("ci_name").is_some());
        assert!(tree.field("ci_secret").is_none());
    }

    #[test]
    fn layout_level_denial_hides_everything_under_it() {
        let roles = TableRoles::new(&["ops"]).deny(
            "ops",
            "cred.layout",
            InstallFlags { component: true, layout: false, view: true },
        );
        let state = SessionState::new(FormMode::Add);
        let tree = compose_with(&roles, &state);
        assert!(tree.layouts.is_empty());
    }

    #[test]
    fn remembered_tab_out_of_range_falls_back_to_first() {
        let mut state = SessionState::new(FormMode::Add);
        state.active_tabs.insert("lay_main".into(), 7);
        let tree = compose_with(&TableRoles::new(&["ops"]), &state);
        assert_eq!(tree.layouts[0].tabs.as_ref().unwrap().active, 0);
    }
}

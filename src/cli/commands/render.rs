use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::*;
use serde_json::Value;

use crate::engine::{
    FieldNode, FieldWidget, FormEvent, FormMode, FormSession, FormTree, UploadState, ViewNode,
};
use crate::schema::FormDesign;
use crate::services::offline_services;

/// Mount a session against the on-disk design, run the bootstrap pass with
/// offline services, and print the composed tree.
pub async fn render_command(
    schema: &Path,
    mode: FormMode,
    roles: Vec<String>,
    language: &str,
    record: Option<&Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(schema)
        .with_context(|| format!("Failed to read form design file: {}", schema.display()))?;
    let design = FormDesign::from_json_str(&raw)?;

    // Lookup targets resolve against sibling files of the given design.
    let schema_dir = schema
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ".".into());
    let services = offline_services(schema_dir, roles);

    let mut session = FormSession::new(design, services, language, mode);
    session.start().await;

    if let Some(record_path) = record {
        let record_raw = std::fs::read_to_string(record_path)
            .with_context(|| format!("Failed to read record file: {}", record_path.display()))?;
        let value: Value = serde_json::from_str(&record_raw)
            .with_context(|| format!("Record file is not valid JSON: {}", record_path.display()))?;
        let Value::Object(map) = value else {
            bail!("Record file must contain a JSON object");
        };
        session.drive(FormEvent::RecordLoaded { record: map }).await;
    }

    print_tree(&session.render(), 0);
    println!();
    Ok(())
}

fn print_tree(tree: &FormTree, depth: usize) {
    let pad = "  ".repeat(depth + 1);
    println!();
    println!("{pad}{} {}", "Form".bright_white().bold(), tree.form_id.cyan());

    for layout in &tree.layouts {
        println!("{pad}  {} {}", "Layout".bright_blue().bold(), layout.id.dimmed());
        for panel in &layout.panels {
            print_view(panel, depth, "Panel", false);
        }
        if let Some(group) = &layout.tabs {
            for (index, tab) in group.tabs.iter().enumerate() {
                print_view(tab, depth, "Tab", index == group.active);
            }
        }
    }

    if let Some(overlay) = &tree.overlay {
        println!("{pad}  {} {}", "Overlay".bright_magenta().bold(), overlay.title);
        print_tree(&overlay.tree, depth + 2);
    }
}

fn print_view(view: &ViewNode, depth: usize, kind: &str, active: bool) {
    let pad = "  ".repeat(depth + 2);
    let marker = if active { "●".bright_green() } else { "○".dimmed() };
    let heading = if view.bordered {
        format!("{kind} [{}]", view.title)
    } else {
        format!("{kind} {}", view.title)
    };
    if kind == "Tab" {
        println!("{pad}{marker} {}", heading.bright_white());
    } else {
        println!("{pad}  {}", heading.bright_white());
    }
    for field in &view.fields {
        print_field(field, depth);
    }
}

fn print_field(field: &FieldNode, depth: usize) {
    let pad = "  ".repeat(depth + 3);

    if field.is_hidden() {
        println!("{pad}{}", format!("· {} (hidden)", field.label).dimmed());
        return;
    }

    let label = if field.required {
        format!("{} *", field.label)
    } else {
        field.label.clone()
    };
    let (kind, detail) = widget_summary(&field.widget);
    let state = if field.disabled {
        "disabled".yellow().to_string()
    } else {
        String::new()
    };

    println!(
        "{pad}{} {label:<28} {} {detail} {state}",
        "-".dimmed(),
        format!("{kind:<12}").dimmed(),
    );
    if let Some(error) = &field.error {
        println!("{pad}    {} {}", "✗".bright_red(), error.red());
    }
}

fn widget_summary(widget: &FieldWidget) -> (&'static str, String) {
    match widget {
        FieldWidget::Hidden => ("hidden", String::new()),
        FieldWidget::Text { value } => ("text", value.clone()),
        FieldWidget::Lookup { value, target_form } => {
            let detail = match target_form {
                Some(target) => format!("{value} (opens {target})"),
                None => value.clone(),
            };
            ("lookup", detail)
        }
        FieldWidget::SearchText { value } => ("search", value.clone()),
        FieldWidget::DateTime { value } => ("datetime", value.clone()),
        FieldWidget::Time { value } => ("time", value.clone()),
        FieldWidget::Currency { value } => ("currency", value.clone()),
        FieldWidget::Select { value, choices, loading } => {
            let detail = if *loading {
                format!("{value} (loading options)")
            } else {
                format!("{value} ({} options)", choices.len())
            };
            ("select", detail)
        }
        FieldWidget::Checkbox { checked } => {
            ("checkbox", if *checked { "[x]".into() } else { "[ ]".into() })
        }
        FieldWidget::Button => ("button", String::new()),
        FieldWidget::Image { upload } => {
            let detail = match upload {
                UploadState::Empty => String::new(),
                UploadState::Uploading { file_name } => format!("uploading {file_name}"),
                UploadState::Stored { file_url } => file_url.clone(),
            };
            ("image", detail)
        }
        FieldWidget::SearchTable { page, searching } => {
            let detail = if *searching {
                "searching".into()
            } else {
                match page {
                    Some(page) => format!(
                        "page {} of {} ({} rows)",
                        page.pageindex + 1,
                        page.total_pages.max(1),
                        page.len()
                    ),
                    None => "no results yet".into(),
                }
            };
            ("results", detail)
        }
        FieldWidget::TableDynamic { rows } => {
            ("table", format!("{} visible row(s)", rows.len()))
        }
        FieldWidget::Unsupported { tag } => ("unsupported", tag.clone()),
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use crate::engine::{
    FormMode, disable_button, disable_field, is_button_hidden, is_field_hidden, is_field_required,
};
use crate::schema::{FormDesign, InputType};

/// List every input of the design together with its resolved rule decisions
/// for the given mode.
pub fn fields_command(schema: &Path, mode: FormMode, language: &str) -> Result<()> {
    let raw = std::fs::read_to_string(schema)
        .with_context(|| format!("Failed to read form design file: {}", schema.display()))?;
    let design = FormDesign::from_json_str(&raw)?;

    println!();
    println!(
        "  {} {} ({mode:?} mode)",
        "Fields of".bright_white().bold(),
        design.form_id.cyan()
    );
    println!();

    for input in design.inputs() {
        let key = input.column_key();
        let is_button = matches!(input.input_type, InputType::Button);

        // Buttons are keyed by their declared code, fields by column key.
        let (hidden, disabled) = if is_button {
            let code = input.default.code.as_deref().unwrap_or_default();
            (
                is_button_hidden(&design.rules, code),
                disable_button(&design.rules, code, mode),
            )
        } else {
            (
                is_field_hidden(&design.rules, key),
                input.default.disabled || disable_field(&design.rules, key, mode),
            )
        };

        let mut flags: Vec<ColoredString> = Vec::new();
        if hidden {
            flags.push("hidden".dimmed());
        }
        if disabled {
            flags.push("disabled".yellow());
        }
        if is_field_required(input) {
            flags.push("required".bright_red());
        }
        let flags = flags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        let shown_key = if key.is_empty() {
            input.default.code.clone().unwrap_or_else(|| "-".into())
        } else {
            key.to_string()
        };
        // Pad before coloring so the escape codes don't skew the columns.
        println!(
            "  {} {} {:<28} {}",
            format!("{shown_key:<24}").cyan(),
            format!("{:<18}", input.input_type.as_tag()).dimmed(),
            input.label(language),
            flags
        );
    }

    println!();
    Ok(())
}

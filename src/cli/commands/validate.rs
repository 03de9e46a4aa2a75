use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use crate::schema::{FormDesign, IntegrityReport, Severity};

/// Load a design file, run the integrity checks, and print the findings.
/// Returns whether the design passed (warnings only fail under `strict`).
pub fn validate_command(schema: &Path, strict: bool) -> Result<bool> {
    let raw = std::fs::read_to_string(schema)
        .with_context(|| format!("Failed to read form design file: {}", schema.display()))?;
    let design = FormDesign::from_json_str(&raw)?;
    let report = IntegrityReport::check(&design);

    println!();
    println!(
        "  {} {}",
        "Form design:".bright_white().bold(),
        design.form_id.cyan()
    );
    println!("    {} {}", "inputs:".dimmed(), design.inputs().count());
    println!("    {} {}", "rules:".dimmed(), design.rules.len());
    println!();

    if report.findings.is_empty() {
        println!("  {} No findings", "✓".bright_green().bold());
        return Ok(true);
    }

    for finding in &report.findings {
        let marker = match finding.severity {
            Severity::Error => "✗".bright_red().bold(),
            Severity::Warning => "!".bright_yellow().bold(),
        };
        println!(
            "  {} {} {} {}",
            marker,
            finding.code.dimmed(),
            finding.subject.cyan(),
            finding.message
        );
    }

    let errors = report.error_count();
    let warnings = report.warning_count();
    println!();
    println!(
        "  {} error(s), {} warning(s)",
        errors.to_string().bright_red().bold(),
        warnings.to_string().bright_yellow().bold()
    );

    Ok(errors == 0 && (!strict || warnings == 0))
}

use anyhow::Result;
use colored::*;

use crate::config::Config;
use crate::schema::{IntegrityReport, Severity};
use crate::services::{FormDesignService, GatewayClient};

/// Pull a form design from the configured gateway and run the integrity
/// checks against it.
pub async fn fetch_command(form_id: &str) -> Result<()> {
    let config = Config::load()?;
    let client = GatewayClient::new(config.gateway.clone())?;

    println!();
    println!(
        "  {} {} from {}",
        "Fetching".bright_white().bold(),
        form_id.cyan(),
        config.gateway.base_url.dimmed()
    );

    let design = client.load_form(&config.gateway.language, form_id).await?;

    println!("  {} Design loaded", "✓".bright_green().bold());
    println!("    {} {}", "form id:".dimmed(), design.form_id);
    println!("    {} {}", "layouts:".dimmed(), design.layouts.len());
    println!("    {} {}", "inputs:".dimmed(), design.inputs().count());
    println!("    {} {}", "rules:".dimmed(), design.rules.len());
    println!();

    let report = IntegrityReport::check(&design);
    if report.is_clean() {
        println!("  {} No integrity findings", "✓".bright_green().bold());
    } else {
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
    }
    println!();
    Ok(())
}

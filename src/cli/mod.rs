pub mod app;
pub mod commands;

pub use app::{Cli, Commands};

use anyhow::Result;

/// Dispatch a parsed invocation. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Validate { schema, strict } => {
            let passed = commands::validate_command(&schema, strict)?;
            Ok(if passed { 0 } else { 1 })
        }
        Commands::Render {
            schema,
            mode,
            role,
            language,
            record,
        } => {
            commands::render_command(&schema, mode.into(), role, &language, record.as_deref())
                .await?;
            Ok(0)
        }
        Commands::Fields {
            schema,
            mode,
            language,
        } => {
            commands::fields_command(&schema, mode.into(), &language)?;
            Ok(0)
        }
        Commands::Fetch { form_id } => {
            commands::fetch_command(&form_id).await?;
            Ok(0)
        }
    }
}

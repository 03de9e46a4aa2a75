use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::engine::FormMode;

#[derive(Parser)]
#[command(name = "dynaform")]
#[command(about = "Inspect and exercise metadata-driven form designs", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check a form design file for integrity problems
    Validate {
        /// Path to a form design JSON file
        schema: PathBuf,

        /// Treat warnings as failures
        #[arg(long)]
        strict: bool,
    },

    /// Compose a form offline and print the resulting tree
    Render {
        /// Path to a form design JSON file
        schema: PathBuf,

        /// Rule evaluation mode
        #[arg(long, value_enum, default_value_t = ModeArg::View)]
        mode: ModeArg,

        /// Active role id for view filtering (repeatable)
        #[arg(long)]
        role: Vec<String>,

        /// Locale used for field titles
        #[arg(long, default_value = "en")]
        language: String,

        /// JSON object file loaded as the current record before composing
        #[arg(long)]
        record: Option<PathBuf>,
    },

    /// List every input with its resolved rule decisions
    Fields {
        /// Path to a form design JSON file
        schema: PathBuf,

        /// Rule evaluation mode
        #[arg(long, value_enum, default_value_t = ModeArg::View)]
        mode: ModeArg,

        /// Locale used for field titles
        #[arg(long, default_value = "en")]
        language: String,
    },

    /// Download a form design from the configured gateway and report on it
    Fetch {
        /// Form id to request
        form_id: String,
    },
}

/// Command-line spelling of the form modes.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    View,
    Add,
    Modify,
}

impl From<ModeArg> for FormMode {
    fn from(mode: ModeArg) -> FormMode {
        match mode {
            ModeArg::View => FormMode::View,
            ModeArg::Add => FormMode::Add,
            ModeArg::Modify => FormMode::Modify,
        }
    }
}

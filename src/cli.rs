use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "skel",
    version,
    about = "Create a project's directory skeleton without touching what already exists"
)]
pub struct Cli {
    /// Layout file (.toml or .json).
    #[arg(short = 'f', long = "file", global = true)]
    pub file: Option<PathBuf>,
    /// Built-in layout name (see `skel presets`).
    #[arg(short = 'p', long = "preset", global = true)]
    pub preset: Option<String>,
    /// Directory to build the layout in, overriding the layout's own base.
    #[arg(short = 'b', long = "base", global = true)]
    pub base: Option<PathBuf>,
    /// Report what would be created without writing anything.
    #[arg(short = 'n', long = "dry-run", global = true)]
    pub dry_run: bool,
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    /// Create missing directories and files (the default).
    Apply,
    /// Print the selected layout.
    Show {
        /// Emit the structure as JSON instead of an outline.
        #[arg(long = "json", default_value_t = false)]
        json: bool,
    },
    /// List built-in layouts.
    Presets,
}

pub fn parse() -> Cli {
    Cli::parse()
}

//! Command-line interfaces for the launcher and the updater.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

pub mod start;
pub mod update;

pub use start::StartCommand;
pub use update::UpdateCommand;

/// Options shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Shows detailed error output and enables debug logging.
    #[arg(short, long)]
    pub debug: bool,

    /// Project root directory.
    #[arg(short = 'C', long, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,
}

impl CommonArgs {
    /// Resolves the project root to an absolute path.
    pub fn project_root(&self) -> Result<PathBuf> {
        self.project_dir.canonicalize().with_context(|| {
            format!(
                "Project directory not found: {}",
                self.project_dir.display()
            )
        })
    }
}

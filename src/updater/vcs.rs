//! Access to the local git checkout.
//!
//! Reads go through libgit2. Mutations (fetch, pull, add, commit, push) shell
//! out to the git CLI so credentials, hooks and the user's git configuration
//! behave exactly as they do on the command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::{Repository, StatusOptions};

use crate::process::run_captured;

/// Operations the updater needs from version control.
pub trait VersionControl {
    /// Returns the abbreviated id of the checked-out commit.
    fn current_revision(&self) -> Result<String>;

    /// Returns whether the working tree has uncommitted or untracked changes.
    fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Runs a git subcommand, failing on a non-zero exit.
    ///
    /// Blocks until git exits. Async callers run it under
    /// `tokio::task::block_in_place`.
    fn run(&self, args: &[String]) -> Result<()>;
}

/// [`VersionControl`] backed by a real repository.
#[derive(Debug, Clone)]
pub struct GitVcs {
    root: PathBuf,
}

impl GitVcs {
    /// Creates a handle for the checkout containing `root`.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::discover(&self.root)
            .with_context(|| format!("Failed to open git repository at {}", self.root.display()))
    }
}

impl VersionControl for GitVcs {
    fn current_revision(&self) -> Result<String> {
        let repo = self.open()?;

        // Resolve HEAD to a commit, then abbreviate it the way `git rev-parse --short` does
        let head = repo
            .head()
            .context("Failed to resolve HEAD")?
            .peel_to_commit()
            .context("HEAD does not point at a commit")?;
        let short = head
            .as_object()
            .short_id()
            .context("Failed to abbreviate HEAD id")?;
        Ok(short.as_str().unwrap_or_default().to_string())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        let repo = self.open()?;
        // Untracked files count as changes, ignored ones do not
        let mut options = StatusOptions::new();
        options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);
        let statuses = repo
            .statuses(Some(&mut options))
            .context("Failed to get repository status")?;
        Ok(!statuses.is_empty())
    }

    fn run(&self, args: &[String]) -> Result<()> {
        tracing::debug!(args = ?args, "Running git");
        let output = run_captured("git", args, Some(&self.root))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "git {} failed ({}): {}",
                args.join(" "),
                output.status,
                stderr.trim()
            );
        }
        Ok(())
    }
}

//! The persisted revision record written after each successful synchronization.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use git2::Repository;
use tempfile::NamedTempFile;

/// Plain-text file holding the short id of the last synchronized revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRecord {
    path: PathBuf,
}

impl RevisionRecord {
    /// Creates a record at `relative`, resolved against the project root.
    pub fn at(root: &Path, relative: &Path) -> Self {
        Self {
            path: root.join(relative),
        }
    }

    /// Creates a record at `relative`, resolved against the git directory of
    /// the checkout containing `root`.
    ///
    /// The record stays out of the working tree, so staging all changes never
    /// picks it up and a sync never commits its own bookkeeping.
    pub fn in_git_dir(root: &Path, relative: &Path) -> Result<Self> {
        let repo = Repository::discover(root)
            .with_context(|| format!("Failed to open git repository at {}", root.display()))?;
        Ok(Self {
            path: repo.path().join(relative),
        })
    }

    /// Returns the record's file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the recorded id. A missing or blank file yields `None`.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read revision record: {}", self.path.display()))?;
        let id = content.trim();
        Ok((!id.is_empty()).then(|| id.to_string()))
    }

    /// Replaces the recorded id.
    ///
    /// The file holds exactly `id`, without a trailing newline. The write goes
    /// through a temporary file in the same directory, so readers see either
    /// the old or the new id.
    pub fn store(&self, id: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to stage revision record in {}", dir.display()))?;
        staged
            .write_all(id.as_bytes())
            .context("Failed to write revision record")?;
        staged.persist(&self.path).with_context(|| {
            format!("Failed to replace revision record: {}", self.path.display())
        })?;

        tracing::debug!(path = %self.path.display(), id, "Stored revision record");
        Ok(())
    }
}

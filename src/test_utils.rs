//! Shared test utilities.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::updater::vcs::VersionControl;

/// Version control double that records every command it is asked to run.
///
/// Subcommands registered with [`failing`](Self::failing) return an error;
/// everything else succeeds.
pub(crate) struct MockVcs {
    revision: String,
    dirty: bool,
    failing: Vec<String>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockVcs {
    /// Creates a clean checkout at `revision`.
    pub(crate) fn new(revision: &str) -> Self {
        Self {
            revision: revision.to_string(),
            dirty: false,
            failing: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Marks the working tree as having uncommitted changes.
    pub(crate) fn dirty(mut self) -> Self {
        self.dirty = true;
        self
    }

    /// Makes the given git subcommand fail.
    pub(crate) fn failing(mut self, subcommand: &str) -> Self {
        self.failing.push(subcommand.to_string());
        self
    }

    /// Returns the argument lists of every `run` call so far.
    pub(crate) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl VersionControl for MockVcs {
    fn current_revision(&self) -> Result<String> {
        Ok(self.revision.clone())
    }

    fn has_uncommitted_changes(&self) -> Result<bool> {
        Ok(self.dirty)
    }

    fn run(&self, args: &[String]) -> Result<()> {
        self.calls.lock().unwrap().push(args.to_vec());
        match args.first() {
            Some(sub) if self.failing.contains(sub) => {
                anyhow::bail!("mock git {sub} failed")
            }
            _ => Ok(()),
        }
    }
}

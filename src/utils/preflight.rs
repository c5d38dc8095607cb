//! Preflight validation checks for early failure detection
//!
//! Both binaries verify their external tools before doing anything else, so a
//! missing tool fails the run before any network call or subprocess launch.

use std::path::Path;

use anyhow::{Context, Result};

use crate::process::{first_stdout_line, run_captured};
use crate::report::{say, Tone};

/// An external tool that must be invocable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    /// Display name, e.g. "Node.js".
    pub name: String,
    /// Program looked up on PATH.
    pub program: String,
    /// Argument that makes the program print its version.
    pub version_arg: String,
    /// Prefix added to the reported version when the tool omits one.
    pub version_prefix: String,
    /// Hint printed when the tool is unavailable.
    pub install_hint: String,
}

impl Tool {
    /// Creates a tool that is probed with `--version`.
    pub fn new(name: &str, program: &str, install_hint: &str) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            version_arg: "--version".to_string(),
            version_prefix: String::new(),
            install_hint: install_hint.to_string(),
        }
    }

    /// Sets the prefix added to the reported version.
    pub fn with_version_prefix(mut self, prefix: &str) -> Self {
        self.version_prefix = prefix.to_string();
        self
    }

    /// The JavaScript runtime.
    pub fn node(program: &str) -> Self {
        Self::new("Node.js", program, "Download from https://nodejs.org/")
    }

    /// The package manager, reported as `v<version>`.
    pub fn npm(program: &str) -> Self {
        Self::new("npm", program, "Installed together with Node.js")
            .with_version_prefix("v")
    }

    /// The version-control client.
    pub fn git() -> Self {
        Self::new("Git", "git", "Download from https://git-scm.com/")
    }

    /// Runs the version query and returns the reported version.
    pub fn probe(&self) -> Result<String> {
        let output = run_captured(&self.program, [&self.version_arg], None)
            .with_context(|| format!("{} is not installed or not in PATH", self.name))?;

        if !output.status.success() {
            anyhow::bail!(
                "{} {} exited with {}",
                self.program,
                self.version_arg,
                output.status
            );
        }

        let version = first_stdout_line(&output).unwrap_or_else(|| "unknown".to_string());
        if version.starts_with(&self.version_prefix) {
            Ok(version)
        } else {
            Ok(format!("{}{}", self.version_prefix, version))
        }
    }
}

/// Checks every tool, printing one line each, and returns whether all are available.
///
/// Never fails: a missing tool or a failed version query counts as unavailable.
pub fn check_tools(tools: &[Tool]) -> bool {
    say(Tone::Progress, "🔍 Checking prerequisites...");

    let mut all_available = true;
    for tool in tools {
        match tool.probe() {
            Ok(version) => say(Tone::Success, &format!("✅ {}: {version}", tool.name)),
            Err(e) => {
                tracing::debug!(tool = %tool.program, "Prerequisite probe failed: {e:#}");
                say(Tone::Failure, &format!("❌ {} is not installed", tool.name));
                say(Tone::Warning, &format!("   {}", tool.install_hint));
                all_available = false;
            }
        }
    }

    all_available
}

/// Validates that `root` is inside a git repository.
pub fn check_git_repository(root: &Path) -> Result<()> {
    git2::Repository::discover(root).with_context(|| {
        format!(
            "Not in a git repository: {}. Please run this command from within a git repository.",
            root.display()
        )
    })?;
    Ok(())
}

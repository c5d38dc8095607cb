//! Dependency installation for the project root and both services.

use std::path::{Path, PathBuf};

use termcolor::Color;

use crate::process::run_streaming;
use crate::report::{say, Reporter, Tag, Tone};

/// One directory in which the install command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallStage {
    /// Label used for progress lines and output tags.
    pub label: String,
    /// Absolute working directory.
    pub dir: PathBuf,
}

impl InstallStage {
    /// Creates a stage.
    pub fn new(label: &str, dir: PathBuf) -> Self {
        Self {
            label: label.to_string(),
            dir,
        }
    }
}

/// Returns the three install stages: project root, then each service directory.
pub fn install_stages(root: &Path, server_dir: &Path, client_dir: &Path) -> Vec<InstallStage> {
    vec![
        InstallStage::new("root", root.to_path_buf()),
        InstallStage::new("server", root.join(server_dir)),
        InstallStage::new("client", root.join(client_dir)),
    ]
}

/// Returns whether every stage already has a `node_modules` directory.
pub fn dependencies_present(stages: &[InstallStage]) -> bool {
    stages
        .iter()
        .all(|stage| stage.dir.join("node_modules").is_dir())
}

/// Runs the install command in every stage, in order.
///
/// A failed stage is logged and the next stage is still attempted. Returns
/// true only when every stage succeeded.
pub async fn install_dependencies(
    program: &str,
    args: &[String],
    stages: &[InstallStage],
    reporter: &Reporter,
) -> bool {
    say(Tone::Progress, "\n📦 Installing dependencies...");
    say(Tone::Detail, "   This can take several minutes...\n");

    let mut failed = 0;
    for stage in stages {
        say(
            Tone::Step,
            &format!("   → Installing {} dependencies...", stage.label),
        );
        let tag = Tag::new(format!("INSTALL:{}", stage.label), Color::Blue);

        let (message, detail) = match run_streaming(program, args, &stage.dir, &tag).await {
            Ok(status) if status.success() => continue,
            Ok(status) => (
                format!("{program} install failed for {} ({status})", stage.label),
                None,
            ),
            Err(e) => (
                format!("Could not run {program} install for {}", stage.label),
                Some(e),
            ),
        };
        failed += 1;
        let _ = reporter.error(&message, detail.as_ref());
    }

    if failed == 0 {
        say(Tone::Success, "\n✅ All dependencies installed");
        true
    } else {
        say(
            Tone::Failure,
            &format!("\n❌ {failed} of {} install steps failed", stages.len()),
        );
        false
    }
}

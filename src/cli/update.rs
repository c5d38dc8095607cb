//! The updater command.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use crate::cli::CommonArgs;
use crate::config::ProjectConfig;
use crate::report::{banner, say, Reporter, Tone};
use crate::updater::{
    fetch_remote_revision, Approval, GithubClient, GitVcs, RemoteRevision, RevisionRecord,
    SyncState, SyncWorkflow, VersionControl,
};
use crate::utils::preflight::{check_git_repository, check_tools, Tool};

/// Checks the checkout against upstream and optionally synchronizes it.
#[derive(Parser, Debug)]
#[command(name = "rdw-update", version)]
#[command(about = "Checks for and applies Remote Desktop Web updates", long_about = None)]
pub struct UpdateCommand {
    /// Applies updates without asking for confirmation.
    #[arg(short, long)]
    pub force: bool,

    /// Only reports whether an update is available; changes nothing.
    #[arg(short, long)]
    pub check_only: bool,

    /// Shared options.
    #[command(flatten)]
    pub common: CommonArgs,
}

impl UpdateCommand {
    /// Executes the updater and returns the process exit code.
    pub async fn execute(self) -> ExitCode {
        let reporter = Reporter::new(self.common.debug);

        let code = match self.run(&reporter).await {
            Ok(code) => code,
            Err(e) => {
                let _ = reporter.critical("Unexpected updater error", Some(&e));
                ExitCode::FAILURE
            }
        };

        reporter.summarize();
        code
    }

    async fn run(&self, reporter: &Reporter) -> Result<ExitCode> {
        banner("Remote Desktop Web", "Updater");

        let root = self.common.project_root()?;
        let config = ProjectConfig::load(&root)?;

        if !check_tools(&[Tool::git()]) {
            say(Tone::Failure, "\n❌ Git is required to check for updates");
            return Ok(ExitCode::FAILURE);
        }

        if let Err(e) = check_git_repository(&root) {
            let _ = reporter.error("This directory is not a git repository", Some(&e));
            say(Tone::Detail, "   Clone the project with:");
            say(
                Tone::Detail,
                &format!("   git clone {}", config.upstream.clone_url()),
            );
            return Ok(ExitCode::FAILURE);
        }

        say(Tone::Progress, "\n🌐 Checking for updates...");
        let client = GithubClient::new(&config.upstream)?;
        let Some(remote) = fetch_remote_revision(&client, reporter).await else {
            say(
                Tone::Failure,
                &format!("\n❌ Found {} errors. Aborting.", reporter.error_count()),
            );
            return Ok(ExitCode::FAILURE);
        };

        let vcs = GitVcs::new(&root);
        let live = match vcs.current_revision() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::debug!("Checked-out revision unavailable: {e:#}");
                None
            }
        };

        let record = RevisionRecord::in_git_dir(&root, &config.sync.revision_file)?;
        // A record that cannot be read counts as no record
        let recorded = match record.load() {
            Ok(recorded) => recorded,
            Err(e) => {
                let _ = reporter.error("Could not read the revision record", Some(&e));
                None
            }
        };

        say(Tone::Plain, "");
        for line in version_summary(&remote, live.as_deref(), recorded.as_deref()) {
            say(Tone::Plain, &line);
        }

        let state = SyncState::evaluate(recorded.as_deref(), &remote.short_id);
        let (tone, icon) = match state {
            SyncState::UpToDate => (Tone::Success, "✅"),
            SyncState::Stale => (Tone::Warning, "🆕"),
            SyncState::Unknown => (Tone::Warning, "❓"),
        };
        say(tone, &format!("\n{icon} {}", state.describe()));

        if self.check_only {
            if state.needs_update() {
                say(
                    Tone::Detail,
                    &format!(
                        "   To update manually run: git pull {} {}",
                        config.sync.remote, config.upstream.branch
                    ),
                );
            }
            return Ok(ExitCode::SUCCESS);
        }

        let workflow = SyncWorkflow::new(
            &vcs,
            &record,
            reporter,
            &config.sync,
            &config.upstream.branch,
        );
        let mut stdin = std::io::BufReader::new(std::io::stdin());
        let mut approval = if self.force {
            Approval::Forced
        } else {
            Approval::Interactive {
                is_terminal: std::io::stdin().is_terminal(),
                reader: &mut stdin,
            }
        };

        // Git subprocesses and the prompt block; keep them off the async workers.
        let outcome =
            tokio::task::block_in_place(|| workflow.run(state, &remote, &mut approval))?;
        tracing::debug!(?outcome, "Updater finished");

        if outcome.is_failure() {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn version_summary(
    remote: &RemoteRevision,
    live: Option<&str>,
    recorded: Option<&str>,
) -> Vec<String> {
    vec![
        "📊 Version summary".to_string(),
        format!("   Latest upstream: {}", remote.headline()),
        format!("                    by {} on {}", remote.author, remote.date),
        format!("   Checked out:     {}", live.unwrap_or("not available")),
        format!("   Recorded:        {}", recorded.unwrap_or("none")),
    ]
}

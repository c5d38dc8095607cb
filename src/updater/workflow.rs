//! The synchronization workflow run after the upstream revision is known.

use std::io::BufRead;

use anyhow::Result;

use crate::config::SyncConfig;
use crate::report::{say, Reporter, Tone};
use crate::updater::decision::SyncState;
use crate::updater::pipeline::Pipeline;
use crate::updater::record::RevisionRecord;
use crate::updater::remote::RemoteRevision;
use crate::updater::vcs::VersionControl;
use crate::utils::prompt::confirm;

/// How mutating actions are approved.
pub enum Approval<'a> {
    /// Approved without asking.
    Forced,
    /// Asked on `reader`; re-prompts until the answer is yes or no.
    Interactive {
        /// Whether stdin is a terminal.
        is_terminal: bool,
        /// Answer source.
        reader: &'a mut (dyn BufRead + Send),
    },
}

impl Approval<'_> {
    fn approve(&mut self, question: &str) -> Result<bool> {
        match self {
            Self::Forced => Ok(true),
            Self::Interactive {
                is_terminal,
                reader,
            } => confirm(question, *is_terminal, &mut **reader),
        }
    }
}

/// How a workflow run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Up to date with nothing to publish.
    AlreadyCurrent,
    /// The operator declined the offered action.
    Declined,
    /// Fetch and pull succeeded and the record was updated.
    Synchronized {
        /// Whether the add/commit/push steps succeeded or had nothing to do.
        published: bool,
    },
    /// Local changes were committed and pushed without pulling.
    Published {
        /// Whether every publish step succeeded.
        ok: bool,
    },
    /// A required step failed; the record was left untouched.
    Failed {
        /// Name of the failed step.
        step: String,
    },
}

impl SyncOutcome {
    /// Returns true when a required step failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Decides and runs the synchronization for one updater run.
pub struct SyncWorkflow<'a> {
    vcs: &'a dyn VersionControl,
    record: &'a RevisionRecord,
    reporter: &'a Reporter,
    sync: &'a SyncConfig,
    branch: &'a str,
}

impl<'a> SyncWorkflow<'a> {
    /// Creates a workflow over the given checkout and record.
    pub fn new(
        vcs: &'a dyn VersionControl,
        record: &'a RevisionRecord,
        reporter: &'a Reporter,
        sync: &'a SyncConfig,
        branch: &'a str,
    ) -> Self {
        Self {
            vcs,
            record,
            reporter,
            sync,
            branch,
        }
    }

    /// Offers and performs whatever `state` calls for.
    ///
    /// A stale or unknown checkout is fetched, pulled, recorded and published.
    /// An up-to-date checkout with local changes is only published.
    pub fn run(
        &self,
        state: SyncState,
        remote: &RemoteRevision,
        approval: &mut Approval<'_>,
    ) -> Result<SyncOutcome> {
        if state.needs_update() {
            self.synchronize(remote, approval)
        } else {
            self.publish_local_changes(approval)
        }
    }

    fn synchronize(
        &self,
        remote: &RemoteRevision,
        approval: &mut Approval<'_>,
    ) -> Result<SyncOutcome> {
        if !approval.approve("Do you want to update now?")? {
            say(Tone::Warning, "⏭️  Update cancelled");
            return Ok(SyncOutcome::Declined);
        }

        // Fetch and pull gate everything after them
        say(Tone::Progress, "\n🔄 Updating...");
        let pipeline = Pipeline::sync(
            &self.sync.remote,
            self.branch,
            &remote.short_id,
            &self.sync.commit_message,
        );
        let report = pipeline.run(self.vcs, self.record, self.reporter);

        // The record step never ran, so the previous id is still on disk
        if let Some(step) = report.halted_at() {
            say(Tone::Failure, "\n❌ Update failed, local revision record left unchanged");
            return Ok(SyncOutcome::Failed {
                step: step.to_string(),
            });
        }

        say(
            Tone::Success,
            &format!("\n✅ Updated to {}", remote.short_id),
        );
        Ok(SyncOutcome::Synchronized {
            published: report.succeeded(),
        })
    }

    fn publish_local_changes(&self, approval: &mut Approval<'_>) -> Result<SyncOutcome> {
        let dirty = match self.vcs.has_uncommitted_changes() {
            Ok(dirty) => dirty,
            Err(e) => {
                let _ = self
                    .reporter
                    .error("Could not check for local changes", Some(&e));
                return Ok(SyncOutcome::AlreadyCurrent);
            }
        };
        if !dirty {
            return Ok(SyncOutcome::AlreadyCurrent);
        }

        say(Tone::Warning, "\n📝 You have uncommitted local changes");
        if !approval.approve("Do you want to commit and push them?")? {
            say(Tone::Warning, "⏭️  Publishing cancelled");
            return Ok(SyncOutcome::Declined);
        }

        let pipeline = Pipeline::publish(&self.sync.remote, self.branch, &self.sync.commit_message);
        let report = pipeline.run(self.vcs, self.record, self.reporter);
        if report.succeeded() {
            say(Tone::Success, "✅ Local changes published");
        }
        Ok(SyncOutcome::Published {
            ok: report.succeeded(),
        })
    }
}

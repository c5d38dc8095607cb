//! Ordered, named synchronization steps.
//!
//! Each step is either required or best effort. A failed required step halts
//! the pipeline; a failed best-effort step is logged and the next step runs.
//! Nothing is rolled back. A step whose precondition does not hold is
//! skipped without touching the error count.

use anyhow::Result;

use crate::report::{say, Reporter, Tone};
use crate::updater::record::RevisionRecord;
use crate::updater::vcs::VersionControl;

/// What a step does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// Run a git subcommand.
    Git(Vec<String>),
    /// Persist the given id as the revision record.
    RecordRevision(String),
}

/// Whether a failure stops the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Failure halts the remaining steps.
    Required,
    /// Failure is logged and the pipeline continues.
    BestEffort,
}

/// When a step runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Always runs.
    Always,
    /// Runs only when the working tree has uncommitted changes.
    TreeDirty,
    /// Runs only when the previous step was not skipped.
    PreviousRan,
}

/// One named step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Name shown in progress output.
    pub name: String,
    /// Work performed.
    pub action: StepAction,
    /// Failure policy.
    pub criticality: Criticality,
    /// Gate checked before the step runs.
    pub precondition: Precondition,
}

impl Step {
    /// Creates a git step.
    pub fn git<S: AsRef<str>>(name: &str, args: &[S], criticality: Criticality) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::Git(args.iter().map(|a| a.as_ref().to_string()).collect()),
            criticality,
            precondition: Precondition::Always,
        }
    }

    /// Returns the step with `precondition` as its gate.
    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    /// Creates the step that persists the revision record.
    pub fn record(id: &str) -> Self {
        Self {
            name: "Record revision".to_string(),
            action: StepAction::RecordRevision(id.to_string()),
            criticality: Criticality::BestEffort,
            precondition: Precondition::Always,
        }
    }

    fn should_run(&self, vcs: &dyn VersionControl, previous: Option<StepOutcome>) -> bool {
        match self.precondition {
            Precondition::Always => true,
            Precondition::PreviousRan => previous != Some(StepOutcome::Skipped),
            // An unreadable status counts as dirty so git reports the real problem
            Precondition::TreeDirty => vcs.has_uncommitted_changes().unwrap_or_else(|e| {
                tracing::debug!("Working tree status unavailable: {e:#}");
                true
            }),
        }
    }

    fn execute(&self, vcs: &dyn VersionControl, record: &RevisionRecord) -> Result<()> {
        match &self.action {
            StepAction::Git(args) => vcs.run(args),
            StepAction::RecordRevision(id) => record.store(id),
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step succeeded.
    Succeeded,
    /// The precondition did not hold; the step did nothing.
    Skipped,
    /// A best-effort step failed; later steps still ran.
    FailedRecoverable,
    /// A required step failed; later steps were skipped.
    FailedFatal,
}

/// Outcomes of the steps that ran, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Step name and outcome for every step reached, skipped ones included.
    pub outcomes: Vec<(String, StepOutcome)>,
}

impl PipelineReport {
    /// Returns true when no step failed.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| {
            matches!(outcome, StepOutcome::Succeeded | StepOutcome::Skipped)
        })
    }

    /// Returns the names of the steps that were skipped.
    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == StepOutcome::Skipped)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Returns the name of the required step that halted the pipeline, if any.
    pub fn halted_at(&self) -> Option<&str> {
        self.outcomes
            .iter()
            .find(|(_, outcome)| *outcome == StepOutcome::FailedFatal)
            .map(|(name, _)| name.as_str())
    }
}

/// A sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Creates a pipeline from explicit steps.
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Fetch and pull (required), record `revision_id`, then publish (best effort).
    pub fn sync(remote: &str, branch: &str, revision_id: &str, commit_message: &str) -> Self {
        let mut steps = vec![
            Step::git("Fetch", &["fetch", remote], Criticality::Required),
            Step::git("Pull", &["pull", remote, branch], Criticality::Required),
            Step::record(revision_id),
        ];
        steps.extend(publish_steps(remote, branch, commit_message));
        Self::new(steps)
    }

    /// Add, commit and push local changes (best effort). Never pulls.
    ///
    /// All three are skipped when the working tree is clean.
    pub fn publish(remote: &str, branch: &str, commit_message: &str) -> Self {
        Self::new(publish_steps(remote, branch, commit_message))
    }

    /// Returns the steps in order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs the steps in order until one required step fails.
    pub fn run(
        &self,
        vcs: &dyn VersionControl,
        record: &RevisionRecord,
        reporter: &Reporter,
    ) -> PipelineReport {
        let mut report = PipelineReport::default();

        for step in &self.steps {
            let previous = report.outcomes.last().map(|(_, outcome)| *outcome);
            if !step.should_run(vcs, previous) {
                tracing::debug!(step = %step.name, "Pipeline step skipped");
                report.outcomes.push((step.name.clone(), StepOutcome::Skipped));
                continue;
            }

            say(Tone::Step, &format!("   → {}...", step.name));

            let outcome = match step.execute(vcs, record) {
                Ok(()) => StepOutcome::Succeeded,
                Err(e) => {
                    let _ = reporter.error(&format!("{} failed", step.name), Some(&e));
                    match step.criticality {
                        Criticality::Required => StepOutcome::FailedFatal,
                        Criticality::BestEffort => StepOutcome::FailedRecoverable,
                    }
                }
            };

            tracing::debug!(step = %step.name, ?outcome, "Pipeline step finished");
            report.outcomes.push((step.name.clone(), outcome));
            if outcome == StepOutcome::FailedFatal {
                break;
            }
        }

        report
    }
}

fn publish_steps(remote: &str, branch: &str, commit_message: &str) -> Vec<Step> {
    vec![
        Step::git("Stage changes", &["add", "-A"], Criticality::BestEffort)
            .when(Precondition::TreeDirty),
        Step::git(
            "Commit",
            &["commit", "-m", commit_message],
            Criticality::BestEffort,
        )
        .when(Precondition::PreviousRan),
        Step::git("Push", &["push", remote, branch], Criticality::BestEffort)
            .when(Precondition::PreviousRan),
    ]
}

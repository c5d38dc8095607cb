//! Upstream revision tracking and repository synchronization.

pub mod decision;
pub mod pipeline;
pub mod record;
pub mod remote;
pub mod vcs;
pub mod workflow;

pub use decision::SyncState;
pub use pipeline::{
    Criticality, Pipeline, PipelineReport, Precondition, Step, StepAction, StepOutcome,
};
pub use record::RevisionRecord;
pub use remote::{fetch_remote_revision, FetchError, GithubClient, RemoteRevision};
pub use vcs::{GitVcs, VersionControl};
pub use workflow::{Approval, SyncOutcome, SyncWorkflow};

/// Number of hex characters in an abbreviated revision identifier.
pub const SHORT_ID_LEN: usize = 7;

/// Length of a full SHA-1 revision identifier in hex characters.
pub const FULL_ID_LEN: usize = 40;

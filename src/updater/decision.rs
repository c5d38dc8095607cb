//! Whether the checkout needs synchronizing.
//!
//! The state is recomputed from the recorded id and the upstream short id on
//! every run. It is a string comparison only: commit ancestry is never
//! consulted, so diverged histories are not detected.

/// Synchronization state of the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No revision has been recorded yet.
    Unknown,
    /// The recorded revision equals the upstream one.
    UpToDate,
    /// The recorded revision differs from the upstream one.
    Stale,
}

impl SyncState {
    /// Compares the recorded id with the upstream short id.
    pub fn evaluate(recorded: Option<&str>, remote_short_id: &str) -> Self {
        match recorded {
            None => Self::Unknown,
            Some(id) if id == remote_short_id => Self::UpToDate,
            Some(_) => Self::Stale,
        }
    }

    /// Returns true when a synchronization should be offered.
    pub fn needs_update(self) -> bool {
        !matches!(self, Self::UpToDate)
    }

    /// Returns the status line shown for this state.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Unknown => "Current version could not be determined",
            Self::UpToDate => "You are on the latest version",
            Self::Stale => "A new version is available",
        }
    }
}

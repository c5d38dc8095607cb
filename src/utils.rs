//! Utility functions and helpers.

pub mod preflight;
pub mod prompt;

pub use preflight::{check_git_repository, check_tools, Tool};
pub use prompt::confirm;

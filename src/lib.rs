//! # rdw-dev
//!
//! Developer tooling for Remote Desktop Web.
//!
//! - `rdw-start` checks prerequisites, installs dependencies when needed and
//!   runs the server and client development services side by side.
//! - `rdw-update` compares the last synchronized revision with the head of the
//!   upstream branch and offers to pull, record and publish.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod launcher;
pub mod process;
pub mod report;
pub mod updater;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use crate::cli::{StartCommand, UpdateCommand};

/// The current version of rdw-dev.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Installs the stderr tracing subscriber.
///
/// Honours `RUST_LOG`, defaulting to `warn`. With `debug` set, this crate logs
/// at debug level regardless of `RUST_LOG`. Logs go to stderr so they never mix
/// with the relayed service output on stdout.
pub fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if debug {
        EnvFilter::new("warn,rdw_dev=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

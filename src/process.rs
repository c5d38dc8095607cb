//! Subprocess helpers shared by the launcher and the updater.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use crate::report::{say_tagged, Tag};

/// Runs a command to completion and captures its output.
///
/// Spawn failures (missing program, bad working directory) are errors; a
/// non-zero exit is not, callers inspect `status`.
pub fn run_captured<I, S>(program: &str, args: I, cwd: Option<&Path>) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = std::process::Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    command
        .output()
        .with_context(|| format!("Failed to execute {program}"))
}

/// Returns the first non-empty line of a command's stdout, trimmed.
pub fn first_stdout_line(output: &Output) -> Option<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

/// Copies every non-empty line from `reader` to stdout under `tag`.
///
/// Returns when the stream closes. Read errors end the relay early.
pub async fn relay_lines<R>(reader: R, tag: Tag) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut relayed = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim_end();
                if !line.is_empty() {
                    say_tagged(&tag, line);
                    relayed += 1;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(tag = %tag.label, "Stopped relaying output: {e}");
                break;
            }
        }
    }
    relayed
}

/// Runs a command with stdout and stderr relayed line by line under `tag`.
pub async fn run_streaming(
    program: &str,
    args: &[String],
    cwd: &Path,
    tag: &Tag,
) -> Result<ExitStatus> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start {program} in {}", cwd.display()))?;

    let stdout = child.stdout.take().map(|s| relay_lines(s, tag.clone()));
    let stderr = child.stderr.take().map(|s| relay_lines(s, tag.clone()));

    let drain = async {
        if let Some(relay) = stdout {
            relay.await;
        }
    };
    let drain_err = async {
        if let Some(relay) = stderr {
            relay.await;
        }
    };
    futures::join!(drain, drain_err);

    child
        .wait()
        .await
        .with_context(|| format!("Failed to wait for {program}"))
}

use crate::error::{DriveListError, Result};
use std::process::Command;
use tracing::debug;

/// Run a disk utility to completion and return its stdout.
///
/// A spawn failure or a non-zero exit status is an acquisition error carrying
/// the utility's trimmed stderr.
pub fn run_command(program: &str, args: &[&str]) -> Result<Vec<u8>> {
    let rendered = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    debug!(command = %rendered, "running disk utility");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| DriveListError::Spawn {
            command: rendered.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(DriveListError::CommandFailed {
            command: rendered,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

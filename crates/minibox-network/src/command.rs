//! Invocation of host networking tools.

use std::process::Command;

use minibox_common::error::{MiniboxError, Result};

/// Runs `program` with `args`, returning its standard output.
///
/// # Errors
///
/// Returns [`MiniboxError::Command`] if the program cannot be spawned or
/// exits unsuccessfully; the error carries the captured standard error.
pub fn run(program: &'static str, args: &[&str]) -> Result<String> {
    let joined = args.join(" ");
    tracing::debug!("$ {program} {joined}");

    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| MiniboxError::Command {
            program,
            args: joined.clone(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(MiniboxError::Command {
            program,
            args: joined,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

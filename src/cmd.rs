use std::process::{Command, Output, Stdio};

use crate::error::{ActivationError, ActivationResult};

/// Run a command and capture its output. Fails if the command
/// returns a non-zero exit code; stderr travels in the error so
/// callers can surface the tool's own message.
pub fn run(program: &str, args: &[&str]) -> ActivationResult<String> {
    let output = spawn(program, args)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(ActivationError::CommandFailed {
            command: format_command(program, args),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run a command with stdout/stderr streamed to the terminal.
/// Used for long operations (image builds, platform deploys) where
/// the operator should see progress as it happens.
pub fn run_streamed(program: &str, args: &[&str]) -> ActivationResult<()> {
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| not_found(program, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(ActivationError::CommandFailed {
            command: format_command(program, args),
            status,
            stderr: String::new(),
        })
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

fn spawn(program: &str, args: &[&str]) -> ActivationResult<Output> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| not_found(program, e))
}

fn not_found(program: &str, e: std::io::Error) -> ActivationError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ActivationError::CommandNotFound(program.to_string())
    } else {
        ActivationError::Io(e)
    }
}

fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}

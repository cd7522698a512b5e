//! Timeout-bounded external command execution.

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default time budget for one external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured output of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// Run a command, killing it once `timeout` elapses.
///
/// A timeout is reported as [`Error::Timeout`], which callers treat exactly
/// like a failed call.
pub fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    log::debug!("Running {} {}", program, args.join(" "));

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::ToolMissing(program.to_string()),
            _ => Error::CommandFailed {
                message: format!("failed to execute {program}: {e}"),
                stderr: String::new(),
            },
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_with_deadline(&mut child, timeout)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(Error::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    Ok(CommandOutput {
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
        success: status.success(),
    })
}

/// Run a command and fail unless it exits successfully.
pub fn run_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
    subject: Option<&str>,
) -> Result<CommandOutput> {
    let output = run_with_timeout(program, args, timeout)?;
    if !output.success {
        return Err(Error::from_cli_output(program, &output.stderr, subject));
    }
    Ok(output)
}

/// Locate an executable in PATH.
pub fn find_program(name: &str) -> Result<String> {
    let output = Command::new("which")
        .arg(name)
        .output()
        .map_err(|_| Error::ToolMissing(name.to_string()))?;

    if output.status.success() {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return Ok(path);
        }
    }

    Err(Error::ToolMissing(name.to_string()))
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe to the end on a helper thread so the child never blocks on a
/// full pipe buffer.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program() {
        let err = run_with_timeout("driftscan-no-such-tool", &[], DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::ToolMissing(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output() {
        let out = run_with_timeout("sh", &["-c", "echo out; echo err >&2"], DEFAULT_TIMEOUT)
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let err = run_with_timeout("sh", &["-c", "sleep 5"], Duration::from_millis(200))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_checked_maps_failure() {
        let err = run_checked(
            "sh",
            &["-c", "echo 'Resource group could not be found' >&2; exit 3"],
            DEFAULT_TIMEOUT,
            Some("rg"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}

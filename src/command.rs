//! External command execution for hardware providers
//!
//! Most providers shell out to a platform tool (`nvidia-smi`, `lspci`,
//! `xrandr`, PowerShell CIM queries). Every invocation goes through
//! [`run_with_timeout`] so a hung tool cannot stall the whole collection.

use std::io::{ErrorKind, Read};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised while running an external tool
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed to launch {label}: {source}")]
    Launch {
        label: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} timed out after {seconds}s")]
    TimedOut { label: String, seconds: u64 },

    #[error("{label} failed ({status}): {stderr}")]
    Failed {
        label: String,
        status: String,
        stderr: String,
    },
}

/// Run a command, capturing stdout/stderr, and kill it once `timeout` elapses.
pub fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
    label: &str,
) -> Result<Output, CommandError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                CommandError::NotFound(label.to_string())
            } else {
                CommandError::Launch {
                    label: label.to_string(),
                    source,
                }
            }
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let timed_out = || CommandError::TimedOut {
        label: label.to_string(),
        seconds: timeout.as_secs(),
    };

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {}
            Err(source) => {
                let _ = child.kill();
                return Err(CommandError::Launch {
                    label: label.to_string(),
                    source,
                });
            }
        }

        if Instant::now() >= deadline {
            // Readers are left detached: a grandchild may still hold the pipes
            let _ = child.kill();
            let _ = child.wait();
            return Err(timed_out());
        }

        thread::sleep(Duration::from_millis(25));
    };

    let stdout = collect(stdout, deadline).ok_or_else(timed_out)?;
    let stderr = collect(stderr, deadline).ok_or_else(timed_out)?;

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

/// Read a pipe to EOF on its own thread
fn drain<R: Read + Send + 'static>(mut stream: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a drained pipe until `deadline`; `None` if it is still open
fn collect(pipe: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<Vec<u8>> {
    let Some(rx) = pipe else {
        return Some(Vec::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buf) => Some(buf),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Run `program` with `args` and return its stdout when it exits successfully.
pub fn capture_stdout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, CommandError> {
    let mut command = Command::new(program);
    command.args(args);
    let output = run_with_timeout(&mut command, timeout, program)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CommandError::Failed {
            label: program.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a PowerShell script, preferring `pwsh` over Windows PowerShell.
#[cfg(target_os = "windows")]
pub fn run_powershell(script: &str, timeout: Duration) -> Result<String, CommandError> {
    for shell in ["pwsh", "powershell"] {
        match capture_stdout(
            shell,
            &["-NoProfile", "-NonInteractive", "-Command", script],
            timeout,
        ) {
            Err(CommandError::NotFound(_)) => continue,
            result => return result,
        }
    }

    Err(CommandError::NotFound("PowerShell".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_reports_not_found() {
        let err = capture_stdout(
            "definitely-not-a-real-binary-7f3a",
            &[],
            Duration::from_secs(2),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::NotFound(_)));
        assert_eq!(err.to_string(), "definitely-not-a-real-binary-7f3a not found");
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_of_successful_command() {
        let out = capture_stdout("sh", &["-c", "echo hello"], Duration::from_secs(5)).unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failure_with_stderr() {
        let err = capture_stdout(
            "sh",
            &["-c", "echo broken >&2; exit 3"],
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            CommandError::Failed { label, stderr, .. } => {
                assert_eq!(label, "sh");
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let err = capture_stdout("sh", &["-c", "sleep 5"], Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_is_not_held_up_by_a_grandchild_keeping_the_pipes() {
        let started = Instant::now();
        let err = capture_stdout(
            "sh",
            &["-c", "sleep 4 & exec sleep 10"],
            Duration::from_millis(300),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn exited_command_with_lingering_grandchild_is_bounded() {
        let started = Instant::now();
        let err = capture_stdout(
            "sh",
            &["-c", "sleep 4 & echo done"],
            Duration::from_millis(500),
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}

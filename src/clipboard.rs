//! Clipboard output through the platform's clipboard utility

use anyhow::{Context, Result};
use std::io::Write;
use std::process::{Command, Stdio};

/// Copy `text` to the clipboard, returning the tool that accepted it
pub fn copy(text: &str) -> Result<&'static str> {
    #[cfg(target_os = "windows")]
    {
        match set_clipboard_powershell(text) {
            Ok(()) => return Ok("Set-Clipboard"),
            Err(err) => tracing::debug!("Set-Clipboard failed: {err:#}"),
        }
    }

    let mut failures = Vec::new();
    for &(program, args) in CANDIDATES {
        match pipe_to(program, args, text) {
            Ok(()) => return Ok(program),
            Err(err) => {
                tracing::debug!("{program} failed: {err:#}");
                failures.push(program.to_string());
            }
        }
    }

    anyhow::bail!(
        "No clipboard utility available (tried {})",
        failures.join(", ")
    )
}

/// Clipboard utilities to try, in order
#[cfg(target_os = "windows")]
const CANDIDATES: &[(&str, &[&str])] = &[("clip", &[])];

#[cfg(target_os = "macos")]
const CANDIDATES: &[(&str, &[&str])] = &[("pbcopy", &[])];

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const CANDIDATES: &[(&str, &[&str])] = &[
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

/// Feed `text` to a command's stdin and wait for it to exit successfully
fn pipe_to(program: &str, args: &[&str], text: &str) -> Result<()> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .with_context(|| format!("Failed to write to {program}"))?;
    }

    let status = child
        .wait()
        .with_context(|| format!("Failed while waiting on {program}"))?;
    if !status.success() {
        anyhow::bail!("{program} exited with {status}");
    }

    Ok(())
}

/// `clip.exe` mangles non-ASCII input, so prefer passing the text as a literal.
#[cfg(target_os = "windows")]
fn set_clipboard_powershell(text: &str) -> Result<()> {
    let script = format!("Set-Clipboard -Value '{}'", ps_single_quote(text));
    crate::command::run_powershell(&script, std::time::Duration::from_secs(20))?;
    Ok(())
}

/// PowerShell single-quoted strings escape a literal quote by doubling it.
#[cfg(any(test, target_os = "windows"))]
fn ps_single_quote(value: &str) -> String {
    value.replace('\'', "''")
}

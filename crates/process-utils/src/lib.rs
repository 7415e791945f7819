//! Child process helpers for command-backed integrations.
//!
//! Commands are built from a configured argv, never open a console window on
//! Windows and never read the parent's stdin.

use std::ffi::OsStr;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Errors from starting or running a child process.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("no command configured")]
    NoCommand,

    #[error("{label} command not found")]
    NotFound { label: &'static str },

    #[error("failed to start {label}: {source}")]
    Spawn {
        label: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{label} exited with {status}: {stderr}")]
    Exit {
        label: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

impl ProcessError {
    fn from_io(label: &'static str, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { label },
            _ => Self::Spawn { label, source },
        }
    }

    /// Whether the program itself is missing or unset, as opposed to failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NoCommand | Self::NotFound { .. })
    }
}

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self) -> &mut Self;
}

impl NoWindowExt for Command {
    fn no_window(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
        self
    }
}

/// A command with no console window, null stdin and stdout, and piped stderr.
pub fn quiet_command(program: impl AsRef<OsStr>) -> Command {
    let mut cmd = Command::new(program);
    cmd.no_window()
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    cmd
}

/// Build a quiet command from `argv` followed by `extra`.
pub fn command_from_argv(argv: &[String], extra: &[&OsStr]) -> Result<Command, ProcessError> {
    let (program, args) = argv.split_first().ok_or(ProcessError::NoCommand)?;
    let mut cmd = quiet_command(program);
    cmd.args(args).args(extra);
    Ok(cmd)
}

/// Spawn `cmd` and reap it in the background, logging a failed exit.
///
/// Returns once the process has started.
pub fn spawn_detached(mut cmd: Command, label: &'static str) -> Result<(), ProcessError> {
    let child = cmd.spawn().map_err(|e| ProcessError::from_io(label, e))?;

    tokio::spawn(async move {
        match child.wait_with_output().await {
            Ok(output) if output.status.success() => debug!(label, "Child process finished"),
            Ok(output) => warn!(
                label,
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Child process exited with failure"
            ),
            Err(e) => warn!(label, error = %e, "Failed to wait for child process"),
        }
    });

    Ok(())
}

/// Run `cmd` to completion. A non-zero exit is an error carrying stderr.
pub async fn run_to_completion(mut cmd: Command, label: &'static str) -> Result<(), ProcessError> {
    let output = cmd
        .output()
        .await
        .map_err(|e| ProcessError::from_io(label, e))?;

    if !output.status.success() {
        return Err(ProcessError::Exit {
            label,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

//! Command execution against a managed device.
//!
//! Collectors never talk to a device directly; they go through a
//! [`CommandExecutor`], which runs a command string on the device and returns
//! its textual output. The executor owns transport concerns (connection,
//! timeouts), so a hung command is bounded by the executor's own timeout
//! contract, not by the collector.

use std::process::Command;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by a command executor.
///
/// The polling loop only cares about one distinction: transport-fatal errors
/// (the device itself is gone) abort the session immediately, everything else
/// is a single failed operation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The device stopped responding; the channel is no longer usable.
    #[error("device not responding")]
    NotResponding,

    /// The call exceeded the executor's timeout bound.
    #[error("command timed out after {elapsed:?}")]
    Timeout {
        /// Time spent waiting before giving up.
        elapsed: Duration,
    },

    /// The command ran but exited unsuccessfully.
    #[error("command exited with status {status}: {stderr}")]
    CommandFailed {
        /// Process exit code (-1 if terminated by signal).
        status: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// Transport plumbing failure (pipe, spawn, encoding).
    #[error("transport i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Whether this error means the device/channel itself is unusable.
    ///
    /// Transport-fatal errors are never recovered locally; the polling loop
    /// aborts the session and re-raises them to the controller.
    pub fn is_transport_fatal(&self) -> bool {
        matches!(self, Self::NotResponding | Self::Timeout { .. })
    }
}

/// Executes command strings against a managed device.
///
/// Implementations are shared across the collector worker thread boundary,
/// hence the `Send + Sync` bound.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Run `command` on the device and return its textual output.
    fn execute(&self, command: &str) -> Result<String, ExecError>;
}

/// Executor that runs commands through the local shell.
///
/// Useful for driving collectors against the local machine (the runner binary
/// does this) and as the reference transport in tests. Timeout enforcement is
/// deliberately absent here: a transport that can hang is expected to bound
/// its own calls and raise [`ExecError::Timeout`].
#[derive(Debug, Default, Clone)]
pub struct LocalShellExecutor;

impl CommandExecutor for LocalShellExecutor {
    fn execute(&self, command: &str) -> Result<String, ExecError> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        if !output.status.success() {
            return Err(ExecError::CommandFailed {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .trim_end()
                    .to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

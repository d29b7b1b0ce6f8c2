//! Core collector traits and the collector error taxonomy.

use std::sync::Arc;

use thiserror::Error;

use crate::executor::{CommandExecutor, ExecError};
use crate::session::SessionError;

/// Unresponsive-count threshold above which `stop()` reports at warn level.
///
/// At or below the threshold the observation is a debug-level note; the count
/// is a reporting nuance, not a failure by itself.
pub const UNRESPONSIVE_WARN_THRESHOLD: u32 = 10;

/// Errors that can occur during a collection session.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// Transport-fatal device failure; the session was aborted immediately.
    #[error("device transport failure: {0}")]
    Device(#[source] ExecError),

    /// Unexpected failure captured on the worker thread, re-raised by `stop()`.
    #[error("worker thread of collector '{collector}' failed: {source}")]
    Worker {
        /// Name of the collector whose worker failed.
        collector: String,
        /// The captured failure (first one wins).
        #[source]
        source: ExecError,
    },

    /// `start()` called on a collector that is not in the created state.
    #[error("collector '{0}' already started")]
    AlreadyStarted(String),

    /// The worker thread panicked before producing a result.
    #[error("worker thread of collector '{0}' panicked")]
    Panicked(String),

    /// Failed to persist session output.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Failed to launch the worker thread or the streamed feed process.
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        /// What was being spawned.
        what: &'static str,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Emit the stop-time unresponsive-count observation for collector `name`.
///
/// Warn above the threshold, debug otherwise; silent when the count is zero.
pub(crate) fn report_unresponsive(name: &str, count: u32) {
    if count == 0 {
        return;
    }
    if count > UNRESPONSIVE_WARN_THRESHOLD {
        tracing::warn!(collector = %name, count, "device was unresponsive during collection");
    } else {
        tracing::debug!(collector = %name, count, "device was unresponsive during collection");
    }
}

/// Produces one reading per call for the periodic polling loop.
///
/// This is the pluggable sampling strategy: the generic poll collector is
/// parameterized by a source instead of being subclassed per sensor.
pub trait SampleSource: Send + 'static {
    /// Take one reading from the device.
    fn sample(&mut self) -> Result<String, ExecError>;
}

/// Per-line parse/filter step for the streaming collector.
///
/// Returning `None` drops the line; the caller logs it and moves on. A
/// malformed line is never fatal.
pub trait LineFilter: Send + 'static {
    /// Parse one raw feed line into a record, or reject it.
    fn filter(&mut self, line: &str) -> Option<String>;
}

/// The standard sample source: one device command per reading.
///
/// The command string is configuration (a frame-rate counter, a thermal-zone
/// read, ...); this type only owns invoking it and normalizing the output.
pub struct CommandProbe<E> {
    executor: Arc<E>,
    command: String,
}

impl<E> CommandProbe<E> {
    /// Create a probe invoking `command` through `executor`.
    pub fn new(executor: Arc<E>, command: impl Into<String>) -> Self {
        Self {
            executor,
            command: command.into(),
        }
    }

    /// The device command this probe runs.
    pub fn command(&self) -> &str {
        &self.command
    }
}

impl<E> std::fmt::Debug for CommandProbe<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProbe")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

impl<E: CommandExecutor> SampleSource for CommandProbe<E> {
    fn sample(&mut self) -> Result<String, ExecError> {
        self.executor
            .execute(&self.command)
            .map(|out| out.trim_end().to_string())
    }
}
